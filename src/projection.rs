//! The single configured map projection: conic conformal (Lambert), falling
//! back to Mercator when the standard parallels cancel out.

use crate::config::ProjectionConfig;
use geo::{Coord, MapCoords, MultiPolygon};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    lambda0: f64,
    n: f64,
    f: f64,
    scale: f64,
    translate: [f64; 2],
    /// Projected (unscaled) position of the configured center.
    origin: [f64; 2],
}

impl Projection {
    /// Builds the projection for a canvas; the center lands on `translate`,
    /// which defaults to the middle of the canvas.
    pub fn new(config: &ProjectionConfig, width: f64, height: f64) -> Self {
        let phi1 = config.parallels[0].to_radians();
        let phi2 = config.parallels[1].to_radians();
        let cos1 = phi1.cos();

        let n = if (phi1 - phi2).abs() < EPSILON {
            phi1.sin()
        } else {
            (cos1 / phi2.cos()).ln() / (tany(phi2) / tany(phi1)).ln()
        };
        let f = if n.abs() < EPSILON {
            0.0
        } else {
            cos1 * tany(phi1).powf(n) / n
        };

        let mut projection = Self {
            lambda0: config.center[0].to_radians(),
            n,
            f,
            scale: config.scale,
            translate: config.translate.unwrap_or([width / 2.0, height / 2.0]),
            origin: [0.0, 0.0],
        };
        projection.origin = projection.raw(config.center[0], config.center[1]);
        projection
    }

    fn raw(&self, lon: f64, lat: f64) -> [f64; 2] {
        let lambda = wrap(lon.to_radians() - self.lambda0);
        let phi = lat.to_radians();

        if self.n.abs() < EPSILON {
            let phi = phi.clamp(-FRAC_PI_2 + EPSILON, FRAC_PI_2 - EPSILON);
            return [lambda, tany(phi).ln()];
        }

        let phi = if self.f > 0.0 {
            phi.max(-FRAC_PI_2 + EPSILON)
        } else {
            phi.min(FRAC_PI_2 - EPSILON)
        };
        let r = self.f / tany(phi).powf(self.n);
        [r * (self.n * lambda).sin(), self.f - r * (self.n * lambda).cos()]
    }

    /// Longitude/latitude in degrees to screen pixels (y grows downwards).
    pub fn project(&self, lon: f64, lat: f64) -> [f64; 2] {
        let [x, y] = self.raw(lon, lat);
        [
            self.translate[0] + self.scale * (x - self.origin[0]),
            self.translate[1] - self.scale * (y - self.origin[1]),
        ]
    }

    pub fn project_geometry(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        geometry.map_coords(|c| {
            let [x, y] = self.project(c.x, c.y);
            Coord { x, y }
        })
    }
}

fn tany(phi: f64) -> f64 {
    (FRAC_PI_4 + phi / 2.0).tan()
}

fn wrap(lambda: f64) -> f64 {
    use std::f64::consts::PI;
    if lambda > PI {
        lambda - 2.0 * PI
    } else if lambda < -PI {
        lambda + 2.0 * PI
    } else {
        lambda
    }
}
