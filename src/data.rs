use crate::config::DataConfig;
use crate::types::{Dataset, GeoFeature, RegionKey, TabularRecord};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use geojson::{FeatureCollection, GeoJson};
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use topojson::TopoJson;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read CSV {path:?}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to parse GeoJSON {path:?}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read topology {path:?}: {message}")]
    Topology { path: PathBuf, message: String },
    #[error("{path:?} has no topology object '{object}'")]
    MissingObject { path: PathBuf, object: String },
    #[error("failed to read shapefile {path:?}")]
    Shapefile {
        path: PathBuf,
        #[source]
        source: shapefile::Error,
    },
    #[error("{path:?} has no column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{0:?} must be a FeatureCollection")]
    NotAFeatureCollection(PathBuf),
    #[error("unsupported geometry format for {0:?}")]
    UnsupportedFormat(PathBuf),
    #[error("invalid geometry in {path:?}: {message}")]
    Geometry { path: PathBuf, message: String },
    #[error("loader task failed")]
    Task(#[from] tokio::task::JoinError),
}

/// Which feature properties to read from a geometry source.
#[derive(Debug, Clone)]
pub struct FeatureFields {
    pub key: String,
    pub name: String,
    /// Topology object to extract; ignored for other formats.
    pub object: Option<String>,
}

/// Reads the tabular source. The join key, name and attribute columns must
/// all be present in the header.
pub fn load_tabular(path: &Path, required: &[&str]) -> Result<Vec<TabularRecord>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(file);
    let headers = rdr.headers().map_err(csv_err)?.clone();

    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result.map_err(csv_err)?;
        records.push(TabularRecord::from_pairs(headers.iter().zip(row.iter())));
    }
    Ok(records)
}

/// Reads a geometry source, picking the reader from the file extension.
pub fn load_features(path: &Path, fields: &FeatureFields) -> Result<Vec<GeoFeature>, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;

    match extension.as_str() {
        "shp" => load_shapefile(path, fields),
        "json" | "geojson" => load_geojson(path, fields),
        "topojson" => load_topojson(path, fields),
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn load_geojson(path: &Path, fields: &FeatureFields) -> Result<Vec<GeoFeature>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let geojson =
        GeoJson::from_reader(BufReader::new(file)).map_err(|source| LoadError::GeoJson {
            path: path.to_path_buf(),
            source,
        })?;

    match geojson {
        GeoJson::FeatureCollection(fc) => collection_features(path, fc, fields),
        _ => Err(LoadError::NotAFeatureCollection(path.to_path_buf())),
    }
}

/// Extracts one object of a topology as features, resolving shared arcs.
fn load_topojson(path: &Path, fields: &FeatureFields) -> Result<Vec<GeoFeature>, LoadError> {
    let mut text = String::new();
    File::open(path)
        .and_then(|mut file| file.read_to_string(&mut text))
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let topo_err = |message: String| LoadError::Topology {
        path: path.to_path_buf(),
        message,
    };

    let topology = match text.parse::<TopoJson>().map_err(|e| topo_err(format!("{e:?}")))? {
        TopoJson::Topology(t) => t,
        _ => return Err(topo_err("document is not a Topology".to_string())),
    };

    let object = match &fields.object {
        Some(name) => name.clone(),
        None => topology
            .objects
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| topo_err("topology has no objects".to_string()))?,
    };
    if !topology.objects.iter().any(|o| o.name == object) {
        return Err(LoadError::MissingObject {
            path: path.to_path_buf(),
            object,
        });
    }

    let collection =
        topojson::to_geojson(&topology, &object).map_err(|e| topo_err(format!("{e:?}")))?;
    debug!(
        path = ?path,
        object = %object,
        features = collection.features.len(),
        "topology object extracted"
    );
    collection_features(path, collection, fields)
}

fn collection_features(
    path: &Path,
    collection: FeatureCollection,
    fields: &FeatureFields,
) -> Result<Vec<GeoFeature>, LoadError> {
    let mut features = Vec::new();
    for (i, feature) in collection.features.into_iter().enumerate() {
        let property = |name: &str| {
            feature
                .properties
                .as_ref()
                .and_then(|props| props.get(name))
                .and_then(json_text)
        };
        let key = property(&fields.key);
        let name = property(&fields.name);

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> =
                    geom.value.try_into().map_err(|e| LoadError::Geometry {
                        path: path.to_path_buf(),
                        message: format!("{:?}", e),
                    })?;
                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        let key = key.unwrap_or_else(|| {
            debug!(path = ?path, index = i, "feature has no key property");
            format!("feature-{i}")
        });
        features.push(GeoFeature::new(RegionKey::new(key), name, geometry));
    }
    Ok(features)
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn load_shapefile(path: &Path, fields: &FeatureFields) -> Result<Vec<GeoFeature>, LoadError> {
    let shp_err = |source| LoadError::Shapefile {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = Reader::from_path(path).map_err(shp_err)?;

    let mut features = Vec::new();
    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(shp_err)?;
        let text = |name: &str| match record.get(name) {
            Some(FieldValue::Character(Some(s))) => Some(s.trim().to_string()),
            Some(FieldValue::Numeric(Some(n))) => Some(n.to_string()),
            _ => None,
        };
        let key = text(&fields.key).unwrap_or_else(|| {
            debug!(path = ?path, index = i, "shape has no key field");
            format!("feature-{i}")
        });
        let name = text(&fields.name);

        let converted: Result<MultiPolygon<f64>, String> = match shape {
            shapefile::Shape::Polygon(p) => p.try_into().map_err(|e| format!("{:?}", e)),
            shapefile::Shape::PolygonM(p) => p.try_into().map_err(|e| format!("{:?}", e)),
            shapefile::Shape::PolygonZ(p) => p.try_into().map_err(|e| format!("{:?}", e)),
            _ => continue, // Skip non-polygon shapes
        };
        let geometry = converted.map_err(|message| LoadError::Geometry {
            path: path.to_path_buf(),
            message,
        })?;

        features.push(GeoFeature::new(RegionKey::new(key), name, geometry));
    }
    Ok(features)
}

/// Loads the tabular source and both geometry layers concurrently. Any
/// failure aborts the whole load.
pub async fn load_sources(config: &DataConfig) -> Result<Dataset, LoadError> {
    info!("Loading data...");

    let tabular = {
        let path = config.tabular.clone();
        let mut required = vec![config.join_key.clone(), config.name_field.clone()];
        required.extend(config.attributes.iter().cloned());
        tokio::task::spawn_blocking(move || {
            let required: Vec<&str> = required.iter().map(String::as_str).collect();
            load_tabular(&path, &required)
        })
    };
    let fields = |object: &Option<String>| FeatureFields {
        key: config.join_key.clone(),
        name: config.name_field.clone(),
        object: object.clone(),
    };
    let regions = {
        let path = config.regions.clone();
        let fields = fields(&config.regions_object);
        tokio::task::spawn_blocking(move || load_features(&path, &fields))
    };
    let background = {
        let path = config.background.clone();
        let fields = fields(&config.background_object);
        tokio::task::spawn_blocking(move || load_features(&path, &fields))
    };

    let (records, regions, background) = tokio::try_join!(
        flatten(tabular),
        flatten(regions),
        flatten(background)
    )?;

    info!(
        records = records.len(),
        regions = regions.len(),
        background = background.len(),
        "Loaded all sources"
    );
    Ok(Dataset {
        records,
        regions,
        background: background.into_iter().map(|f| f.geometry).collect(),
    })
}

async fn flatten<T>(
    handle: tokio::task::JoinHandle<Result<T, LoadError>>,
) -> Result<T, LoadError> {
    handle.await?
}
