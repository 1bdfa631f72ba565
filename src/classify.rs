use crate::types::TabularRecord;
use std::fmt;
use thiserror::Error;

pub const CLASS_COUNT: usize = 5;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Color {
    pub rgb: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("invalid hex color '{0}'")]
    InvalidHex(String),
    #[error("palette needs exactly 5 colors, got {0}")]
    PaletteSize(usize),
}

impl Color {
    /// Gray used for regions without a numeric value.
    pub const NO_DATA: Color = Color::rgb(0xCC, 0xCC, 0xCC);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 0xFF);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { rgb: [r, g, b] }
    }

    /// Accepts `#rgb` and `#rrggbb`, with or without the leading `#`.
    pub fn parse(hex: &str) -> Result<Self, ColorError> {
        let digits = hex.trim().trim_start_matches('#');
        let err = || ColorError::InvalidHex(hex.to_string());
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());
        match digits.len() {
            3 => {
                let expand = |i: usize| channel(&digits[i..i + 1].repeat(2));
                Ok(Self::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Self::rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.rgb;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// Five class colors ordered low to high.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [Color; CLASS_COUNT],
}

impl Palette {
    pub const fn new(colors: [Color; CLASS_COUNT]) -> Self {
        Self { colors }
    }

    pub fn from_hex<S: AsRef<str>>(hex: &[S]) -> Result<Self, ColorError> {
        if hex.len() != CLASS_COUNT {
            return Err(ColorError::PaletteSize(hex.len()));
        }
        let mut colors = [Color::NO_DATA; CLASS_COUNT];
        for (slot, h) in colors.iter_mut().zip(hex) {
            *slot = Color::parse(h.as_ref())?;
        }
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[Color; CLASS_COUNT] {
        &self.colors
    }

    pub fn contains(&self, color: Color) -> bool {
        self.colors.contains(&color)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new([
            Color::rgb(0xed, 0xf8, 0xfb),
            Color::rgb(0xb2, 0xe2, 0xe2),
            Color::rgb(0x66, 0xc2, 0xa4),
            Color::rgb(0x2c, 0xa2, 0x5f),
            Color::rgb(0x00, 0x6d, 0x2c),
        ])
    }
}

/// Quantile classification of one attribute into the palette's five classes.
///
/// The domain only ever holds finite values; thresholds are the 20/40/60/80%
/// quantiles of that domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    palette: Palette,
    thresholds: Vec<f64>,
}

impl ColorScale {
    pub fn quantile<I>(values: I, palette: Palette) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut domain: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        domain.sort_by(f64::total_cmp);

        let thresholds = if domain.is_empty() {
            Vec::new()
        } else {
            (1..CLASS_COUNT)
                .map(|k| quantile_sorted(&domain, k as f64 / CLASS_COUNT as f64))
                .collect()
        };

        Self {
            palette,
            thresholds,
        }
    }

    /// Builds the scale from every record's value for `attribute`.
    /// Records with a missing or non-numeric cell do not contribute.
    pub fn from_records(records: &[TabularRecord], attribute: &str, palette: Palette) -> Self {
        Self::quantile(records.iter().filter_map(|r| r.value(attribute)), palette)
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Class index in `0..CLASS_COUNT` for a finite value.
    pub fn class_of(&self, value: f64) -> usize {
        self.thresholds.partition_point(|t| *t <= value)
    }

    pub fn color(&self, value: f64) -> Color {
        self.palette.colors[self.class_of(value)]
    }
}

/// Linear interpolation between closest ranks over an ascending slice.
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (h - lo as f64)
}

/// Display color for a possibly missing value.
pub fn choropleth(value: Option<f64>, scale: &ColorScale) -> Color {
    match value {
        Some(v) if v.is_finite() => scale.color(v),
        _ => Color::NO_DATA,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(Color::parse("#CCC").unwrap(), Color::NO_DATA);
        assert_eq!(Color::parse("006d2c").unwrap(), Color::rgb(0, 0x6d, 0x2c));
        assert!(Color::parse("#12345").is_err());
        assert!(Color::parse("#zzz").is_err());
        assert_eq!(Color::rgb(0xed, 0xf8, 0xfb).to_string(), "#edf8fb");
    }

    #[test]
    fn palette_requires_five_colors() {
        assert_eq!(
            Palette::from_hex(&["#000", "#fff"]),
            Err(ColorError::PaletteSize(2))
        );
    }

    #[test]
    fn quantile_thresholds_split_equal_counts() {
        let scale = ColorScale::quantile((1..=10).map(f64::from), Palette::default());
        let expected = [2.8, 4.6, 6.4, 8.2];
        assert_eq!(scale.thresholds().len(), expected.len());
        for (got, want) in scale.thresholds().iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
        let classes: Vec<usize> = (1..=10).map(|v| scale.class_of(f64::from(v))).collect();
        assert_eq!(classes, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn non_numeric_values_do_not_shift_breaks() {
        let clean = ColorScale::quantile([10.0, 50.0, 90.0], Palette::default());
        let noisy = ColorScale::quantile(
            [10.0, f64::NAN, 50.0, f64::INFINITY, 90.0],
            Palette::default(),
        );
        assert_eq!(clean, noisy);
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let a = ColorScale::quantile(values, Palette::default());
        let b = ColorScale::quantile(values, Palette::default());
        assert_eq!(a.thresholds(), b.thresholds());
        for v in values {
            assert_eq!(a.color(v), b.color(v));
        }
    }

    #[test]
    fn three_values_use_at_most_three_colors() {
        let scale = ColorScale::quantile([10.0, 50.0, 90.0], Palette::default());
        let mut colors: Vec<Color> = [10.0, 50.0, 90.0].iter().map(|v| scale.color(*v)).collect();
        colors.dedup();
        assert!(colors.len() <= 3);
        assert_eq!(scale.color(10.0), Palette::default().colors()[0]);
        assert_eq!(scale.color(90.0), Palette::default().colors()[4]);
    }

    #[test]
    fn choropleth_falls_back_to_no_data() {
        let scale = ColorScale::quantile([1.0, 2.0], Palette::default());
        assert_eq!(choropleth(None, &scale), Color::NO_DATA);
        assert_eq!(choropleth(Some(f64::NAN), &scale), Color::NO_DATA);
        for v in [-1e9, 0.0, 1.5, 2.0, 1e9] {
            assert!(scale.palette().contains(choropleth(Some(v), &scale)));
        }
    }

    #[test]
    fn empty_domain_never_panics() {
        let scale = ColorScale::quantile(Vec::new(), Palette::default());
        assert!(scale.thresholds().is_empty());
        assert_eq!(scale.color(42.0), Palette::default().colors()[0]);
    }
}
