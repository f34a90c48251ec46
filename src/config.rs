use std::path::{Path, PathBuf};

/// `outseg` values at or above this mark the network outlet, as do values <= 0.
pub const OUTLET_SENTINEL: i64 = 999_999;

pub const DEFAULT_MINIMUM_SLOPE: f64 = 1e-4;

/// Model length units (feet) to kilometers.
pub const DEFAULT_TO_KM: f64 = 0.000_304_8;

pub const DEFAULT_BED_K_MIN: f64 = 1e-8;

/// Thinnest layer left when bottoms are pushed under a raised model top.
pub const DEFAULT_MINIMUM_THICKNESS: f64 = 1.0;

pub const SEGMENT_ENDS_REPORT: &str = "smooth_segment_ends.txt";
pub const SEGMENT_INTERIORS_REPORT: &str = "smooth_segment_interiors.txt";
pub const TOP_ADJUSTMENTS_REPORT: &str = "adjustments_to_model_top.csv";

/// Returns true when an `outseg` value means "no downstream segment".
pub fn is_outlet(outseg: i64) -> bool {
    outseg <= 0 || outseg >= OUTLET_SENTINEL
}

/// How the slope of a segment with a single reach is computed.
///
/// Multi-reach segments flip the sign of the forward elevation difference so
/// downstream is positive. `Unflipped` is the required default: it takes
/// `Min - Max` without that flip, so a falling single-reach segment comes out
/// negative and is clamped to the minimum slope. `Downstream` uses the
/// multi-reach sign convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SingleReachSlope {
    /// `(Min - Max) / length`
    #[default]
    Unflipped,
    /// `(Max - Min) / length`
    Downstream,
}

// Parameters for the smoothing, width and conductance stages
#[derive(Debug, Clone)]
pub struct SmoothingConfig {
    pub minimum_slope: f64,
    pub single_reach_slope: SingleReachSlope,
    pub to_km: f64,
    pub bed_k_min: f64,
    pub ends_report: PathBuf,
    pub interiors_report: PathBuf,
}

impl SmoothingConfig {
    pub fn new() -> Self {
        SmoothingConfig {
            minimum_slope: DEFAULT_MINIMUM_SLOPE,
            single_reach_slope: SingleReachSlope::default(),
            to_km: DEFAULT_TO_KM,
            bed_k_min: DEFAULT_BED_K_MIN,
            ends_report: PathBuf::from(SEGMENT_ENDS_REPORT),
            interiors_report: PathBuf::from(SEGMENT_INTERIORS_REPORT),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// `tables/mat1.csv` -> `tables/mat1_elevs.csv`
pub fn elevs_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}_elevs.csv", stem))
}

/// `grid/botm1.txt` -> `grid/botm1_adjusted.txt`
pub fn adjusted_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match input.extension() {
        Some(ext) => input.with_file_name(format!("{}_adjusted.{}", stem, ext.to_string_lossy())),
        None => input.with_file_name(format!("{}_adjusted", stem)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlet_values() {
        assert!(is_outlet(0));
        assert!(is_outlet(-1));
        assert!(is_outlet(OUTLET_SENTINEL));
        assert!(!is_outlet(1));
        assert!(!is_outlet(OUTLET_SENTINEL - 1));
    }

    #[test]
    fn elevs_path_keeps_directory() {
        let p = elevs_path(Path::new("data/Mat2.csv"));
        assert_eq!(p, PathBuf::from("data/Mat2_elevs.csv"));
    }

    #[test]
    fn adjusted_path_keeps_extension() {
        assert_eq!(
            adjusted_path(Path::new("grid/botm1.txt")),
            PathBuf::from("grid/botm1_adjusted.txt")
        );
        assert_eq!(adjusted_path(Path::new("top")), PathBuf::from("top_adjusted"));
    }
}
