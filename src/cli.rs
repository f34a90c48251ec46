use crate::config::{
    DEFAULT_BED_K_MIN, DEFAULT_MINIMUM_SLOPE, DEFAULT_MINIMUM_THICKNESS, DEFAULT_TO_KM,
    SEGMENT_ENDS_REPORT, SEGMENT_INTERIORS_REPORT, SingleReachSlope, SmoothingConfig,
    TOP_ADJUSTMENTS_REPORT,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Prepare SFR stream network tables for a groundwater flow model
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Smooth segment end and interior streambed elevations, then compute slopes
    Smooth {
        #[command(flatten)]
        tables: TableArgs,

        /// Whitespace-separated model top elevations by cell number, used as the land surface
        #[arg(long)]
        landsurface: Option<PathBuf>,

        /// Slopes at or below this value are raised to it
        #[arg(long, default_value_t = DEFAULT_MINIMUM_SLOPE)]
        minimum_slope: f64,

        /// Slope rule for segments with a single reach
        #[arg(long, value_enum, default_value_t = SingleReachSlope::Unflipped)]
        single_reach_slope: SingleReachSlope,

        /// Report of segment end adjustments
        #[arg(long, default_value = SEGMENT_ENDS_REPORT)]
        ends_report: PathBuf,

        /// Report of interior interpolation
        #[arg(long, default_value = SEGMENT_INTERIORS_REPORT)]
        interiors_report: PathBuf,
    },
    /// Estimate channel widths from arbolate sums
    Widths {
        #[command(flatten)]
        tables: TableArgs,

        /// Multiplier from model length units to kilometers
        #[arg(long, default_value_t = DEFAULT_TO_KM)]
        to_km: f64,
    },
    /// Move streambed conductance of collocated reaches onto the widest reach
    Conductance {
        #[command(flatten)]
        tables: TableArgs,

        /// Bed K assigned to the non-dominant collocated reaches
        #[arg(long, default_value_t = DEFAULT_BED_K_MIN)]
        bed_k_min: f64,
    },
    /// Record the outlet segment each segment and reach drains to
    Outlets {
        #[command(flatten)]
        tables: TableArgs,
    },
    /// Write streambed profiles along every flow path
    Profiles {
        #[command(flatten)]
        tables: TableArgs,

        /// Output CSV of profile points
        #[arg(short, long, default_value = "profiles.csv")]
        output: PathBuf,

        /// Whitespace-separated model top elevations by cell number
        #[arg(long)]
        model_top: Option<PathBuf>,
    },
    /// Reset the model top in stream cells to the highest streambed top and
    /// push layer bottoms down to keep a minimum thickness
    AdjustTop {
        #[command(flatten)]
        tables: TableArgs,

        /// Whitespace-separated model top elevations by cell number
        #[arg(long)]
        model_top: PathBuf,

        /// Layer bottom elevations by cell number, one file per layer, top layer first
        #[arg(long = "botm")]
        bottoms: Vec<PathBuf>,

        /// Thinnest layer allowed after bottoms are lowered
        #[arg(long, default_value_t = DEFAULT_MINIMUM_THICKNESS)]
        minimum_thickness: f64,

        /// Per-reach summary of the changes to the model top
        #[arg(long, default_value = TOP_ADJUSTMENTS_REPORT)]
        summary: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct TableArgs {
    /// Reach table (Mat1) CSV
    pub mat1: PathBuf,

    /// Segment table (Mat2) CSV
    pub mat2: PathBuf,

    /// Where to save the updated reach table
    #[arg(long)]
    pub mat1_out: Option<PathBuf>,

    /// Where to save the updated segment table
    #[arg(long)]
    pub mat2_out: Option<PathBuf>,

    /// Grid column count, for numbering cells of reaches that only have row and column
    #[arg(long)]
    pub ncol: Option<u32>,
}

impl Command {
    pub fn tables(&self) -> &TableArgs {
        match self {
            Command::Smooth { tables, .. }
            | Command::Widths { tables, .. }
            | Command::Conductance { tables, .. }
            | Command::Outlets { tables }
            | Command::Profiles { tables, .. }
            | Command::AdjustTop { tables, .. } => tables,
        }
    }

    /// Stage parameters, with defaults for whatever this command does not set.
    pub fn smoothing_config(&self) -> SmoothingConfig {
        let mut config = SmoothingConfig::new();
        match self {
            Command::Smooth {
                minimum_slope,
                single_reach_slope,
                ends_report,
                interiors_report,
                ..
            } => {
                config.minimum_slope = *minimum_slope;
                config.single_reach_slope = *single_reach_slope;
                config.ends_report = ends_report.clone();
                config.interiors_report = interiors_report.clone();
            }
            Command::Widths { to_km, .. } => config.to_km = *to_km,
            Command::Conductance { bed_k_min, .. } => config.bed_k_min = *bed_k_min,
            Command::Outlets { .. } | Command::Profiles { .. } | Command::AdjustTop { .. } => {}
        }
        config
    }
}

pub fn get_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn smooth_arguments_fill_the_config() {
        let cli = Cli::try_parse_from([
            "sfr_rs",
            "smooth",
            "mat1.csv",
            "mat2.csv",
            "--minimum-slope",
            "0.001",
            "--single-reach-slope",
            "downstream",
        ])
        .unwrap();
        let config = cli.command.smoothing_config();
        assert_eq!(config.minimum_slope, 0.001);
        assert_eq!(config.single_reach_slope, SingleReachSlope::Downstream);
        assert_eq!(config.ends_report, PathBuf::from(SEGMENT_ENDS_REPORT));
        assert_eq!(cli.command.tables().mat2, PathBuf::from("mat2.csv"));
    }

    #[test]
    fn adjust_top_takes_one_bottom_per_layer() {
        let cli = Cli::try_parse_from([
            "sfr_rs",
            "adjust-top",
            "mat1.csv",
            "mat2.csv",
            "--ncol",
            "120",
            "--model-top",
            "top.txt",
            "--botm",
            "botm1.txt",
            "--botm",
            "botm2.txt",
        ])
        .unwrap();
        assert_eq!(cli.command.tables().ncol, Some(120));
        match cli.command {
            Command::AdjustTop {
                bottoms,
                minimum_thickness,
                summary,
                ..
            } => {
                assert_eq!(bottoms, vec![PathBuf::from("botm1.txt"), PathBuf::from("botm2.txt")]);
                assert_eq!(minimum_thickness, DEFAULT_MINIMUM_THICKNESS);
                assert_eq!(summary, PathBuf::from(TOP_ADJUSTMENTS_REPORT));
            }
            other => panic!("expected adjust-top, got {:?}", other),
        }
    }
}
