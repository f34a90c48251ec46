//! Stream network preparation for a groundwater model's streamflow routing
//! (SFR) package: streambed elevation smoothing, slopes, channel widths,
//! conductance consolidation and routing diagnostics over the reach (Mat1)
//! and segment (Mat2) tables.

pub mod boundary;
pub mod cli;
pub mod conductance;
pub mod config;
pub mod error;
pub mod grid;
pub mod interior;
pub mod io;
pub mod network;
pub mod profile;
pub mod routing;
pub mod slope;
pub mod state;
pub mod width;

pub use boundary::{BoundaryOutcome, smooth_segment_ends};
pub use error::{Result, SfrError};
pub use interior::smooth_segment_interiors;
pub use network::{NetworkModel, Reach, Segment};
pub use routing::RoutingMap;
pub use slope::calculate_slopes;
