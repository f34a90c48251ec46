//! Error types for SFR network processing.

use thiserror::Error;

/// Formats a list of segment ids as `1, 2, 3`.
fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while building or processing a stream network.
#[derive(Debug, Error)]
pub enum SfrError {
    /// One or more segments route into themselves.
    #[error("circular routing in segments {}; fix outseg in the segment table before continuing", join_ids(.segments))]
    CircularRouting { segments: Vec<u32> },

    /// A segment id appears more than once in the segment table.
    #[error("segment {0} is listed more than once in the segment table")]
    DuplicateSegment(u32),

    /// Reaches reference segments missing from the segment table.
    #[error("reaches reference segments not in the segment table: {}", join_ids(.segments))]
    UnknownSegment { segments: Vec<u32> },

    /// A segment routes into a segment that does not exist.
    #[error("segment {segment} routes to unknown segment {outseg}")]
    UnknownOutseg { segment: u32, outseg: i64 },

    /// Segments listed in the segment table have no reaches.
    #[error("segments have no reaches: {}", join_ids(.segments))]
    EmptySegment { segments: Vec<u32> },

    /// The same reach number appears twice within a segment.
    #[error("segment {segment} has reach {reach} more than once")]
    DuplicateReach { segment: u32, reach: u32 },

    /// A processing stage ran before the columns it depends on were populated.
    #[error("columns {columns:?} not populated for segments {}; run the stage that computes them first", join_ids(.segments))]
    MissingColumns {
        columns: Vec<&'static str>,
        segments: Vec<u32>,
    },

    /// A reach refers to a grid cell the grid does not have.
    #[error("node {node} of segment {segment} reach {reach} is outside the model grid")]
    NodeOutOfGrid { segment: u32, reach: u32, node: u32 },

    /// A reach has no node number and no row and column to derive it from.
    #[error("segment {segment} reach {reach} has no node; supply node, or row and column with the grid column count")]
    MissingNode { segment: u32, reach: u32 },

    /// A layer bottom array does not cover the same cells as the model top.
    #[error("bottom of layer {layer} has {found} cells but the model top has {expected}")]
    GridShape {
        layer: usize,
        expected: usize,
        found: usize,
    },

    /// A value in a grid elevation file could not be parsed.
    #[error("invalid value {value:?} at position {position} in grid elevation file")]
    Parse { position: usize, value: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SfrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_routing_names_every_segment() {
        let err = SfrError::CircularRouting {
            segments: vec![4, 7],
        };
        assert!(err.to_string().contains("4, 7"));
    }

    #[test]
    fn missing_columns_lists_columns_and_segments() {
        let err = SfrError::MissingColumns {
            columns: vec!["Max", "Min"],
            segments: vec![2],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"Max\""));
        assert!(msg.contains("segments 2"));
    }
}
