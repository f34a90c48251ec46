use crate::error::{Result, SfrError};
use crate::grid::GridElevations;
use crate::interior::reach_centers;
use crate::network::NetworkModel;
use crate::routing::RoutingMap;
use serde::Serialize;
use tracing::info;

/// One reach along a flow path from a headwater to its outlet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRow {
    pub path: usize,
    pub segment: u32,
    pub reach: u32,
    /// Distance from the top of the path to the reach center.
    pub distance: f64,
    pub top_streambed: f64,
    pub model_top: Option<f64>,
}

/// Streambed profiles along every maximal flow path, for plotting.
pub fn build_profiles(
    network: &NetworkModel,
    routing: &RoutingMap,
    grid: Option<&dyn GridElevations>,
) -> Result<Vec<ProfileRow>> {
    let missing: Vec<u32> = network
        .segment_ids()
        .filter(|&id| network.reaches_of(id).iter().any(|r| r.top_streambed.is_none()))
        .collect();
    if !missing.is_empty() {
        return Err(SfrError::MissingColumns {
            columns: vec!["top_streambed"],
            segments: missing,
        });
    }

    let paths = routing.profile_paths();
    let mut rows = Vec::new();

    for (p, path) in paths.iter().enumerate() {
        let mut offset = 0.0;
        for &seg in path {
            let reaches = network.reaches_of(seg);
            let lengths: Vec<f64> = reaches.iter().map(|r| r.length_in_cell).collect();
            for (reach, center) in reaches.iter().zip(reach_centers(&lengths)) {
                rows.push(ProfileRow {
                    path: p + 1,
                    segment: seg,
                    reach: reach.reach,
                    distance: offset + center,
                    top_streambed: reach.top_streambed.unwrap_or(f64::NAN),
                    model_top: grid.and_then(|g| g.top(reach.node)),
                });
            }
            offset += lengths.iter().sum::<f64>();
        }
    }

    info!("Built {} profiles with {} reaches", paths.len(), rows.len());
    Ok(rows)
}
