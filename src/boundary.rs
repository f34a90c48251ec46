//! Network-level repair of segment end elevations.
//!
//! Every segment gets a ceiling (`Max`) and floor (`Min`) so that elevations
//! never rise going downstream: a segment cannot start higher than the lowest
//! segment flowing into it, and a floor that ends up above its ceiling is
//! pulled down to elevations taken from further and further downstream.

use crate::error::{Result, SfrError};
use crate::io::report::AuditReport;
use crate::network::NetworkModel;
use crate::routing::RoutingMap;
use crate::state::{BoundaryElevation, BoundaryState};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info, warn};

pub const REPORT_TITLE: &str = "Segment end smoothing report";
pub const REPORT_COLUMNS: &str = "segment,max_elev,min_elev,downstream_min_elev";

/// Which bound of the downstream segment replaces a backwards floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownstreamBound {
    Max,
    Min,
}

/// What each upstream segment contributes to the ceiling of the segment below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpstreamBound {
    Floor,
    Lowest,
}

/// Diagnostic bounds of one segment and its neighbors after repair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundarySummary {
    pub segment: u32,
    #[serde(rename = "upstreamMax")]
    pub upstream_max: f64,
    #[serde(rename = "upstreamMin")]
    pub upstream_min: f64,
    #[serde(rename = "Max")]
    pub max: f64,
    #[serde(rename = "Min")]
    pub min: f64,
    #[serde(rename = "downstreamMax")]
    pub downstream_max: Option<f64>,
    #[serde(rename = "downstreamMin")]
    pub downstream_min: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BoundaryOutcome {
    /// Repair rounds used; 0 when no segment needed repair.
    pub rounds: usize,
    /// Segments still backwards after the last round.
    pub unresolved: Vec<u32>,
    pub summary: Vec<BoundarySummary>,
}

/// Ceiling and floor of each segment from the land surface along its reaches.
pub fn initial_bounds(network: &NetworkModel) -> Result<BoundaryState> {
    let mut state = BoundaryState::new();
    let mut missing = Vec::new();

    for id in network.segment_ids() {
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        for reach in network.reaches_of(id) {
            match reach.landsurface {
                Some(z) => {
                    max = max.max(z);
                    min = min.min(z);
                }
                None => {
                    missing.push(id);
                    break;
                }
            }
        }
        state.insert(id, BoundaryElevation::new(max, min));
    }

    if !missing.is_empty() {
        return Err(SfrError::MissingColumns {
            columns: vec!["landsurface"],
            segments: missing,
        });
    }
    Ok(state)
}

/// Current `Max`/`Min` columns of the segment table.
pub fn bounds_from_table(network: &NetworkModel) -> Result<BoundaryState> {
    let mut state = BoundaryState::new();
    let mut missing = Vec::new();
    for seg in network.segments() {
        match (seg.max, seg.min) {
            (Some(max), Some(min)) => state.insert(seg.segment, BoundaryElevation::new(max, min)),
            _ => missing.push(seg.segment),
        }
    }
    if !missing.is_empty() {
        return Err(SfrError::MissingColumns {
            columns: vec!["Max", "Min"],
            segments: missing,
        });
    }
    Ok(state)
}

fn upstream_limit(
    network: &NetworkModel,
    state: &BoundaryState,
    segment: u32,
    contribution: impl Fn(BoundaryElevation) -> f64,
) -> Option<f64> {
    network
        .upsegs(segment)
        .iter()
        .filter_map(|&u| state.get(u))
        .map(contribution)
        .reduce(f64::min)
}

// Lower each ceiling to the lowest elevation flowing into the segment
fn enforce_upstream_ceiling(
    network: &NetworkModel,
    state: &BoundaryState,
    upstream: UpstreamBound,
) -> BoundaryState {
    state
        .iter()
        .map(|(seg, bound)| {
            let limit = upstream_limit(network, state, seg, |b| match upstream {
                UpstreamBound::Floor => b.min,
                UpstreamBound::Lowest => b.lowest(),
            })
            .unwrap_or(bound.max);
            if limit < bound.max {
                (seg, bound.with_max(limit))
            } else {
                (seg, bound)
            }
        })
        .collect()
}

// Replace the floors of backwards segments with a bound `level + 1` steps downstream
fn replace_downstream<W: Write>(
    state: &BoundaryState,
    routing: &RoutingMap,
    backwards: &[u32],
    level: usize,
    which: DownstreamBound,
    report: &mut AuditReport<W>,
) -> Result<BoundaryState> {
    let mut next = state.clone();

    for &seg in backwards {
        let Some(bound) = state.get(seg) else {
            continue;
        };
        let downstream = routing
            .downstream_at(seg, level)
            .and_then(|d| state.get(d))
            .map(|d| match which {
                DownstreamBound::Max => d.max,
                DownstreamBound::Min => d.min,
            })
            .unwrap_or_else(|| bound.lowest());

        let replaced = bound.with_min(downstream);
        next.insert(seg, replaced);
        report.entry(format_args!(
            "{},{},{},{}",
            seg, replaced.max, replaced.min, downstream
        ))?;
    }

    Ok(next)
}

/// Repairs `initial` until no segment is backwards or every downstream level
/// has been tried. Returns the repaired state and the number of rounds used;
/// segments still backwards at the end are logged and left in the state.
///
/// The round bound is the longest downstream path plus the outlet level. It
/// keeps the loop finite but does not guarantee every topology converges.
pub fn repair_bounds<W: Write>(
    network: &NetworkModel,
    routing: &RoutingMap,
    initial: &BoundaryState,
    report: &mut AuditReport<W>,
) -> Result<(BoundaryState, usize)> {
    let mut state = enforce_upstream_ceiling(network, initial, UpstreamBound::Floor);
    let mut backwards = state.backwards();
    if backwards.is_empty() {
        return Ok((state, 0));
    }

    debug!("{} backwards segments before repair", backwards.len());
    let levels = routing.max_depth() + 1;
    let mut rounds = 0;

    for level in 0..levels {
        rounds = level + 1;

        state = replace_downstream(
            &state,
            routing,
            &backwards,
            level,
            DownstreamBound::Max,
            report,
        )?;
        backwards = state.backwards();

        if !backwards.is_empty() {
            state = replace_downstream(
                &state,
                routing,
                &backwards,
                level,
                DownstreamBound::Min,
                report,
            )?;
        }

        state = enforce_upstream_ceiling(network, &state, UpstreamBound::Lowest);
        backwards = state.backwards();
        debug!(
            "Round {}: {} backwards segments remain",
            rounds,
            backwards.len()
        );
        if backwards.is_empty() {
            break;
        }
    }

    if !backwards.is_empty() {
        warn!(
            "{} segments still have minimum elevations above their maximum after {} rounds: {:?}",
            backwards.len(),
            rounds,
            backwards
        );
    }
    Ok((state, rounds))
}

fn summarize(network: &NetworkModel, state: &BoundaryState) -> Vec<BoundarySummary> {
    state
        .iter()
        .map(|(seg, bound)| {
            let downstream = network.downstream(seg).and_then(|d| state.get(d));
            BoundarySummary {
                segment: seg,
                upstream_max: upstream_limit(network, state, seg, |b| b.max).unwrap_or(bound.max),
                upstream_min: upstream_limit(network, state, seg, |b| b.min).unwrap_or(bound.max),
                max: bound.max,
                min: bound.min,
                downstream_max: downstream.map(|d| d.max),
                downstream_min: downstream.map(|d| d.min),
            }
        })
        .collect()
}

/// Smooths segment end elevations so they decrease monotonically down the
/// network, writing `Max` and `Min` to the segment table.
///
/// Every replacement and a closing summary table go to `report`.
pub fn smooth_segment_ends<W: Write>(
    network: &mut NetworkModel,
    routing: &RoutingMap,
    report: &mut AuditReport<W>,
) -> Result<BoundaryOutcome> {
    info!("Smoothing segment ends...");
    report.header(REPORT_TITLE, REPORT_COLUMNS)?;

    let initial = initial_bounds(network)?;
    let (state, rounds) = repair_bounds(network, routing, &initial, report)?;

    let unresolved = state.backwards();

    for seg in network.segments_mut() {
        if let Some(bound) = state.get(seg.segment) {
            seg.max = Some(bound.max);
            seg.min = Some(bound.min);
        }
    }

    let summary = summarize(network, &state);
    {
        let mut wtr = csv::Writer::from_writer(report.writer());
        for row in &summary {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }

    info!("Segment ends smoothing finished in {} iterations", rounds);
    Ok(BoundaryOutcome {
        rounds,
        unresolved,
        summary,
    })
}
