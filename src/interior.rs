//! Streambed elevations for the reaches inside each segment.

use crate::boundary::bounds_from_table;
use crate::error::{Result, SfrError};
use crate::io::report::AuditReport;
use crate::network::NetworkModel;
use indicatif::ProgressBar;
use std::io::Write;
use tracing::{debug, info, warn};

pub const REPORT_TITLE: &str = "Segment interior smoothing report";
pub const REPORT_COLUMNS: &str = "segment, reach, land_surface, minelev, dist, slope, sb_elev";

/// Distances to reach centers along the segment.
pub fn reach_centers(lengths: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    lengths
        .iter()
        .map(|&len| {
            total += len;
            total - 0.5 * len
        })
        .collect()
}

// Walk state for one segment
#[derive(Debug, Clone)]
struct InteriorState {
    /// Elevation at the last anchor; nothing downstream may rise above it.
    floor: f64,
    anchor: usize,
    elevations: Vec<f64>,
}

struct SegmentProfile<'a> {
    segment: u32,
    elevs: &'a [f64],
    cdist: &'a [f64],
}

impl SegmentProfile<'_> {
    // Linear ramp from the current anchor down (or up) to the working elevation at `stop`
    fn ramp<W: Write>(
        &self,
        mut state: InteriorState,
        stop: usize,
        report: &mut AuditReport<W>,
    ) -> Result<InteriorState> {
        let start = state.anchor;
        let target = self.elevs[stop];
        let dx = self.cdist[stop] - self.cdist[start];
        let ds = state.floor - target;
        let slope = if ds == 0.0 || dx == 0.0 { 0.0 } else { ds / dx };

        for i in start + 1..=stop {
            let dist = self.cdist[i] - self.cdist[start];
            let elev = if i == stop || dx == 0.0 {
                target
            } else {
                state.floor - dist * slope
            };
            state.elevations.push(elev);
            report.entry(format_args!(
                "{},{},{:.2},{:.2},{:.2},{:.2e},{:.2}",
                self.segment,
                i + 1,
                self.elevs[i],
                state.floor,
                dist,
                slope,
                elev
            ))?;
        }

        state.floor = target;
        state.anchor = stop;
        Ok(state)
    }
}

/// Streambed elevations for one segment's reaches, from `start` at the first
/// reach to `end` at the last.
///
/// Walking downstream, each reach whose land surface is at or below the
/// current floor becomes a new anchor and the reaches since the previous
/// anchor are interpolated by distance. Reaches above the floor are skipped.
/// A land surface below `end` ends the walk with one ramp to the last reach.
pub fn interpolate_segment<W: Write>(
    segment: u32,
    start: f64,
    end: f64,
    landsurface: &[f64],
    lengths: &[f64],
    report: &mut AuditReport<W>,
) -> Result<Vec<f64>> {
    let n = landsurface.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    if start == end {
        return Ok(vec![start; n]);
    }

    let mut elevs = landsurface.to_vec();
    elevs[n - 1] = end;
    let cdist = reach_centers(lengths);
    let profile = SegmentProfile {
        segment,
        elevs: &elevs,
        cdist: &cdist,
    };

    let mut state = InteriorState {
        floor: start,
        anchor: 0,
        elevations: Vec::with_capacity(n),
    };
    state.elevations.push(start);

    if n == 1 {
        return Ok(state.elevations);
    }

    if start < end {
        warn!(
            "Segment {} still has Min {} above Max {}; interpolating straight between them",
            segment, end, start
        );
        return Ok(profile.ramp(state, n - 1, report)?.elevations);
    }

    for i in 1..n {
        if elevs[i] <= state.floor {
            if elevs[i] >= end {
                state = profile.ramp(state, i, report)?;
            } else {
                state = profile.ramp(state, n - 1, report)?;
                break;
            }
        }
    }

    Ok(state.elevations)
}

/// Assigns `top_streambed` to every reach from the segment `Max`/`Min` columns.
pub fn smooth_segment_interiors<W: Write>(
    network: &mut NetworkModel,
    report: &mut AuditReport<W>,
    progress: &ProgressBar,
) -> Result<()> {
    info!("Smoothing segment interiors...");
    let bounds = bounds_from_table(network)?;

    let missing: Vec<u32> = network
        .segment_ids()
        .filter(|&id| network.reaches_of(id).iter().any(|r| r.landsurface.is_none()))
        .collect();
    if !missing.is_empty() {
        return Err(SfrError::MissingColumns {
            columns: vec!["landsurface"],
            segments: missing,
        });
    }

    report.header(REPORT_TITLE, REPORT_COLUMNS)?;
    progress.set_length(bounds.len() as u64);

    for (seg, bound) in bounds.iter() {
        let reaches = network.reaches_of_mut(seg);
        let landsurface: Vec<f64> = reaches.iter().filter_map(|r| r.landsurface).collect();
        let lengths: Vec<f64> = reaches.iter().map(|r| r.length_in_cell).collect();

        let tops = interpolate_segment(seg, bound.max, bound.min, &landsurface, &lengths, report)?;
        for (reach, top) in reaches.iter_mut().zip(tops) {
            reach.top_streambed = Some(top);
        }
        debug!("Segment {}: {} reaches smoothed", seg, reaches.len());
        progress.inc(1);
    }

    progress.finish_and_clear();
    info!("Segment interiors smoothed; {} interpolated points", report.entries());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn interpolate(start: f64, end: f64, landsurface: &[f64], lengths: &[f64]) -> Vec<f64> {
        let mut report = AuditReport::new(Vec::new());
        interpolate_segment(1, start, end, landsurface, lengths, &mut report).unwrap()
    }

    #[test]
    fn reach_centers_are_cumulative_midpoints() {
        assert_eq!(reach_centers(&[10.0, 20.0, 10.0]), vec![5.0, 20.0, 35.0]);
    }

    #[test]
    fn flat_segment_gets_constant_elevation() {
        assert_eq!(interpolate(50.0, 50.0, &[55.0, 52.0], &[1.0, 1.0]), vec![50.0, 50.0]);
    }

    #[test]
    fn descending_land_surface_is_followed() {
        let tops = interpolate(100.0, 70.0, &[100.0, 90.0, 80.0, 60.0], &[10.0; 4]);
        assert_eq!(tops, vec![100.0, 90.0, 80.0, 70.0]);
    }

    #[test]
    fn bumps_above_the_floor_are_interpolated_over() {
        // reach 2 rises above the floor and is skipped; reach 3 anchors
        let tops = interpolate(100.0, 80.0, &[100.0, 105.0, 90.0, 85.0], &[10.0; 4]);
        assert_relative_eq!(tops[1], 95.0);
        assert_eq!(tops[2], 90.0);
        assert_eq!(tops[3], 80.0);
    }

    #[test]
    fn dip_below_end_ramps_to_the_last_reach() {
        let tops = interpolate(100.0, 70.0, &[100.0, 60.0, 90.0, 75.0], &[10.0; 4]);
        assert_relative_eq!(tops[1], 90.0);
        assert_relative_eq!(tops[2], 80.0);
        assert_eq!(tops[3], 70.0);
    }

    #[test]
    fn uneven_lengths_weight_the_ramp() {
        // centers at 5, 20, 35; drop of 30 over 30 units
        let tops = interpolate(100.0, 70.0, &[100.0, 200.0, 0.0], &[10.0, 20.0, 10.0]);
        assert_relative_eq!(tops[1], 85.0);
        assert_eq!(tops[2], 70.0);
    }

    #[test]
    fn backwards_segment_ramps_straight_between_bounds() {
        let tops = interpolate(60.0, 65.0, &[70.0, 50.0, 50.0], &[10.0; 3]);
        assert_eq!(tops[0], 60.0);
        assert_eq!(tops[2], 65.0);
    }

    #[test]
    fn report_lists_each_point() {
        let mut report = AuditReport::new(Vec::new());
        interpolate_segment(7, 100.0, 80.0, &[100.0, 90.0, 85.0], &[10.0; 3], &mut report).unwrap();
        assert_eq!(report.entries(), 2);
        let text = String::from_utf8(report.finish().unwrap()).unwrap();
        assert!(text.starts_with("7,2,90.00,100.00,10.00,1.00e0,90.00"));
    }

    #[test]
    fn interiors_require_segment_bounds() {
        let mut net = crate::network::tests::network(&[(1, 0, vec![10.0, 9.0])]);
        let mut report = AuditReport::new(Vec::new());
        let err = smooth_segment_interiors(&mut net, &mut report, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, SfrError::MissingColumns { ref columns, .. } if columns == &vec!["Max", "Min"]));
    }
}
