use crate::boundary::bounds_from_table;
use crate::config::SingleReachSlope;
use crate::error::{Result, SfrError};
use crate::network::NetworkModel;
use tracing::{debug, info};

/// Raw slopes of one segment's reaches, downstream positive.
///
/// Each reach uses the drop to the next reach over its own length; the last
/// reach reuses the previous drop over its own length.
pub fn segment_slopes(tops: &[f64], lengths: &[f64]) -> Vec<f64> {
    let n = tops.len();
    if n < 2 {
        return Vec::new();
    }
    let mut diffs: Vec<f64> = tops.windows(2).map(|w| w[1] - w[0]).collect();
    diffs.push(diffs[n - 2]);
    diffs
        .iter()
        .zip(lengths)
        .map(|(d, len)| d / len * -1.0)
        .collect()
}

/// Slope of a segment made of a single reach.
pub fn single_reach_slope(max: f64, min: f64, length: f64, rule: SingleReachSlope) -> f64 {
    match rule {
        SingleReachSlope::Unflipped => (min - max) / length,
        SingleReachSlope::Downstream => (max - min) / length,
    }
}

/// Anything not above the floor, NaN included, becomes the floor.
pub fn enforce_minimum(slope: f64, minimum_slope: f64) -> f64 {
    if slope > minimum_slope {
        slope
    } else {
        minimum_slope
    }
}

/// Assigns `bed_slope` to every reach from the smoothed streambed tops.
pub fn calculate_slopes(
    network: &mut NetworkModel,
    minimum_slope: f64,
    single_reach: SingleReachSlope,
) -> Result<()> {
    info!("Calculating slopes...");
    let bounds = bounds_from_table(network)?;

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

    let mut floored = 0;
    for (seg, bound) in bounds.iter() {
        let reaches = network.reaches_of_mut(seg);
        let slopes = if reaches.len() == 1 {
            vec![single_reach_slope(
                bound.max,
                bound.min,
                reaches[0].length_in_cell,
                single_reach,
            )]
        } else {
            let tops: Vec<f64> = reaches.iter().filter_map(|r| r.top_streambed).collect();
            let lengths: Vec<f64> = reaches.iter().map(|r| r.length_in_cell).collect();
            segment_slopes(&tops, &lengths)
        };

        for (reach, slope) in reaches.iter_mut().zip(slopes) {
            let clamped = enforce_minimum(slope, minimum_slope);
            if clamped != slope {
                floored += 1;
            }
            reach.bed_slope = Some(clamped);
        }
    }

    debug!("{} reach slopes raised to the minimum of {}", floored, minimum_slope);
    Ok(())
}
