use crate::network::{NetworkModel, Reach};
use std::collections::BTreeMap;
use tracing::info;

/// Streambed conductance of one reach, `K * w * L / thickness`.
pub fn conductance(reach: &Reach) -> f64 {
    reach.bed_k * reach.width_in_cell * reach.length_in_cell / reach.bed_thickness
}

/// For grid cells holding several reaches, moves all streambed conductance
/// onto the widest reach so water does not circulate between collocated
/// reaches.
///
/// The widest reach (the first one listed on ties) gets a length that carries
/// the cell's summed conductance; the others get a length of 1 and a bed K of
/// `bed_k_min`. The previous length is kept in `old_length_in_cell`. Returns
/// the number of shared cells.
pub fn consolidate_conductance(network: &mut NetworkModel, bed_k_min: f64) -> usize {
    let mut cells: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, reach) in network.reaches().iter().enumerate() {
        cells.entry(reach.node).or_default().push(i);
    }

    let reaches = network.reaches_mut();
    for reach in reaches.iter_mut() {
        reach.old_length_in_cell = Some(reach.length_in_cell);
    }

    let mut shared = 0;
    for members in cells.values().filter(|m| m.len() > 1) {
        shared += 1;
        let total: f64 = members.iter().map(|&i| conductance(&reaches[i])).sum();

        let mut dominant = members[0];
        for &i in &members[1..] {
            if reaches[i].width_in_cell > reaches[dominant].width_in_cell {
                dominant = i;
            }
        }

        for &i in members {
            let reach = &mut reaches[i];
            if i == dominant {
                reach.length_in_cell = total * reach.bed_thickness / (reach.bed_k * reach.width_in_cell);
            } else {
                reach.length_in_cell = 1.0;
                reach.bed_k = bed_k_min;
            }
        }
    }

    info!("Consolidated conductance in {} shared cells", shared);
    shared
}
