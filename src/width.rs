use crate::network::NetworkModel;
use crate::routing::RoutingMap;
use tracing::{debug, info};

/// Channel width (m) from the arbolate sum (km) upstream of a point,
/// `width = 0.1193 * (1000 * arbolate)^0.5032` (Feinstein and others,
/// Lake Michigan Basin model).
pub fn width_from_arbolate(arbolate_km: f64) -> f64 {
    0.1193 * (1000.0 * arbolate_km).powf(0.5032)
}

/// Arbolate sum entering each segment: the channel length of every segment
/// upstream of it plus what enters those segments from outside the model.
/// Headwaters start at their own `in_arbolate`.
pub fn starting_arbolate(
    network: &NetworkModel,
    routing: &RoutingMap,
    to_km: f64,
    segment: u32,
) -> f64 {
    let in_arbolate = |id: u32| {
        network
            .segment(id)
            .and_then(|s| s.in_arbolate)
            .filter(|v| !v.is_nan())
            .unwrap_or(0.0)
    };

    match routing.upstream_closure(segment) {
        Some(up) if !up.is_empty() => up
            .iter()
            .map(|&u| {
                let length: f64 = network.reaches_of(u).iter().map(|r| r.length_in_cell).sum();
                length * to_km + in_arbolate(u)
            })
            .sum(),
        _ => in_arbolate(segment),
    }
}

/// Writes `starting_arbolate` to every segment and an estimated
/// `width_in_cell` to every reach.
pub fn estimate_widths(network: &mut NetworkModel, routing: &RoutingMap, to_km: f64) {
    info!("Estimating stream widths...");
    let ids: Vec<u32> = network.segment_ids().collect();

    for id in ids {
        let start = starting_arbolate(network, routing, to_km, id);
        if let Some(seg) = network.segment_mut(id) {
            seg.starting_arbolate = Some(start);
        }

        let mut asum = start;
        for reach in network.reaches_of_mut(id) {
            asum += reach.length_in_cell * to_km;
            reach.width_in_cell = width_from_arbolate(asum);
        }
        debug!("Segment {}: starting arbolate {:.3} km, ending {:.3} km", id, start, asum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::tests::network;
    use approx::assert_relative_eq;

    #[test]
    fn width_correlation() {
        assert_relative_eq!(width_from_arbolate(1.0), 0.1193 * 1000f64.powf(0.5032));
        assert_eq!(width_from_arbolate(0.0), 0.0);
    }

    #[test]
    fn starting_arbolate_sums_all_upstream_lengths() {
        // 1 -> 3, 2 -> 3, 3 -> 4; every reach is 100 long
        let mut net = network(&[
            (1, 3, vec![10.0, 9.0]),
            (2, 3, vec![10.0]),
            (3, 4, vec![8.0]),
            (4, 0, vec![7.0]),
        ]);
        net.segment_mut(2).unwrap().in_arbolate = Some(5.0);
        net.segment_mut(1).unwrap().in_arbolate = Some(2.0);
        let routing = RoutingMap::new(&net);
        estimate_widths(&mut net, &routing, 0.001);

        assert_relative_eq!(net.segment(1).unwrap().starting_arbolate.unwrap(), 2.0);
        assert_relative_eq!(net.segment(3).unwrap().starting_arbolate.unwrap(), 0.3 + 5.0 + 2.0, epsilon = 1e-12);
        assert_relative_eq!(net.segment(4).unwrap().starting_arbolate.unwrap(), 0.4 + 5.0 + 2.0, epsilon = 1e-12);

        let r = &net.reaches_of(1)[1];
        assert_relative_eq!(r.width_in_cell, width_from_arbolate(2.2), epsilon = 1e-12);
    }
}
