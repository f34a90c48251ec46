use crate::network::NetworkModel;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Downstream paths and upstream sets for every segment of a network.
///
/// Built once from the `outseg` links. Rebuild it if the routing changes.
#[derive(Debug, Clone)]
pub struct RoutingMap {
    downstream: BTreeMap<u32, Vec<u32>>,
    upstream: BTreeMap<u32, BTreeSet<u32>>,
}

impl RoutingMap {
    pub fn new(network: &NetworkModel) -> Self {
        let downstream = map_outsegs(network);
        let upstream = map_upsegs(network);
        debug!(
            "Routing mapped; longest downstream path has {} segments",
            downstream.values().map(Vec::len).max().unwrap_or(0)
        );
        RoutingMap {
            downstream,
            upstream,
        }
    }

    /// Every segment reached by following `outseg` from `segment`, nearest first.
    pub fn downstream_closure(&self, segment: u32) -> &[u32] {
        self.downstream
            .get(&segment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The segment `level + 1` steps downstream of `segment`, or `None` once
    /// the path has reached the outlet.
    pub fn downstream_at(&self, segment: u32, level: usize) -> Option<u32> {
        self.downstream_closure(segment).get(level).copied()
    }

    /// Every segment that eventually drains into `segment`.
    pub fn upstream_closure(&self, segment: u32) -> Option<&BTreeSet<u32>> {
        self.upstream.get(&segment)
    }

    /// Length of the longest downstream path.
    pub fn max_depth(&self) -> usize {
        self.downstream.values().map(Vec::len).max().unwrap_or(0)
    }

    /// The outlet segment `segment` ultimately drains through.
    pub fn outlet(&self, segment: u32) -> u32 {
        self.downstream_closure(segment)
            .last()
            .copied()
            .unwrap_or(segment)
    }

    /// Maximal flow paths through the network, each starting at a segment
    /// no other path passes through before it.
    ///
    /// A path from every segment to its outlet is kept only when it is not
    /// contained in another path; single-segment paths are dropped.
    pub fn profile_paths(&self) -> Vec<Vec<u32>> {
        let paths: Vec<Vec<u32>> = self
            .downstream
            .iter()
            .map(|(&seg, down)| std::iter::once(seg).chain(down.iter().copied()).collect())
            .collect();
        let sets: Vec<BTreeSet<u32>> = paths
            .iter()
            .map(|p| p.iter().copied().collect())
            .collect();

        paths
            .iter()
            .zip(&sets)
            .filter(|(path, set)| {
                path.len() > 1 && sets.iter().filter(|other| set.is_subset(other)).count() == 1
            })
            .map(|(path, _)| path.clone())
            .collect()
    }
}

// Follow outseg one column at a time until every path has reached an outlet
fn map_outsegs(network: &NetworkModel) -> BTreeMap<u32, Vec<u32>> {
    let nsegs = network.len();
    let mut paths: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    let mut frontier: Vec<(u32, Option<u32>)> = Vec::with_capacity(nsegs);

    for id in network.segment_ids() {
        let down = network.downstream(id);
        paths.insert(id, down.into_iter().collect());
        frontier.push((id, down));
    }

    let mut knt = 1;
    while frontier.iter().any(|(_, f)| f.is_some()) {
        if knt >= nsegs {
            let open: Vec<u32> = frontier
                .iter()
                .filter(|(_, f)| f.is_some())
                .map(|(s, _)| *s)
                .collect();
            warn!(
                "Circular routing encountered; downstream paths of segments {:?} did not reach an outlet after {} rounds",
                open, knt
            );
            break;
        }
        for (seg, f) in frontier.iter_mut() {
            if let Some(current) = *f {
                let next = network.downstream(current);
                if let Some(n) = next {
                    if let Some(path) = paths.get_mut(seg) {
                        path.push(n);
                    }
                }
                *f = next;
            }
        }
        knt += 1;
    }

    paths
}

// Fold in upstream-of-upstream one level at a time until nothing new turns up
fn map_upsegs(network: &NetworkModel) -> BTreeMap<u32, BTreeSet<u32>> {
    let mut upstream = BTreeMap::new();

    for target in network.segment_ids() {
        let mut found = BTreeSet::new();
        let mut level: Vec<u32> = network.upsegs(target).to_vec();
        while !level.is_empty() {
            let mut added = Vec::new();
            for us in level {
                if us != target && found.insert(us) {
                    added.extend_from_slice(network.upsegs(us));
                }
            }
            level = added;
        }
        upstream.insert(target, found);
    }

    upstream
}

/// Record the outlet each segment drains through on the segment and reach tables.
pub fn assign_outlets(network: &mut NetworkModel, routing: &RoutingMap) {
    let ids: Vec<u32> = network.segment_ids().collect();
    for id in ids {
        let outlet = routing.outlet(id);
        if let Some(seg) = network.segment_mut(id) {
            seg.outlet = Some(outlet);
        }
        for reach in network.reaches_of_mut(id) {
            reach.outlet = Some(outlet);
        }
    }

    let outlets: BTreeSet<u32> = network.segments().iter().filter_map(|s| s.outlet).collect();
    info!("Assigned {} outlets to {} segments", outlets.len(), network.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::tests::network;

    // 1 -> 3, 2 -> 3, 3 -> 4, 4 -> outlet, 5 -> outlet
    fn tree() -> NetworkModel {
        network(&[
            (1, 3, vec![10.0]),
            (2, 3, vec![10.0]),
            (3, 4, vec![10.0]),
            (4, 0, vec![10.0]),
            (5, 999_999, vec![10.0]),
        ])
    }

    #[test]
    fn downstream_closure_follows_outsegs_in_order() {
        let routing = RoutingMap::new(&tree());
        assert_eq!(routing.downstream_closure(1), &[3, 4]);
        assert_eq!(routing.downstream_closure(3), &[4]);
        assert!(routing.downstream_closure(4).is_empty());
        assert!(routing.downstream_closure(5).is_empty());
        assert_eq!(routing.downstream_at(2, 1), Some(4));
        assert_eq!(routing.downstream_at(2, 2), None);
        assert_eq!(routing.max_depth(), 2);
    }

    #[test]
    fn upstream_closure_is_transitive() {
        let routing = RoutingMap::new(&tree());
        let up: Vec<u32> = routing.upstream_closure(4).unwrap().iter().copied().collect();
        assert_eq!(up, vec![1, 2, 3]);
        assert!(routing.upstream_closure(1).unwrap().is_empty());
        assert!(routing.upstream_closure(5).unwrap().is_empty());
    }

    #[test]
    fn outlets_and_profile_paths() {
        let routing = RoutingMap::new(&tree());
        assert_eq!(routing.outlet(1), 4);
        assert_eq!(routing.outlet(4), 4);
        assert_eq!(routing.outlet(5), 5);
        assert_eq!(routing.profile_paths(), vec![vec![1, 3, 4], vec![2, 3, 4]]);
    }

    #[test]
    fn longer_cycles_stop_at_the_round_guard() {
        // 1 -> 2 -> 3 -> 1 passes the self-loop check but never reaches an outlet
        let net = network(&[(1, 2, vec![10.0]), (2, 3, vec![10.0]), (3, 1, vec![10.0])]);
        let routing = RoutingMap::new(&net);
        assert!(routing.downstream_closure(1).len() <= net.len());
        let up = routing.upstream_closure(1).unwrap();
        assert_eq!(up.len(), 2);
    }

    #[test]
    fn assign_outlets_marks_reaches() {
        let mut net = tree();
        let routing = RoutingMap::new(&net);
        assign_outlets(&mut net, &routing);
        assert_eq!(net.segment(2).unwrap().outlet, Some(4));
        assert!(net.reaches_of(1).iter().all(|r| r.outlet == Some(4)));
        assert_eq!(net.reaches_of(5)[0].outlet, Some(5));
    }
}
