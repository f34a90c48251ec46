use crate::config::is_outlet;
use crate::error::{Result, SfrError};
use crate::io::csv::{ExtraColumns, TableRow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use tracing::{debug, info};

// One row of the reach table (Mat1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reach {
    pub segment: u32,
    pub reach: u32,
    /// Grid cell number, 1-based, row-major. 0 until derived when the table
    /// only has `row` and `column`.
    #[serde(default)]
    pub node: u32,
    #[serde(default)]
    pub row: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    pub length_in_cell: f64,
    #[serde(default)]
    pub landsurface: Option<f64>,
    #[serde(default)]
    pub top_streambed: Option<f64>,
    #[serde(default)]
    pub bed_slope: Option<f64>,
    #[serde(rename = "bed_K", default)]
    pub bed_k: f64,
    #[serde(default)]
    pub bed_thickness: f64,
    #[serde(default)]
    pub width_in_cell: f64,
    #[serde(default)]
    pub outlet: Option<u32>,
    #[serde(default)]
    pub old_length_in_cell: Option<f64>,
    #[serde(skip)]
    pub extra: ExtraColumns,
}

impl Reach {
    pub fn new(segment: u32, reach: u32, node: u32, length_in_cell: f64) -> Self {
        Reach {
            segment,
            reach,
            node,
            row: None,
            column: None,
            length_in_cell,
            landsurface: None,
            top_streambed: None,
            bed_slope: None,
            bed_k: 0.0,
            bed_thickness: 0.0,
            width_in_cell: 0.0,
            outlet: None,
            old_length_in_cell: None,
            extra: ExtraColumns::new(),
        }
    }

    pub fn with_landsurface(mut self, elevation: f64) -> Self {
        self.landsurface = Some(elevation);
        self
    }
}

// One row of the segment table (Mat2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment: u32,
    pub outseg: i64,
    #[serde(rename = "Max", default)]
    pub max: Option<f64>,
    #[serde(rename = "Min", default)]
    pub min: Option<f64>,
    /// Arbolate sum entering from outside the model, km.
    #[serde(default)]
    pub in_arbolate: Option<f64>,
    #[serde(default)]
    pub starting_arbolate: Option<f64>,
    #[serde(default)]
    pub outlet: Option<u32>,
    #[serde(skip)]
    pub upsegs: Vec<u32>,
    #[serde(skip)]
    pub extra: ExtraColumns,
}

impl Segment {
    pub fn new(segment: u32, outseg: i64) -> Self {
        Segment {
            segment,
            outseg,
            max: None,
            min: None,
            in_arbolate: None,
            starting_arbolate: None,
            outlet: None,
            upsegs: Vec::new(),
            extra: ExtraColumns::new(),
        }
    }

    /// The segment this one drains into, or `None` at the network outlet.
    pub fn downstream(&self) -> Option<u32> {
        if is_outlet(self.outseg) {
            None
        } else {
            Some(self.outseg as u32)
        }
    }
}

impl TableRow for Reach {
    fn extra(&self) -> &ExtraColumns {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut ExtraColumns {
        &mut self.extra
    }
}

impl TableRow for Segment {
    fn extra(&self) -> &ExtraColumns {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut ExtraColumns {
        &mut self.extra
    }
}

/// The reach and segment tables of one stream network.
///
/// Reaches are kept sorted by (segment, reach) and segments by id, so the
/// reaches of a segment are one contiguous slice in downstream order.
#[derive(Debug, Clone)]
pub struct NetworkModel {
    reaches: Vec<Reach>,
    segments: Vec<Segment>,
    index: HashMap<u32, usize>,
    spans: Vec<Range<usize>>,
}

impl NetworkModel {
    pub fn new(mut reaches: Vec<Reach>, mut segments: Vec<Segment>) -> Result<Self> {
        reaches.sort_by_key(|r| (r.segment, r.reach));
        segments.sort_by_key(|s| s.segment);

        let mut index = HashMap::with_capacity(segments.len());
        for (i, seg) in segments.iter().enumerate() {
            if index.insert(seg.segment, i).is_some() {
                return Err(SfrError::DuplicateSegment(seg.segment));
            }
        }

        let circular: Vec<u32> = segments
            .iter()
            .filter(|s| s.outseg == i64::from(s.segment))
            .map(|s| s.segment)
            .collect();
        if !circular.is_empty() {
            return Err(SfrError::CircularRouting { segments: circular });
        }

        for seg in &segments {
            if let Some(down) = seg.downstream() {
                if !index.contains_key(&down) {
                    return Err(SfrError::UnknownOutseg {
                        segment: seg.segment,
                        outseg: seg.outseg,
                    });
                }
            }
        }

        let unknown: BTreeSet<u32> = reaches
            .iter()
            .filter(|r| !index.contains_key(&r.segment))
            .map(|r| r.segment)
            .collect();
        if !unknown.is_empty() {
            return Err(SfrError::UnknownSegment {
                segments: unknown.into_iter().collect(),
            });
        }

        // Reaches are sorted, so each segment's reaches are one run
        let mut spans = vec![0..0; segments.len()];
        let mut start = 0;
        while start < reaches.len() {
            let seg_id = reaches[start].segment;
            let mut end = start + 1;
            while end < reaches.len() && reaches[end].segment == seg_id {
                if reaches[end].reach == reaches[end - 1].reach {
                    return Err(SfrError::DuplicateReach {
                        segment: seg_id,
                        reach: reaches[end].reach,
                    });
                }
                end += 1;
            }
            spans[index[&seg_id]] = start..end;
            start = end;
        }

        let empty: Vec<u32> = segments
            .iter()
            .zip(&spans)
            .filter(|(_, span)| span.is_empty())
            .map(|(s, _)| s.segment)
            .collect();
        if !empty.is_empty() {
            return Err(SfrError::EmptySegment { segments: empty });
        }

        let mut network = NetworkModel {
            reaches,
            segments,
            index,
            spans,
        };
        network.build_upstream_connections();

        info!(
            "Network built with {} segments and {} reaches",
            network.segments.len(),
            network.reaches.len()
        );
        debug!(
            "Found {} outlet segments",
            network
                .segments
                .iter()
                .filter(|s| s.downstream().is_none())
                .count()
        );

        Ok(network)
    }

    fn build_upstream_connections(&mut self) {
        let mut upstream_map: HashMap<u32, Vec<u32>> = HashMap::new();

        for seg in &self.segments {
            if let Some(down) = seg.downstream() {
                upstream_map.entry(down).or_default().push(seg.segment);
            }
        }

        for seg in &mut self.segments {
            seg.upsegs = upstream_map.remove(&seg.segment).unwrap_or_default();
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment ids in ascending order.
    pub fn segment_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments.iter().map(|s| s.segment)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    pub fn contains(&self, id: u32) -> bool {
        self.index.contains_key(&id)
    }

    pub fn segment(&self, id: u32) -> Option<&Segment> {
        self.index.get(&id).map(|&i| &self.segments[i])
    }

    pub fn segment_mut(&mut self, id: u32) -> Option<&mut Segment> {
        self.index.get(&id).map(|&i| &mut self.segments[i])
    }

    pub fn upsegs(&self, id: u32) -> &[u32] {
        self.segment(id).map(|s| s.upsegs.as_slice()).unwrap_or(&[])
    }

    pub fn downstream(&self, id: u32) -> Option<u32> {
        self.segment(id).and_then(Segment::downstream)
    }

    pub fn reaches(&self) -> &[Reach] {
        &self.reaches
    }

    pub fn reaches_mut(&mut self) -> &mut [Reach] {
        &mut self.reaches
    }

    /// Reaches of one segment, in downstream order.
    pub fn reaches_of(&self, id: u32) -> &[Reach] {
        match self.index.get(&id) {
            Some(&i) => &self.reaches[self.spans[i].clone()],
            None => &[],
        }
    }

    pub fn reaches_of_mut(&mut self, id: u32) -> &mut [Reach] {
        match self.index.get(&id) {
            Some(&i) => &mut self.reaches[self.spans[i].clone()],
            None => &mut [],
        }
    }

    pub fn into_tables(self) -> (Vec<Reach>, Vec<Segment>) {
        (self.reaches, self.segments)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a network from `(segment, outseg, landsurface per reach)`, with
    /// every reach 100 units long and one grid cell per reach.
    pub(crate) fn network(rows: &[(u32, i64, Vec<f64>)]) -> NetworkModel {
        let mut reaches = Vec::new();
        let mut segments = Vec::new();
        let mut node = 1;
        for (seg, outseg, elevs) in rows {
            let (seg, outseg) = (*seg, *outseg);
            segments.push(Segment::new(seg, outseg));
            for (i, &z) in elevs.iter().enumerate() {
                reaches.push(Reach::new(seg, i as u32 + 1, node, 100.0).with_landsurface(z));
                node += 1;
            }
        }
        NetworkModel::new(reaches, segments).unwrap()
    }

    #[test]
    fn sorts_tables_and_builds_upsegs() {
        let net = network(&[(3, 0, vec![80.0]), (1, 3, vec![100.0, 95.0]), (2, 3, vec![90.0])]);
        assert_eq!(net.segment_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        let mut up = net.upsegs(3).to_vec();
        up.sort();
        assert_eq!(up, vec![1, 2]);
        assert!(net.upsegs(1).is_empty());
        assert_eq!(net.reaches_of(1).len(), 2);
        assert_eq!(net.reaches_of(1)[1].reach, 2);
    }

    #[test]
    fn self_routing_segments_are_rejected_by_id() {
        let reaches = vec![Reach::new(1, 1, 1, 10.0), Reach::new(2, 1, 2, 10.0)];
        let segments = vec![Segment::new(1, 1), Segment::new(2, 2)];
        match NetworkModel::new(reaches, segments) {
            Err(SfrError::CircularRouting { segments }) => assert_eq!(segments, vec![1, 2]),
            other => panic!("expected circular routing error, got {:?}", other),
        }
    }

    #[test]
    fn sentinel_outseg_is_an_outlet() {
        let net = network(&[(1, 999_999, vec![10.0])]);
        assert_eq!(net.downstream(1), None);
    }

    #[test]
    fn unknown_outseg_is_rejected() {
        let reaches = vec![Reach::new(1, 1, 1, 10.0)];
        let segments = vec![Segment::new(1, 5)];
        assert!(matches!(
            NetworkModel::new(reaches, segments),
            Err(SfrError::UnknownOutseg { segment: 1, outseg: 5 })
        ));
    }

    #[test]
    fn segments_without_reaches_are_rejected() {
        let reaches = vec![Reach::new(1, 1, 1, 10.0)];
        let segments = vec![Segment::new(1, 2), Segment::new(2, 0)];
        assert!(matches!(
            NetworkModel::new(reaches, segments),
            Err(SfrError::EmptySegment { .. })
        ));
    }

    #[test]
    fn reaches_of_unlisted_segment_are_rejected() {
        let reaches = vec![Reach::new(1, 1, 1, 10.0), Reach::new(9, 1, 2, 10.0)];
        let segments = vec![Segment::new(1, 0)];
        match NetworkModel::new(reaches, segments) {
            Err(SfrError::UnknownSegment { segments }) => assert_eq!(segments, vec![9]),
            other => panic!("expected unknown segment error, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_reach_numbers_are_rejected() {
        let reaches = vec![Reach::new(1, 1, 1, 10.0), Reach::new(1, 1, 2, 10.0)];
        let segments = vec![Segment::new(1, 0)];
        assert!(matches!(
            NetworkModel::new(reaches, segments),
            Err(SfrError::DuplicateReach { segment: 1, reach: 1 })
        ));
    }
}
