use crate::error::{Result, SfrError};
use crate::network::{NetworkModel, Reach};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Model-top elevation by grid cell number (1-based, row-major).
pub trait GridElevations {
    fn top(&self, node: u32) -> Option<f64>;
}

impl GridElevations for HashMap<u32, f64> {
    fn top(&self, node: u32) -> Option<f64> {
        self.get(&node).copied()
    }
}

/// Cell number of a structured grid cell, `ncol * (row - 1) + column`.
pub fn cell_number(row: u32, column: u32, ncol: u32) -> u32 {
    ncol * (row - 1) + column
}

/// Fills in missing node numbers (0) from each reach's `row` and `column`.
pub fn assign_nodes(reaches: &mut [Reach], ncol: Option<u32>) -> Result<()> {
    let mut derived = 0;
    for reach in reaches.iter_mut().filter(|r| r.node == 0) {
        match (reach.row, reach.column, ncol) {
            (Some(row), Some(column), Some(ncol)) if row > 0 && column > 0 => {
                reach.node = cell_number(row, column, ncol);
                derived += 1;
            }
            _ => {
                return Err(SfrError::MissingNode {
                    segment: reach.segment,
                    reach: reach.reach,
                });
            }
        }
    }
    if derived > 0 {
        info!("Derived node numbers for {} reaches from row and column", derived);
    }
    Ok(())
}

/// One value per grid cell, ordered by cell number.
#[derive(Debug, Clone, PartialEq)]
pub struct CellArray {
    values: Vec<f64>,
}

impl CellArray {
    pub fn new(values: Vec<f64>) -> Self {
        CellArray { values }
    }

    /// Parses whitespace-separated values, as written by array exports of
    /// the model top and layer bottoms.
    pub fn parse(text: &str) -> Result<Self> {
        let values = text
            .split_whitespace()
            .enumerate()
            .map(|(i, v)| {
                v.parse::<f64>().map_err(|_| SfrError::Parse {
                    position: i,
                    value: v.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CellArray { values })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let grid = Self::parse(&text)?;
        info!("Loaded {} cell values from {:?}", grid.len(), path);
        Ok(grid)
    }

    /// Writes the values `per_line` to a line, in the layout [`CellArray::parse`] reads.
    pub fn write<W: Write>(&self, per_line: usize, mut out: W) -> Result<()> {
        for line in self.values.chunks(per_line.max(1)) {
            let text: Vec<String> = line.iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}", text.join(" "))?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_path(&self, per_line: usize, path: &Path) -> Result<()> {
        self.write(per_line, BufWriter::new(File::create(path)?))?;
        info!("Saved {} cell values to {:?}", self.len(), path);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn index(node: u32) -> Option<usize> {
        usize::try_from(node).ok()?.checked_sub(1)
    }
}

impl GridElevations for CellArray {
    fn top(&self, node: u32) -> Option<f64> {
        self.values.get(Self::index(node)?).copied()
    }
}

/// Sets every reach's `landsurface` to the model top of its cell.
pub fn assign_landsurface(network: &mut NetworkModel, grid: &impl GridElevations) -> Result<()> {
    for reach in network.reaches_mut() {
        let top = grid.top(reach.node).ok_or(SfrError::NodeOutOfGrid {
            segment: reach.segment,
            reach: reach.reach,
            node: reach.node,
        })?;
        reach.landsurface = Some(top);
    }
    Ok(())
}

/// Model top and the bottom of every layer, top layer first.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredGrid {
    pub top: CellArray,
    pub bottoms: Vec<CellArray>,
}

impl LayeredGrid {
    pub fn new(top: CellArray, bottoms: Vec<CellArray>) -> Result<Self> {
        for (i, bottom) in bottoms.iter().enumerate() {
            if bottom.len() != top.len() {
                return Err(SfrError::GridShape {
                    layer: i + 1,
                    expected: top.len(),
                    found: bottom.len(),
                });
            }
        }
        Ok(LayeredGrid { top, bottoms })
    }

    // Push each bottom down so every layer keeps `minimum_thickness`
    fn enforce_thickness(&mut self, minimum_thickness: f64) {
        let mut above = self.top.values.clone();
        for bottom in &mut self.bottoms {
            for (b, &a) in bottom.values.iter_mut().zip(&above) {
                if *b > a - minimum_thickness {
                    *b = a - minimum_thickness;
                }
            }
            above = bottom.values.clone();
        }
    }
}

/// A reach whose cell top moved to the streambed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopAdjustment {
    pub segment: u32,
    pub reach: u32,
    pub node: u32,
    pub top_streambed: f64,
    pub model_top: f64,
    pub highest_top: f64,
    /// `highest_top - model_top`
    pub top_height: f64,
}

/// Resets the model top of every cell holding a reach to the highest
/// streambed top in that cell, then lowers layer bottoms where a layer would
/// be thinner than `minimum_thickness`.
///
/// Returns the reaches whose cell top changed, largest change first.
pub fn adjust_model_top(
    network: &NetworkModel,
    grid: &mut LayeredGrid,
    minimum_thickness: f64,
) -> Result<Vec<TopAdjustment>> {
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

    let mut highest: BTreeMap<u32, f64> = BTreeMap::new();
    for reach in network.reaches() {
        let top = reach.top_streambed.unwrap_or(f64::NEG_INFINITY);
        highest
            .entry(reach.node)
            .and_modify(|h| *h = h.max(top))
            .or_insert(top);
    }

    let original = grid.top.clone();
    let mut adjustments = Vec::new();
    for reach in network.reaches() {
        let (Some(idx), Some(&highest_top)) =
            (CellArray::index(reach.node), highest.get(&reach.node))
        else {
            continue;
        };
        let model_top = original.top(reach.node).ok_or(SfrError::NodeOutOfGrid {
            segment: reach.segment,
            reach: reach.reach,
            node: reach.node,
        })?;
        if highest_top != model_top {
            adjustments.push(TopAdjustment {
                segment: reach.segment,
                reach: reach.reach,
                node: reach.node,
                top_streambed: reach.top_streambed.unwrap_or(highest_top),
                model_top,
                highest_top,
                top_height: highest_top - model_top,
            });
        }
        grid.top.values[idx] = highest_top;
    }

    grid.enforce_thickness(minimum_thickness);
    adjustments.sort_by(|a, b| b.top_height.abs().total_cmp(&a.top_height.abs()));

    debug!(
        "Layer bottoms checked against a minimum thickness of {}",
        minimum_thickness
    );
    info!(
        "Model top reset in {} cells; {} reaches moved",
        highest.len(),
        adjustments.len()
    );
    Ok(adjustments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Segment;
    use approx::assert_relative_eq;

    #[test]
    fn parse_and_lookup_is_one_based() {
        let grid = CellArray::parse("10.5 11\n 12.25\t13\n").unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.top(1), Some(10.5));
        assert_eq!(grid.top(4), Some(13.0));
        assert_eq!(grid.top(0), None);
        assert_eq!(grid.top(5), None);
    }

    #[test]
    fn bad_values_report_their_position() {
        match CellArray::parse("1.0 abc") {
            Err(SfrError::Parse { position, value }) => {
                assert_eq!(position, 1);
                assert_eq!(value, "abc");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn written_arrays_parse_back() {
        let grid = CellArray::new(vec![1.5, 2.0, -3.25, 4.0, 5.0]);
        let mut buf = Vec::new();
        grid.write(2, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "1.5 2\n-3.25 4\n5\n");
        assert_eq!(CellArray::parse(std::str::from_utf8(&buf).unwrap()).unwrap(), grid);
    }

    #[test]
    fn landsurface_comes_from_the_reach_cell() {
        let reaches = vec![Reach::new(1, 1, 2, 10.0), Reach::new(1, 2, 9, 10.0)];
        let mut net = NetworkModel::new(reaches.clone(), vec![Segment::new(1, 0)]).unwrap();
        let grid = CellArray::new(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            assign_landsurface(&mut net, &grid),
            Err(SfrError::NodeOutOfGrid { node: 9, .. })
        ));

        let mut net = NetworkModel::new(reaches, vec![Segment::new(1, 0)]).unwrap();
        let grid: HashMap<u32, f64> = [(2, 20.0), (9, 19.0)].into_iter().collect();
        assign_landsurface(&mut net, &grid).unwrap();
        assert_eq!(net.reaches()[1].landsurface, Some(19.0));
    }

    #[test]
    fn nodes_come_from_row_and_column() {
        assert_eq!(cell_number(1, 1, 10), 1);
        assert_eq!(cell_number(3, 4, 10), 24);

        let mut reaches = vec![Reach::new(1, 1, 0, 10.0), Reach::new(1, 2, 7, 10.0)];
        reaches[0].row = Some(2);
        reaches[0].column = Some(3);
        assign_nodes(&mut reaches, Some(5)).unwrap();
        assert_eq!(reaches[0].node, 8);
        assert_eq!(reaches[1].node, 7);
    }

    #[test]
    fn nodes_need_the_column_count() {
        let mut reaches = vec![Reach::new(4, 2, 0, 10.0)];
        reaches[0].row = Some(2);
        reaches[0].column = Some(3);
        assert!(matches!(
            assign_nodes(&mut reaches, None),
            Err(SfrError::MissingNode { segment: 4, reach: 2 })
        ));
    }

    #[test]
    fn bottoms_must_match_the_top() {
        let top = CellArray::new(vec![10.0; 4]);
        assert!(matches!(
            LayeredGrid::new(top, vec![CellArray::new(vec![5.0; 4]), CellArray::new(vec![0.0; 3])]),
            Err(SfrError::GridShape { layer: 2, expected: 4, found: 3 })
        ));
    }

    #[test]
    fn model_top_follows_the_highest_streambed_in_each_cell() {
        // reaches 1/1 and 2/1 share cell 2; reach 1/2 sits alone in cell 3
        let mut reaches = vec![
            Reach::new(1, 1, 2, 10.0),
            Reach::new(1, 2, 3, 10.0),
            Reach::new(2, 1, 2, 10.0),
        ];
        reaches[0].top_streambed = Some(98.0);
        reaches[1].top_streambed = Some(90.0);
        reaches[2].top_streambed = Some(99.5);
        let net = NetworkModel::new(reaches, vec![Segment::new(1, 0), Segment::new(2, 0)]).unwrap();

        let top = CellArray::new(vec![100.0, 100.0, 91.0, 100.0]);
        let layer1 = CellArray::new(vec![95.0, 99.0, 90.5, 95.0]);
        let layer2 = CellArray::new(vec![80.0, 98.8, 80.0, 80.0]);
        let mut grid = LayeredGrid::new(top, vec![layer1, layer2]).unwrap();

        let adjustments = adjust_model_top(&net, &mut grid, 1.0).unwrap();

        assert_eq!(grid.top.values(), &[100.0, 99.5, 90.0, 100.0]);
        assert_eq!(grid.bottoms[0].values(), &[95.0, 98.5, 89.0, 95.0]);
        assert_eq!(grid.bottoms[1].values(), &[80.0, 97.5, 80.0, 80.0]);

        let moved: Vec<(u32, u32)> = adjustments.iter().map(|a| (a.segment, a.reach)).collect();
        assert_eq!(moved, vec![(1, 2), (1, 1), (2, 1)]);
        assert_relative_eq!(adjustments[0].top_height, -1.0);
        assert_eq!(adjustments[1].highest_top, 99.5);
        assert_eq!(adjustments[1].top_streambed, 98.0);
        assert_relative_eq!(adjustments[2].top_height, -0.5);
    }

    #[test]
    fn adjustment_requires_streambed_tops() {
        let net = NetworkModel::new(vec![Reach::new(1, 1, 1, 10.0)], vec![Segment::new(1, 0)]).unwrap();
        let mut grid = LayeredGrid::new(CellArray::new(vec![10.0]), Vec::new()).unwrap();
        assert!(matches!(
            adjust_model_top(&net, &mut grid, 1.0),
            Err(SfrError::MissingColumns { .. })
        ));
    }
}
