use std::collections::BTreeMap;

/// Ceiling and floor elevation of one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryElevation {
    pub max: f64,
    pub min: f64,
}

impl BoundaryElevation {
    pub fn new(max: f64, min: f64) -> Self {
        BoundaryElevation { max, min }
    }

    /// The floor sits above the ceiling.
    pub fn is_backwards(&self) -> bool {
        self.max < self.min
    }

    pub fn lowest(&self) -> f64 {
        self.max.min(self.min)
    }

    pub fn with_max(self, max: f64) -> Self {
        BoundaryElevation { max, ..self }
    }

    pub fn with_min(self, min: f64) -> Self {
        BoundaryElevation { min, ..self }
    }
}

/// Boundary elevations of every segment at one step of the repair loop.
///
/// Each step reads one state and produces the next, so a replacement never
/// sees values written earlier in the same step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryState {
    bounds: BTreeMap<u32, BoundaryElevation>,
}

impl BoundaryState {
    pub fn new() -> Self {
        BoundaryState {
            bounds: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, segment: u32, bound: BoundaryElevation) {
        self.bounds.insert(segment, bound);
    }

    pub fn get(&self, segment: u32) -> Option<BoundaryElevation> {
        self.bounds.get(&segment).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, BoundaryElevation)> + '_ {
        self.bounds.iter().map(|(&s, &b)| (s, b))
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Segments whose floor sits above their ceiling, ascending.
    pub fn backwards(&self) -> Vec<u32> {
        self.iter()
            .filter(|(_, b)| b.is_backwards())
            .map(|(s, _)| s)
            .collect()
    }
}

impl FromIterator<(u32, BoundaryElevation)> for BoundaryState {
    fn from_iter<I: IntoIterator<Item = (u32, BoundaryElevation)>>(iter: I) -> Self {
        BoundaryState {
            bounds: iter.into_iter().collect(),
        }
    }
}
