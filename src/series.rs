use crate::metric::DataPoint;

// Data points of a single (name, key) pair, kept in the order they were
// ingested. `flushed` counts the leading points already written to a segment.
#[derive(Debug, Default)]
pub struct Series {
    data_points: Vec<DataPoint>,
    flushed: usize,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, data_point: DataPoint) {
        self.data_points.push(data_point);
    }

    // Points replayed from disk are already persisted.
    pub fn extend_flushed(&mut self, data_points: &[DataPoint]) {
        // Replay is only valid before anything unflushed arrives.
        debug_assert_eq!(self.flushed, self.data_points.len());
        self.data_points.extend_from_slice(data_points);
        self.flushed = self.data_points.len();
    }

    pub fn select(&self) -> Vec<DataPoint> {
        self.data_points.clone()
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn pending(&self) -> &[DataPoint] {
        &self.data_points[self.flushed..]
    }

    // Marks everything up to `upto` as persisted. Points appended after the
    // flush snapshot was taken stay pending.
    pub fn mark_flushed(&mut self, upto: usize) {
        self.flushed = usize::max(self.flushed, usize::min(upto, self.data_points.len()));
    }
}
