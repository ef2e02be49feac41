use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    // Milliseconds since the unix epoch.
    pub timestamp: u64,
    pub value: f64,
}

/// Identifies a series: every data point ingested under the same
/// `(name, key)` pair lands in the same series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesId {
    pub name: String,
    pub key: String,
}

impl SeriesId {
    pub fn new(name: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Row<'a> {
    pub name: &'a str,
    pub key: &'a str,
    pub data_point: DataPoint,
}
