use crate::DataPoint;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::{Result, Write},
    str::FromStr,
};

mod csv;
mod gorilla;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeStrategy {
    #[default]
    CSV,
    Gorilla,
}

impl FromStr for EncodeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(EncodeStrategy::CSV),
            "gorilla" => Ok(EncodeStrategy::Gorilla),
            other => Err(format!(
                "unknown encode strategy {:?}, expected csv or gorilla",
                other
            )),
        }
    }
}

impl fmt::Display for EncodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeStrategy::CSV => write!(f, "csv"),
            EncodeStrategy::Gorilla => write!(f, "gorilla"),
        }
    }
}

impl EncodeStrategy {
    // Gorilla stores timestamps as unsigned deltas of deltas, so it can only
    // take points that never go back in time. Anything else is written as CSV.
    pub fn for_points(self, data_points: &[DataPoint]) -> EncodeStrategy {
        match self {
            EncodeStrategy::Gorilla if !gorilla::supports(data_points) => EncodeStrategy::CSV,
            strategy => strategy,
        }
    }
}

pub fn encode_points<W: Write>(
    writable: &mut W,
    data_points: &[DataPoint],
    encode_strategy: EncodeStrategy,
) -> Result<()> {
    match encode_strategy {
        EncodeStrategy::CSV => csv::encode_points(writable, data_points),
        EncodeStrategy::Gorilla => gorilla::encode_points(writable, data_points),
    }
}

pub fn decode_points(
    bytes: &[u8],
    n: usize,
    encode_strategy: EncodeStrategy,
) -> Result<Vec<DataPoint>> {
    match encode_strategy {
        EncodeStrategy::CSV => csv::decode_points(bytes, n),
        EncodeStrategy::Gorilla => gorilla::decode_points(bytes, n),
    }
}
