//! # Metrical
//! > A simple metrics database.
//!
//! Data points are grouped into series identified by a `(name, key)` pair and
//! returned in the order they were ingested. Series live in memory and can be
//! persisted to disk as immutable segments that are replayed on startup.
//!
//! ```json
//! {
//!    "name": "cpu",
//!    "key": "backend-server1",
//!    "timestamp": 1234567890,
//!    "value": 0.532
//! }
//! ```

pub mod http;
pub mod storage;
pub use encode::EncodeStrategy;
pub use metric::{DataPoint, Row, SeriesId};

mod encode;
mod metric;
mod segment;
mod series;
