//! Common types and utilities shared across the nighttime-lights crates.

pub mod aoi;
pub mod bbox;
pub mod time;

pub use aoi::{AoiParseError, AoiQuery};
pub use bbox::{BboxParseError, BoundingBox};
pub use time::{TimeParseError, TimeWindow};
