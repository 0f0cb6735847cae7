//! Common types shared across the ITWS radar bridge crates.

pub mod error;
pub mod frame;
pub mod geometry;
pub mod time;

pub use error::{WxError, WxResult};
pub use frame::{
    push_merged, CellStats, DimensionSource, Frame, FrameCells, MappedRun, ProductIdentity,
    RawDims, ResolvedDims, SpecialCodes, SpecialCounts, SpecialKind, MAX_GRID_CELLS, MAX_LEVEL,
};
pub use geometry::{GridGeometry, OffsetMode};
pub use time::{combine_seconds_millis, iso8601_from_millis, now_epoch_ms};
