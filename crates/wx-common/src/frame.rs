//! Decoded radar frame and its cell representations.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::geometry::GridGeometry;
use crate::time::iso8601_from_millis;

/// Highest precipitation severity level.
pub const MAX_LEVEL: u8 = 6;

/// Largest grid (rows * cols) a frame may hold. Larger grids are rejected
/// before any per-cell buffer is allocated.
pub const MAX_GRID_CELLS: usize = 64 * 1024 * 1024;

/// A contiguous span of cells sharing one mapped level, row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRun {
    pub level: u8,
    pub count: u64,
}

impl MappedRun {
    pub fn new(level: u8, count: u64) -> Self {
        Self { level, count }
    }
}

/// Append a run, merging it into the last run when the levels match.
///
/// Zero-length runs are dropped.
pub fn push_merged(runs: &mut Vec<MappedRun>, level: u8, count: u64) {
    if count == 0 {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.level == level => last.count = last.count.saturating_add(count),
        _ => runs.push(MappedRun::new(level, count)),
    }
}

/// Special raw codes that never represent precipitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKind {
    NoCoverage,
    Bad,
    Attenuated,
    AnomalousPropagation,
}

/// Raw values reserved for special conditions. All map to level 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialCodes {
    pub bad: i64,
    pub no_coverage: i64,
    pub attenuated: i64,
    pub anomalous_propagation: i64,
}

impl Default for SpecialCodes {
    fn default() -> Self {
        Self {
            bad: 9,
            no_coverage: 15,
            attenuated: 7,
            anomalous_propagation: 8,
        }
    }
}

impl SpecialCodes {
    /// Identify which special condition a raw value encodes, if any.
    pub fn classify(&self, raw: i64) -> Option<SpecialKind> {
        if raw == self.bad {
            Some(SpecialKind::Bad)
        } else if raw == self.no_coverage {
            Some(SpecialKind::NoCoverage)
        } else if raw == self.attenuated {
            Some(SpecialKind::Attenuated)
        } else if raw == self.anomalous_propagation {
            Some(SpecialKind::AnomalousPropagation)
        } else {
            None
        }
    }

    /// Map a raw value to a severity level in `0..=6`.
    ///
    /// Special codes and out-of-range values collapse to 0.
    pub fn map_level(&self, raw: i64) -> u8 {
        if self.classify(raw).is_some() || !(0..=MAX_LEVEL as i64).contains(&raw) {
            0
        } else {
            raw as u8
        }
    }
}

/// Cell counts per special code, computed on raw values before mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialCounts {
    pub no_coverage: u64,
    pub bad: u64,
    pub attenuated: u64,
    pub anomalous_propagation: u64,
}

impl SpecialCounts {
    pub fn add(&mut self, kind: SpecialKind, count: u64) {
        let slot = match kind {
            SpecialKind::NoCoverage => &mut self.no_coverage,
            SpecialKind::Bad => &mut self.bad,
            SpecialKind::Attenuated => &mut self.attenuated,
            SpecialKind::AnomalousPropagation => &mut self.anomalous_propagation,
        };
        *slot = slot.saturating_add(count);
    }
}

/// Aggregate statistics accumulated while transcoding a grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellStats {
    pub total_cells: u64,
    pub max_level: u8,
    pub non_zero_cells: u64,
    /// Bit `i` is set iff level `i` (1..=6) occurred.
    pub active_mask: u8,
    pub special: SpecialCounts,
}

impl CellStats {
    /// Record one completed run.
    pub fn record(&mut self, level: u8, count: u64, special: Option<SpecialKind>) {
        self.total_cells = self.total_cells.saturating_add(count);
        if level > self.max_level {
            self.max_level = level;
        }
        if level > 0 {
            self.non_zero_cells = self.non_zero_cells.saturating_add(count);
            self.active_mask |= 1 << level;
        }
        if let Some(kind) = special {
            self.special.add(kind, count);
        }
    }

    /// Sorted list of active levels in `1..=6`.
    pub fn active_levels(&self) -> Vec<u8> {
        (1..=MAX_LEVEL)
            .filter(|level| self.active_mask & (1 << level) != 0)
            .collect()
    }
}

/// Which header hint the grid dimensions were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSource {
    /// Max-index pair (as count or count-1) matched the decoded cell count.
    GridMax,
    /// Explicit row/col counts matched the decoded cell count.
    Explicit,
    /// Decoded cell count is a perfect square.
    Square,
    /// No exact match; fell back to the explicit row/col counts.
    ExplicitMismatch,
    /// No exact match; fell back to the raw max-index pair.
    GridMaxMismatch,
}

impl DimensionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionSource::GridMax => "gridMax",
            DimensionSource::Explicit => "explicit",
            DimensionSource::Square => "square",
            DimensionSource::ExplicitMismatch => "explicitMismatch",
            DimensionSource::GridMaxMismatch => "gridMaxMismatch",
        }
    }

    /// Whether rows * cols may disagree with the decoded cell count.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self,
            DimensionSource::ExplicitMismatch | DimensionSource::GridMaxMismatch
        )
    }
}

/// Dimension hints exactly as they appeared in the message header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawDims {
    pub nrows: Option<i64>,
    pub ncols: Option<i64>,
    pub grid_max_x: Option<i64>,
    pub grid_max_y: Option<i64>,
}

/// Authoritative grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDims {
    pub rows: usize,
    pub cols: usize,
    pub source: DimensionSource,
}

impl ResolvedDims {
    pub fn cell_count(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }
}

/// Cell storage for a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameCells {
    /// Merged run list, kept textual on output.
    Runs(Vec<MappedRun>),
    /// One byte per cell, exactly rows * cols long.
    Expanded(Vec<u8>),
}

impl FrameCells {
    /// Merged run list; computed on demand for expanded grids.
    pub fn runs(&self) -> Cow<'_, [MappedRun]> {
        match self {
            FrameCells::Runs(runs) => Cow::Borrowed(runs.as_slice()),
            FrameCells::Expanded(levels) => {
                let mut runs = Vec::new();
                for &level in levels {
                    push_merged(&mut runs, level, 1);
                }
                Cow::Owned(runs)
            }
        }
    }

    /// Per-cell levels, trimmed or zero-padded to `total` cells.
    pub fn levels(&self, total: usize) -> Cow<'_, [u8]> {
        match self {
            FrameCells::Expanded(levels) if levels.len() == total => {
                Cow::Borrowed(levels.as_slice())
            }
            FrameCells::Expanded(levels) => {
                let mut out = levels.clone();
                out.resize(total, 0);
                Cow::Owned(out)
            }
            FrameCells::Runs(runs) => {
                let mut out = Vec::with_capacity(total);
                for run in runs {
                    let remaining = total - out.len();
                    if remaining == 0 {
                        break;
                    }
                    let take = usize::try_from(run.count).unwrap_or(usize::MAX).min(remaining);
                    out.resize(out.len() + take, run.level);
                }
                out.resize(total, 0);
                Cow::Owned(out)
            }
        }
    }

    /// Run list as `"level,count level,count ..."`.
    pub fn rle_text(&self) -> String {
        let runs = self.runs();
        let mut out = String::with_capacity(runs.len() * 6);
        for (i, run) in runs.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{},{}", run.level, run.count);
        }
        out
    }

    /// Number of cells held.
    pub fn cell_count(&self) -> u64 {
        match self {
            FrameCells::Runs(runs) => runs.iter().map(|r| r.count).sum(),
            FrameCells::Expanded(levels) => levels.len() as u64,
        }
    }
}

/// Identity fields from the product header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductIdentity {
    pub product_id: Option<i64>,
    pub product_name: String,
    pub site: String,
    pub airport: String,
}

/// One decoded product instance.
///
/// Created once per accepted message and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Wall-clock time the message was received (epoch ms)
    pub received_at_ms: i64,
    /// Product generation time (epoch ms)
    pub generated_at_ms: i64,
    /// Product expiration time (epoch ms), when the header carries one
    pub expires_at_ms: Option<i64>,
    pub identity: ProductIdentity,
    pub geometry: GridGeometry,
    pub dims_source: DimensionSource,
    pub raw_dims: RawDims,
    pub cells: FrameCells,
    pub stats: CellStats,
    /// Max precipitation level claimed by the header
    pub header_max_level: Option<i64>,
    /// Compression scheme claimed by the header
    pub compression: Option<String>,
    /// Frame spacing in seconds
    pub spacing_secs: Option<i64>,
}

impl Frame {
    pub fn generated_iso(&self) -> String {
        iso8601_from_millis(self.generated_at_ms)
    }

    pub fn received_iso(&self) -> String {
        iso8601_from_millis(self.received_at_ms)
    }

    /// Whether the published rows * cols may not match the decoded cells.
    pub fn has_dimension_mismatch(&self) -> bool {
        self.dims_source.is_mismatch()
    }
}
