//! Streaming run-length transcoder for ITWS pixel payloads.
//!
//! The payload is a whitespace-separated list of `rawValue,runCount` pairs.
//! Text may arrive in arbitrary chunks, so tokenizing is a byte-level state
//! machine that carries partial tokens across [`RunLengthTranscoder::feed`]
//! calls.
//!
//! Each completed pair is mapped to a severity level (see
//! [`SpecialCodes::map_level`]), counted into [`CellStats`], and merged
//! into the run list. In [`TranscodeMode::Expanded`] every cell is also
//! materialized into a byte buffer.

use wx_common::{CellStats, FrameCells, MappedRun, SpecialCodes, MAX_GRID_CELLS};

/// Initial size of the expanded cell buffer.
const INITIAL_CAPACITY: usize = 1 << 16;

/// Upper bound on materialized cells. Counts beyond this are still tallied
/// in the statistics but not expanded.
pub const MAX_EXPANDED_CELLS: usize = MAX_GRID_CELLS;

/// Output representation produced by the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscodeMode {
    /// One byte per cell.
    #[default]
    Expanded,
    /// Merged run list only.
    Compact,
}

#[derive(Debug, Clone, Copy)]
enum TokenState {
    Idle,
    Value {
        negative: bool,
        value: i64,
        digits: bool,
    },
    Count {
        value: i64,
        count: u64,
        digits: bool,
    },
}

/// Run-length token accumulator.
#[derive(Debug)]
pub struct RunLengthTranscoder {
    mode: TranscodeMode,
    codes: SpecialCodes,
    state: TokenState,
    pending: Option<MappedRun>,
    runs: Vec<MappedRun>,
    levels: Vec<u8>,
    stats: CellStats,
}

impl RunLengthTranscoder {
    pub fn new(mode: TranscodeMode, codes: SpecialCodes) -> Self {
        let levels = match mode {
            TranscodeMode::Expanded => Vec::with_capacity(INITIAL_CAPACITY),
            TranscodeMode::Compact => Vec::new(),
        };
        Self {
            mode,
            codes,
            state: TokenState::Idle,
            pending: None,
            runs: Vec::new(),
            levels,
            stats: CellStats::default(),
        }
    }

    pub fn mode(&self) -> TranscodeMode {
        self.mode
    }

    pub fn special_codes(&self) -> SpecialCodes {
        self.codes
    }

    /// Replace the special codes used for pairs completed from now on.
    pub fn set_special_codes(&mut self, codes: SpecialCodes) {
        self.codes = codes;
    }

    /// Feed a chunk of payload text.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) {
        for &byte in chunk.as_ref() {
            self.step(byte);
        }
    }

    fn step(&mut self, byte: u8) {
        let state = self.state;
        self.state = match state {
            TokenState::Idle => match byte {
                b'-' => TokenState::Value {
                    negative: true,
                    value: 0,
                    digits: false,
                },
                b'0'..=b'9' => TokenState::Value {
                    negative: false,
                    value: (byte - b'0') as i64,
                    digits: true,
                },
                _ => TokenState::Idle,
            },
            TokenState::Value {
                negative,
                value,
                digits,
            } => match byte {
                b'0'..=b'9' => TokenState::Value {
                    negative,
                    value: value.saturating_mul(10).saturating_add((byte - b'0') as i64),
                    digits: true,
                },
                b',' if digits => TokenState::Count {
                    value: if negative { -value } else { value },
                    count: 0,
                    digits: false,
                },
                _ => TokenState::Idle,
            },
            TokenState::Count {
                value,
                count,
                digits,
            } => match byte {
                b'0'..=b'9' => TokenState::Count {
                    value,
                    count: count.saturating_mul(10).saturating_add((byte - b'0') as u64),
                    digits: true,
                },
                _ if is_space(byte) && digits => {
                    self.emit(value, count);
                    TokenState::Idle
                }
                _ if is_space(byte) => state,
                _ => TokenState::Idle,
            },
        };
    }

    /// Complete a trailing pair and flush the pending run.
    pub fn finish(&mut self) {
        if let TokenState::Count {
            value,
            count,
            digits: true,
        } = self.state
        {
            self.emit(value, count);
        }
        self.state = TokenState::Idle;
        if let Some(run) = self.pending.take() {
            self.runs.push(run);
        }
    }

    fn emit(&mut self, raw: i64, count: u64) {
        if count == 0 {
            return;
        }
        let level = self.codes.map_level(raw);
        self.stats.record(level, count, self.codes.classify(raw));

        match self.pending.as_mut() {
            Some(run) if run.level == level => run.count = run.count.saturating_add(count),
            _ => {
                if let Some(run) = self.pending.replace(MappedRun::new(level, count)) {
                    self.runs.push(run);
                }
            }
        }

        if self.mode == TranscodeMode::Expanded {
            let room = MAX_EXPANDED_CELLS.saturating_sub(self.levels.len());
            let take = usize::try_from(count).unwrap_or(usize::MAX).min(room);
            if take > 0 {
                self.ensure_capacity(self.levels.len() + take);
                let end = self.levels.len() + take;
                self.levels.resize(end, level);
            }
        }
    }

    /// Grow the cell buffer by doubling until it can hold `needed` bytes.
    fn ensure_capacity(&mut self, needed: usize) {
        let mut capacity = self.levels.capacity().max(INITIAL_CAPACITY);
        if needed <= self.levels.capacity() {
            return;
        }
        while capacity < needed {
            capacity = capacity.saturating_mul(2);
        }
        self.levels.reserve_exact(capacity - self.levels.len());
    }

    /// Number of cells decoded so far.
    pub fn filled(&self) -> u64 {
        self.stats.total_cells
    }

    pub fn stats(&self) -> &CellStats {
        &self.stats
    }

    /// Completed runs. The last run is only included after [`finish`](Self::finish).
    pub fn runs(&self) -> &[MappedRun] {
        &self.runs
    }

    /// Consume the transcoder into frame cells.
    ///
    /// Expanded output is trimmed or zero-padded to exactly `total_cells`.
    pub fn into_cells(mut self, total_cells: usize) -> FrameCells {
        self.finish();
        match self.mode {
            TranscodeMode::Expanded => {
                let mut levels = self.levels;
                levels.resize(total_cells, 0);
                levels.shrink_to_fit();
                FrameCells::Expanded(levels)
            }
            TranscodeMode::Compact => FrameCells::Runs(self.runs),
        }
    }
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
