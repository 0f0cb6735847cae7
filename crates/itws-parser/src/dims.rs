//! Grid dimension resolution.
//!
//! ITWS headers carry up to two dimension hints that do not always agree
//! with the pixel payload: a max-index pair (`fci_grid_max_x/y`, which some
//! producers send as a count and others as a 0-based maximum) and explicit
//! row/col counts. The decoded cell count is the ground truth they are
//! checked against.

use tracing::warn;
use wx_common::{DimensionSource, RawDims, ResolvedDims};

/// Resolve authoritative rows/cols.
///
/// Priority:
/// 1. max-index pair, trying both `v` and `v + 1` per axis, whose product
///    equals `filled` (or used as-is when `filled` is 0)
/// 2. explicit row/col counts whose product equals `filled`
/// 3. `(√filled, √filled)` when `filled` is a perfect square
/// 4. whichever explicit hint exists, tagged as a mismatch
///
/// Returns `None` when nothing usable exists.
pub fn resolve_dimensions(raw: &RawDims, filled: u64) -> Option<ResolvedDims> {
    let grid_max = positive(raw.grid_max_y).zip(positive(raw.grid_max_x));
    let explicit = positive(raw.nrows).zip(positive(raw.ncols));

    if let Some((max_y, max_x)) = grid_max {
        if filled == 0 {
            return Some(dims(max_y, max_x, DimensionSource::GridMax));
        }
        for rows in [max_y, max_y + 1] {
            for cols in [max_x, max_x + 1] {
                if product(rows, cols) == Some(filled) {
                    return Some(dims(rows, cols, DimensionSource::GridMax));
                }
            }
        }
    }

    if let Some((rows, cols)) = explicit {
        if filled == 0 || product(rows, cols) == Some(filled) {
            return Some(dims(rows, cols, DimensionSource::Explicit));
        }
    }

    if let Some(side) = perfect_square_root(filled) {
        return Some(dims(side, side, DimensionSource::Square));
    }

    let fallback = explicit
        .map(|(rows, cols)| dims(rows, cols, DimensionSource::ExplicitMismatch))
        .or_else(|| grid_max.map(|(rows, cols)| dims(rows, cols, DimensionSource::GridMaxMismatch)));

    if let Some(resolved) = &fallback {
        warn!(
            rows = resolved.rows,
            cols = resolved.cols,
            filled = filled,
            source = resolved.source.as_str(),
            "Grid dimensions do not match decoded cell count"
        );
    }

    fallback
}

fn positive(value: Option<i64>) -> Option<u64> {
    value.filter(|v| *v > 0).map(|v| v as u64)
}

fn product(rows: u64, cols: u64) -> Option<u64> {
    rows.checked_mul(cols)
}

fn dims(rows: u64, cols: u64, source: DimensionSource) -> ResolvedDims {
    ResolvedDims {
        rows: usize::try_from(rows).unwrap_or(usize::MAX),
        cols: usize::try_from(cols).unwrap_or(usize::MAX),
        source,
    }
}

fn perfect_square_root(n: u64) -> Option<u64> {
    if n == 0 {
        return None;
    }
    let guess = (n as f64).sqrt().round() as u64;
    // Float sqrt may be off by one for large n
    [guess.saturating_sub(1), guess, guess + 1]
        .into_iter()
        .find(|s| s.checked_mul(*s) == Some(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(nrows: Option<i64>, ncols: Option<i64>, max_x: Option<i64>, max_y: Option<i64>) -> RawDims {
        RawDims {
            nrows,
            ncols,
            grid_max_x: max_x,
            grid_max_y: max_y,
        }
    }

    #[test]
    fn test_grid_max_as_zero_based_index() {
        let resolved = resolve_dimensions(&raw(None, None, Some(127), Some(255)), 128 * 256).unwrap();
        assert_eq!((resolved.rows, resolved.cols), (256, 128));
        assert_eq!(resolved.source, DimensionSource::GridMax);
    }

    #[test]
    fn test_grid_max_as_count() {
        let resolved = resolve_dimensions(&raw(None, None, Some(128), Some(256)), 128 * 256).unwrap();
        assert_eq!((resolved.rows, resolved.cols), (256, 128));
        assert_eq!(resolved.source, DimensionSource::GridMax);
    }

    #[test]
    fn test_grid_max_used_when_filled_unknown() {
        let resolved = resolve_dimensions(&raw(None, None, Some(10), Some(20)), 0).unwrap();
        assert_eq!((resolved.rows, resolved.cols), (20, 10));
    }

    #[test]
    fn test_explicit_counts_when_grid_max_disagrees() {
        let resolved = resolve_dimensions(&raw(Some(2), Some(3), Some(40), Some(40)), 6).unwrap();
        assert_eq!((resolved.rows, resolved.cols), (2, 3));
        assert_eq!(resolved.source, DimensionSource::Explicit);
    }

    #[test]
    fn test_perfect_square_fallback() {
        let resolved = resolve_dimensions(&RawDims::default(), 400).unwrap();
        assert_eq!((resolved.rows, resolved.cols), (20, 20));
        assert_eq!(resolved.source, DimensionSource::Square);

        let big = 46_341u64 * 46_341;
        let resolved = resolve_dimensions(&RawDims::default(), big).unwrap();
        assert_eq!(resolved.rows, 46_341);
    }

    #[test]
    fn test_mismatch_prefers_explicit_counts() {
        let resolved = resolve_dimensions(&raw(Some(2), Some(3), Some(5), Some(5)), 7).unwrap();
        assert_eq!((resolved.rows, resolved.cols), (2, 3));
        assert_eq!(resolved.source, DimensionSource::ExplicitMismatch);
        assert!(resolved.source.is_mismatch());
    }

    #[test]
    fn test_mismatch_falls_back_to_grid_max() {
        let resolved = resolve_dimensions(&raw(None, None, Some(5), Some(4)), 7).unwrap();
        assert_eq!((resolved.rows, resolved.cols), (4, 5));
        assert_eq!(resolved.source, DimensionSource::GridMaxMismatch);
    }

    #[test]
    fn test_unresolvable() {
        assert!(resolve_dimensions(&RawDims::default(), 7).is_none());
        assert!(resolve_dimensions(&RawDims::default(), 0).is_none());
        // Non-positive hints are treated as absent
        assert!(resolve_dimensions(&raw(Some(0), Some(3), Some(-1), Some(4)), 7).is_none());
    }
}
