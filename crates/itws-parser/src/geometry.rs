//! Grid geometry from header fields.

use wx_common::{GridGeometry, OffsetMode, ResolvedDims};

/// Geometry-related header fields collected during decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryHints {
    pub dx_m: i32,
    pub dy_m: i32,
    pub rotation_deg: f64,
    pub trp_lat_deg: Option<f64>,
    pub trp_lon_deg: Option<f64>,
    pub x_offset_m: Option<i32>,
    pub y_offset_m: Option<i32>,
}

/// Build a [`GridGeometry`] for resolved dimensions.
///
/// Offsets are taken from the message when both are present; otherwise the
/// TRP is assumed to be the grid center and the offsets are half the grid
/// extent, negated and rounded to whole meters. A missing TRP becomes 0/0.
pub fn resolve_geometry(dims: &ResolvedDims, hints: &GeometryHints) -> GridGeometry {
    let (x_offset_m, y_offset_m, offset_mode) = match (hints.x_offset_m, hints.y_offset_m) {
        (Some(x), Some(y)) => (x, y, OffsetMode::FromMessage),
        _ => (
            centered_offset(dims.cols, hints.dx_m),
            centered_offset(dims.rows, hints.dy_m),
            OffsetMode::CenteredOnTrp,
        ),
    };

    GridGeometry {
        rows: dims.rows,
        cols: dims.cols,
        dx_m: hints.dx_m,
        dy_m: hints.dy_m,
        rotation_deg: hints.rotation_deg,
        trp_lat_deg: hints.trp_lat_deg.unwrap_or(0.0),
        trp_lon_deg: hints.trp_lon_deg.unwrap_or(0.0),
        x_offset_m,
        y_offset_m,
        offset_mode,
    }
}

fn centered_offset(cells: usize, cell_size_m: i32) -> i32 {
    -((cells as f64 * cell_size_m as f64) / 2.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use wx_common::DimensionSource;

    fn dims(rows: usize, cols: usize) -> ResolvedDims {
        ResolvedDims {
            rows,
            cols,
            source: DimensionSource::Explicit,
        }
    }

    #[test]
    fn test_centered_on_trp() {
        let hints = GeometryHints {
            dx_m: 926,
            dy_m: 925,
            trp_lat_deg: Some(33.6367),
            trp_lon_deg: Some(-84.4281),
            ..Default::default()
        };
        let g = resolve_geometry(&dims(3, 5), &hints);
        assert_eq!(g.offset_mode, OffsetMode::CenteredOnTrp);
        assert_eq!(g.x_offset_m, -2315);
        // 3 * 925 / 2 = 1387.5 rounds away from zero
        assert_eq!(g.y_offset_m, -1388);
        assert_eq!(g.trp_lat_deg, 33.6367);
    }

    #[test]
    fn test_offsets_from_message() {
        let hints = GeometryHints {
            dx_m: 1000,
            dy_m: 1000,
            x_offset_m: Some(-100),
            y_offset_m: Some(250),
            ..Default::default()
        };
        let g = resolve_geometry(&dims(10, 10), &hints);
        assert_eq!(g.offset_mode, OffsetMode::FromMessage);
        assert_eq!((g.x_offset_m, g.y_offset_m), (-100, 250));
    }

    #[test]
    fn test_single_offset_is_ignored() {
        let hints = GeometryHints {
            dx_m: 1000,
            dy_m: 1000,
            x_offset_m: Some(-100),
            ..Default::default()
        };
        let g = resolve_geometry(&dims(4, 2), &hints);
        assert_eq!(g.offset_mode, OffsetMode::CenteredOnTrp);
        assert_eq!((g.x_offset_m, g.y_offset_m), (-1000, -2000));
        assert_eq!((g.trp_lat_deg, g.trp_lon_deg), (0.0, 0.0));
    }
}
