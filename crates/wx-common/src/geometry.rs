//! Radar grid geometry.

/// Maximum rotation difference (degrees) for two geometries to be compatible.
pub const ROTATION_EPSILON_DEG: f64 = 1e-6;

/// Maximum TRP latitude/longitude difference (degrees) for compatibility.
pub const LATLON_EPSILON_DEG: f64 = 1e-8;

/// How the grid origin offset was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetMode {
    /// Offsets were present in the message header.
    FromMessage,
    /// Offsets derived by assuming the TRP sits at the grid center.
    CenteredOnTrp,
}

impl OffsetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetMode::FromMessage => "from_message",
            OffsetMode::CenteredOnTrp => "centered_on_trp",
        }
    }
}

/// Spatial description of a radar grid relative to its terminal reference point.
///
/// Rows and columns are row-major. Cell `(r, c)` has its center at
/// `x = x_offset_m + (c + 0.5) * dx_m`, `y = y_offset_m + (r + 0.5) * dy_m`
/// before rotation by `rotation_deg` about the TRP. Rotation is carried as
/// data for the consumer and never applied here.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub rows: usize,
    pub cols: usize,
    /// Cell width in meters
    pub dx_m: i32,
    /// Cell height in meters
    pub dy_m: i32,
    pub rotation_deg: f64,
    pub trp_lat_deg: f64,
    pub trp_lon_deg: f64,
    /// Offset of the grid's first cell edge from the TRP in meters
    pub x_offset_m: i32,
    pub y_offset_m: i32,
    pub offset_mode: OffsetMode,
}

impl GridGeometry {
    /// Total number of cells described by this geometry.
    pub fn cell_count(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Two geometries are compatible when frames on both can be animated
    /// together: identical shape and cell size, and the same rotation and
    /// TRP within a small tolerance. Offsets are not compared.
    pub fn is_compatible_with(&self, other: &GridGeometry) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.dx_m == other.dx_m
            && self.dy_m == other.dy_m
            && (self.rotation_deg - other.rotation_deg).abs() < ROTATION_EPSILON_DEG
            && (self.trp_lat_deg - other.trp_lat_deg).abs() < LATLON_EPSILON_DEG
            && (self.trp_lon_deg - other.trp_lon_deg).abs() < LATLON_EPSILON_DEG
    }

    /// Unrotated cell-center coordinates in meters relative to the TRP.
    pub fn cell_center(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let x = self.x_offset_m as f64 + (col as f64 + 0.5) * self.dx_m as f64;
        let y = self.y_offset_m as f64 + (row as f64 + 0.5) * self.dy_m as f64;
        Some((x, y))
    }
}
