//! Expanded-bytes history document.
//!
//! ```text
//! {"schema":"itws-radar-history/v1","layout":"row-major","levelsEncoding":"u8",
//!  "dataEncoding":"zlib+base64","levels":[...],
//!  "grid":{"rows","cols","dxM","dyM","rotationDeg","trp":{...},"origin":{...}},
//!  "frames":[{"t","tEpochMs","maxLevel","rawBytes","zlibBytes","data"}, ...]}
//! ```
//!
//! Each frame's `data` is its row-major level bytes (one byte per cell,
//! exactly rows * cols long), zlib-compressed at the fastest level and then
//! base64-encoded. Geometry is the newest frame's; frames follow snapshot
//! order.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use storage::HistorySnapshot;
use wx_common::{WxError, WxResult, MAX_GRID_CELLS};

use crate::json::JsonWriter;

pub const EXPANDED_SCHEMA: &str = "itws-radar-history/v1";

/// Compress bytes with a zlib wrapper at the fastest level.
pub fn zlib_compress(data: &[u8]) -> WxResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 8 + 64), Compression::fast());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(compressed)
}

pub fn encode_expanded(snapshot: &HistorySnapshot<'_>) -> WxResult<Vec<u8>> {
    let newest = snapshot
        .newest()
        .ok_or_else(|| WxError::EncodeError("history is empty".to_string()))?;
    let geom = &newest.geometry;

    let mut w = JsonWriter::with_capacity(1 << 16);
    w.begin_object();
    w.key("schema").string(EXPANDED_SCHEMA);
    w.key("layout").string("row-major");
    w.key("levelsEncoding").string("u8");
    w.key("dataEncoding").string("zlib+base64");

    w.key("levels").begin_array();
    for level in newest.stats.active_levels() {
        w.u64(level as u64);
    }
    w.end_array();

    w.key("grid").begin_object();
    w.key("rows").u64(geom.rows as u64);
    w.key("cols").u64(geom.cols as u64);
    w.key("dxM").i64(geom.dx_m as i64);
    w.key("dyM").i64(geom.dy_m as i64);
    w.key("rotationDeg").f64(geom.rotation_deg);
    w.key("trp")
        .begin_object()
        .key("latDeg")
        .f64(geom.trp_lat_deg)
        .key("lonDeg")
        .f64(geom.trp_lon_deg)
        .end_object();
    w.key("origin")
        .begin_object()
        .key("xOffsetM")
        .i64(geom.x_offset_m as i64)
        .key("yOffsetM")
        .i64(geom.y_offset_m as i64)
        .key("mode")
        .string(geom.offset_mode.as_str())
        .end_object();
    w.end_object();

    w.key("frames").begin_array();
    for frame in snapshot.frames() {
        let total = frame.geometry.cell_count();
        if total > MAX_GRID_CELLS {
            return Err(WxError::EncodeError(format!(
                "grid of {} cells exceeds limit of {}",
                total, MAX_GRID_CELLS
            )));
        }
        let levels = frame.cells.levels(total);
        let compressed = zlib_compress(&levels)?;

        w.begin_object();
        w.key("t").string(&frame.generated_iso());
        w.key("tEpochMs").i64(frame.generated_at_ms);
        w.key("maxLevel").u64(frame.stats.max_level as u64);
        w.key("rawBytes").u64(levels.len() as u64);
        w.key("zlibBytes").u64(compressed.len() as u64);
        w.key("data")
            .string_with(|out| STANDARD.encode_string(&compressed, out));
        w.end_object();
    }
    w.end_array();

    w.end_object();
    Ok(w.into_bytes())
}
