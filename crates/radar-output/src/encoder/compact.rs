//! Compact run-length history document.
//!
//! Frames are written in snapshot order (newest first for this shape) with
//! their full metadata; cells stay as the merged `level,count` run text.
//! Absent header values are written as `null`.

use std::fmt::Write as _;

use storage::HistorySnapshot;
use wx_common::Frame;

use crate::json::JsonWriter;

pub const SOURCE_NAME: &str = "itws";

pub fn encode_compact(snapshot: &HistorySnapshot<'_>, now_ms: i64) -> Vec<u8> {
    let mut w = JsonWriter::with_capacity(1 << 14);
    w.begin_object();
    w.key("updatedAtMs").i64(now_ms);
    w.key("source").string(SOURCE_NAME);

    w.key("levels").begin_array();
    if let Some(newest) = snapshot.newest() {
        for level in newest.stats.active_levels() {
            w.u64(level as u64);
        }
    }
    w.end_array();

    w.key("frames").begin_array();
    for frame in snapshot.frames() {
        write_frame(&mut w, frame);
    }
    w.end_array();

    w.end_object();
    w.into_bytes()
}

fn write_frame(w: &mut JsonWriter, frame: &Frame) {
    let geom = &frame.geometry;
    let stats = &frame.stats;

    w.begin_object();
    w.key("receiverMs").i64(frame.received_at_ms);
    w.key("receivedAt").string(&frame.received_iso());
    w.key("itwsGenTimeMs").i64(frame.generated_at_ms);
    w.key("itwsExpTimeMs").opt_i64(frame.expires_at_ms);
    w.key("productId").opt_i64(frame.identity.product_id);
    w.key("productName").string(&frame.identity.product_name);
    w.key("site").string(&frame.identity.site);
    w.key("airport").string(&frame.identity.airport);

    w.key("grid").begin_object();
    w.key("rows").u64(geom.rows as u64);
    w.key("cols").u64(geom.cols as u64);
    w.key("dimsSource").string(frame.dims_source.as_str());
    w.key("dimsMismatch").bool(frame.has_dimension_mismatch());
    w.key("rawDims")
        .begin_object()
        .key("nrows")
        .opt_i64(frame.raw_dims.nrows)
        .key("ncols")
        .opt_i64(frame.raw_dims.ncols)
        .key("gridMaxY")
        .opt_i64(frame.raw_dims.grid_max_y)
        .key("gridMaxX")
        .opt_i64(frame.raw_dims.grid_max_x)
        .end_object();
    w.key("layout").string("row-major");
    w.key("trp")
        .begin_object()
        .key("latDeg")
        .f64(geom.trp_lat_deg)
        .key("lonDeg")
        .f64(geom.trp_lon_deg)
        .end_object();
    w.key("geom")
        .begin_object()
        .key("xOffsetM")
        .i64(geom.x_offset_m as i64)
        .key("yOffsetM")
        .i64(geom.y_offset_m as i64)
        .key("dxM")
        .i64(geom.dx_m as i64)
        .key("dyM")
        .i64(geom.dy_m as i64)
        .key("rotationDeg")
        .f64(geom.rotation_deg)
        .key("offsetMode")
        .string(geom.offset_mode.as_str())
        .end_object();
    w.key("cellsEncoding").string("rle");
    w.key("cellsRle").string_with(|out| {
        for (i, run) in frame.cells.runs().iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{},{}", run.level, run.count);
        }
    });
    w.key("cellsTotal").u64(stats.total_cells);
    w.key("maxLevel").u64(stats.max_level as u64);
    w.key("nonZeroCells").u64(stats.non_zero_cells);
    w.key("itwsMaxPrecipLevel").opt_i64(frame.header_max_level);
    w.key("specialCounts")
        .begin_object()
        .key("noCoverage")
        .u64(stats.special.no_coverage)
        .key("bad")
        .u64(stats.special.bad)
        .key("attenuated")
        .u64(stats.special.attenuated)
        .key("ap")
        .u64(stats.special.anomalous_propagation)
        .end_object();
    w.end_object();

    w.end_object();
}
