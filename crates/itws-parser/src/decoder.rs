//! Frame assembly from XML events.
//!
//! [`FrameDecoder`] consumes start/text/end events for one product message.
//! Header fields are buffered (bounded) and assigned on element end; text of
//! the pixel payload goes straight into a [`RunLengthTranscoder`]. The end of
//! the first image's payload completes the decode, after which the rest of
//! the document is not needed.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use wx_common::{
    combine_seconds_millis, CellStats, DimensionSource, Frame, FrameCells, GridGeometry,
    ProductIdentity, RawDims, SpecialCodes, MAX_GRID_CELLS,
};

use crate::dims::resolve_dimensions;
use crate::error::{DecodeError, DecodeResult};
use crate::geometry::{resolve_geometry, GeometryHints};
use crate::rle::{RunLengthTranscoder, TranscodeMode};
use crate::tags::{parse_f64, parse_int, HeaderTag, IMAGE_ELEMENT, PAYLOAD_ELEMENT};

/// Default bound on buffered text for a single header element.
pub const DEFAULT_TEXT_LIMIT: usize = 4096;

/// Decoder settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    /// Cell representation of produced frames
    pub mode: TranscodeMode,
    /// Special codes in effect until the header overrides them
    pub special_codes: SpecialCodes,
    /// Only accept products with this identifier (when the header has one)
    pub target_product_id: Option<i64>,
    /// Maximum buffered text per header element
    pub text_limit: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            mode: TranscodeMode::Expanded,
            special_codes: SpecialCodes::default(),
            target_product_id: None,
            text_limit: DEFAULT_TEXT_LIMIT,
        }
    }
}

/// Whether more events are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Complete,
}

#[derive(Debug, Default)]
struct HeaderFields {
    identity: ProductIdentity,
    generation_secs: Option<i64>,
    generation_millis: Option<i64>,
    expiration_secs: Option<i64>,
    expiration_millis: Option<i64>,
    spacing_secs: Option<i64>,
    hints: GeometryHints,
    raw_dims: RawDims,
    header_max_level: Option<i64>,
    compression: Option<String>,
}

#[derive(Debug)]
struct DecodedGrid {
    geometry: GridGeometry,
    dims_source: DimensionSource,
    cells: FrameCells,
    stats: CellStats,
}

/// Event-driven decoder for a single product message.
#[derive(Debug)]
pub struct FrameDecoder {
    config: DecoderConfig,
    received_at_ms: i64,
    codes: SpecialCodes,
    header: HeaderFields,
    seen_image: bool,
    in_image: bool,
    in_payload: bool,
    found_payload: bool,
    transcoder: Option<RunLengthTranscoder>,
    current: Option<HeaderTag>,
    text: String,
    grid: Option<DecodedGrid>,
}

impl FrameDecoder {
    pub fn new(config: DecoderConfig, received_at_ms: i64) -> Self {
        let codes = config.special_codes;
        Self {
            config,
            received_at_ms,
            codes,
            header: HeaderFields::default(),
            seen_image: false,
            in_image: false,
            in_payload: false,
            found_payload: false,
            transcoder: None,
            current: None,
            text: String::new(),
            grid: None,
        }
    }

    pub fn start_element(&mut self, name: &[u8]) {
        self.current = None;

        if name == IMAGE_ELEMENT && !self.seen_image {
            self.seen_image = true;
            self.in_image = true;
            return;
        }

        if self.in_image && !self.found_payload && name == PAYLOAD_ELEMENT {
            self.in_payload = true;
            self.found_payload = true;
            self.transcoder = Some(RunLengthTranscoder::new(self.config.mode, self.codes));
            return;
        }

        self.current = HeaderTag::from_name(name);
        self.text.clear();
    }

    pub fn text(&mut self, chunk: &str) {
        if self.in_payload {
            if let Some(transcoder) = self.transcoder.as_mut() {
                transcoder.feed(chunk);
            }
        } else if self.current.is_some() && self.text.len() < self.config.text_limit {
            self.text.push_str(chunk);
        }
    }

    pub fn end_element(&mut self, name: &[u8]) -> Progress {
        if self.in_payload && name == PAYLOAD_ELEMENT {
            self.in_payload = false;
            self.complete_grid();
            return Progress::Complete;
        }

        if let Some(tag) = self.current.take() {
            let text = std::mem::take(&mut self.text);
            let value = text.trim();
            if !value.is_empty() && (self.in_image || !tag.is_image_scoped()) {
                self.apply(tag, value);
            }
            self.text = text;
            self.text.clear();
        }

        if self.in_image && name == IMAGE_ELEMENT {
            self.in_image = false;
        }

        Progress::Continue
    }

    fn apply(&mut self, tag: HeaderTag, value: &str) {
        let header = &mut self.header;
        match tag {
            HeaderTag::ProductId => header.identity.product_id = parse_int(value),
            HeaderTag::ProductName => header.identity.product_name = value.to_string(),
            HeaderTag::Site => header.identity.site = value.to_string(),
            HeaderTag::Airport => header.identity.airport = value.to_string(),
            HeaderTag::GenerationSeconds => header.generation_secs = parse_int(value),
            HeaderTag::GenerationMillis => header.generation_millis = parse_int(value),
            HeaderTag::ExpirationSeconds => header.expiration_secs = parse_int(value),
            HeaderTag::ExpirationMillis => header.expiration_millis = parse_int(value),
            HeaderTag::Spacing => header.spacing_secs = parse_int(value),
            HeaderTag::GridDx => header.hints.dx_m = parse_i32(value).unwrap_or(0),
            HeaderTag::GridDy => header.hints.dy_m = parse_i32(value).unwrap_or(0),
            HeaderTag::Rotation => header.hints.rotation_deg = parse_f64(value).unwrap_or(0.0),
            HeaderTag::TrpLatitude => header.hints.trp_lat_deg = parse_f64(value),
            HeaderTag::TrpLongitude => header.hints.trp_lon_deg = parse_f64(value),
            HeaderTag::XOffset => header.hints.x_offset_m = parse_i32(value),
            HeaderTag::YOffset => header.hints.y_offset_m = parse_i32(value),
            HeaderTag::RowCount => header.raw_dims.nrows = parse_int(value),
            HeaderTag::ColCount => header.raw_dims.ncols = parse_int(value),
            HeaderTag::GridMaxX => header.raw_dims.grid_max_x = parse_int(value),
            HeaderTag::GridMaxY => header.raw_dims.grid_max_y = parse_int(value),
            HeaderTag::MaxPrecipLevel => header.header_max_level = parse_int(value),
            HeaderTag::CompressionScheme => header.compression = Some(value.to_string()),
            HeaderTag::BadCode => self.update_codes(value, |c, v| c.bad = v),
            HeaderTag::NoCoverageCode => self.update_codes(value, |c, v| c.no_coverage = v),
            HeaderTag::AttenuatedCode => self.update_codes(value, |c, v| c.attenuated = v),
            HeaderTag::ApCode => self.update_codes(value, |c, v| c.anomalous_propagation = v),
        }
    }

    fn update_codes(&mut self, value: &str, set: impl FnOnce(&mut SpecialCodes, i64)) {
        let Some(code) = parse_int(value) else {
            return;
        };
        set(&mut self.codes, code);
        if let Some(transcoder) = self.transcoder.as_mut() {
            transcoder.set_special_codes(self.codes);
        }
    }

    fn complete_grid(&mut self) {
        let Some(mut transcoder) = self.transcoder.take() else {
            return;
        };
        transcoder.finish();

        let filled = transcoder.filled();
        if filled == 0 {
            debug!("Pixel payload decoded to zero cells");
            return;
        }

        let Some(dims) = resolve_dimensions(&self.header.raw_dims, filled) else {
            debug!(filled = filled, "Could not resolve grid dimensions");
            return;
        };
        let total = dims.cell_count();
        if total == 0 {
            return;
        }
        if total > MAX_GRID_CELLS {
            warn!(
                rows = dims.rows,
                cols = dims.cols,
                filled = filled,
                limit = MAX_GRID_CELLS,
                "Grid too large, dropping frame"
            );
            return;
        }

        let geometry = resolve_geometry(&dims, &self.header.hints);
        let stats = *transcoder.stats();
        let cells = transcoder.into_cells(total);

        debug!(
            rows = dims.rows,
            cols = dims.cols,
            dims_source = dims.source.as_str(),
            filled = filled,
            max_level = stats.max_level,
            "Decoded pixel payload"
        );

        self.grid = Some(DecodedGrid {
            geometry,
            dims_source: dims.source,
            cells,
            stats,
        });
    }

    /// Whether the first image's pixel payload element was seen.
    pub fn found_payload(&self) -> bool {
        self.found_payload
    }

    /// Assemble the frame, or `None` for malformed or irrelevant products.
    pub fn finish(self) -> Option<Frame> {
        let grid = self.grid?;
        let header = self.header;

        if let (Some(target), Some(actual)) =
            (self.config.target_product_id, header.identity.product_id)
        {
            if target != actual {
                debug!(target = target, actual = actual, "Skipping non-target product");
                return None;
            }
        }

        let generated_at_ms =
            combine_seconds_millis(header.generation_secs, header.generation_millis)
                .unwrap_or(self.received_at_ms);
        let expires_at_ms =
            combine_seconds_millis(header.expiration_secs, header.expiration_millis);

        if grid.dims_source.is_mismatch() {
            warn!(
                product = %header.identity.product_name,
                rows = grid.geometry.rows,
                cols = grid.geometry.cols,
                cells = grid.stats.total_cells,
                "Publishing frame with mismatched dimensions"
            );
        }

        Some(Frame {
            received_at_ms: self.received_at_ms,
            generated_at_ms,
            expires_at_ms,
            identity: header.identity,
            geometry: grid.geometry,
            dims_source: grid.dims_source,
            raw_dims: header.raw_dims,
            cells: grid.cells,
            stats: grid.stats,
            header_max_level: header.header_max_level,
            compression: header.compression,
            spacing_secs: header.spacing_secs,
        })
    }
}

fn parse_i32(text: &str) -> Option<i32> {
    parse_int(text).and_then(|v| i32::try_from(v).ok())
}

/// Decode one XML product message.
///
/// Returns `Ok(None)` when the message holds no usable grid (no payload,
/// zero cells, unresolvable dimensions, other product). XML syntax errors
/// before the payload completes are returned as errors.
pub fn decode_frame(
    payload: &[u8],
    received_at_ms: i64,
    config: &DecoderConfig,
) -> DecodeResult<Option<Frame>> {
    let mut reader = Reader::from_reader(payload);
    let mut decoder = FrameDecoder::new(config.clone(), received_at_ms);
    let mut buf = Vec::new();

    loop {
        let progress = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                decoder.start_element(e.local_name().as_ref());
                Progress::Continue
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name();
                decoder.start_element(name.as_ref());
                decoder.end_element(name.as_ref())
            }
            Ok(Event::End(e)) => decoder.end_element(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|source| DecodeError::Xml {
                    position: reader.buffer_position(),
                    source,
                })?;
                decoder.text(&text);
                Progress::Continue
            }
            Ok(Event::CData(c)) => {
                let raw = c.into_inner();
                decoder.text(&String::from_utf8_lossy(&raw));
                Progress::Continue
            }
            Ok(Event::Eof) => break,
            Err(source) => {
                return Err(DecodeError::Xml {
                    position: reader.buffer_position(),
                    source,
                })
            }
            _ => Progress::Continue,
        };

        if progress == Progress::Complete {
            break;
        }
        buf.clear();
    }

    Ok(decoder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wx_common::{MappedRun, OffsetMode};

    fn element(decoder: &mut FrameDecoder, name: &str, text: &str) -> Progress {
        decoder.start_element(name.as_bytes());
        decoder.text(text);
        decoder.end_element(name.as_bytes())
    }

    fn compact() -> DecoderConfig {
        DecoderConfig {
            mode: TranscodeMode::Compact,
            ..Default::default()
        }
    }

    #[test]
    fn test_event_driven_decode() {
        let mut d = FrameDecoder::new(compact(), 42);
        element(&mut d, "product_msg_id", "9901");
        element(&mut d, "grid_dx", "926");
        element(&mut d, "grid_dy", "926");
        d.start_element(b"fci_image");
        element(&mut d, "fci_grid_nrows", "2");
        element(&mut d, "fci_grid_ncols", "3");
        d.start_element(b"fci_grid_compressed");
        d.text("0,3 2");
        d.text(",2 0,1");
        assert_eq!(d.end_element(b"fci_grid_compressed"), Progress::Complete);

        let frame = d.finish().unwrap();
        assert_eq!(frame.identity.product_id, Some(9901));
        assert_eq!((frame.geometry.rows, frame.geometry.cols), (2, 3));
        assert_eq!(frame.dims_source, DimensionSource::Explicit);
        assert_eq!(frame.geometry.offset_mode, OffsetMode::CenteredOnTrp);
        assert_eq!(
            frame.cells.runs().as_ref(),
            &[
                MappedRun::new(0, 3),
                MappedRun::new(2, 2),
                MappedRun::new(0, 1)
            ]
        );
        // No generation time in header: falls back to receipt time
        assert_eq!(frame.generated_at_ms, 42);
    }

    #[test]
    fn test_image_scoped_tags_ignored_outside_image() {
        let mut d = FrameDecoder::new(compact(), 0);
        element(&mut d, "fci_grid_max_x", "99");
        d.start_element(b"fci_image");
        d.start_element(b"fci_grid_compressed");
        d.text("1,4");
        d.end_element(b"fci_grid_compressed");

        let frame = d.finish().unwrap();
        assert_eq!(frame.raw_dims.grid_max_x, None);
        assert_eq!(frame.dims_source, DimensionSource::Square);
    }

    #[test]
    fn test_payload_outside_image_is_not_decoded() {
        let mut d = FrameDecoder::new(compact(), 0);
        d.start_element(b"fci_grid_compressed");
        d.text("1,4");
        assert_eq!(d.end_element(b"fci_grid_compressed"), Progress::Continue);
        assert!(!d.found_payload());
        assert!(d.finish().is_none());
    }

    #[test]
    fn test_special_code_override_before_payload() {
        let mut d = FrameDecoder::new(compact(), 0);
        element(&mut d, "fci_grid_bad_value", "3");
        d.start_element(b"fci_image");
        d.start_element(b"fci_grid_compressed");
        d.text("3,2 1,2");
        d.end_element(b"fci_grid_compressed");

        let frame = d.finish().unwrap();
        assert_eq!(frame.stats.special.bad, 2);
        assert_eq!(frame.stats.max_level, 1);
        assert_eq!(frame.cells.rle_text(), "0,2 1,2");
    }

    #[test]
    fn test_product_filter() {
        let config = DecoderConfig {
            target_product_id: Some(9901),
            ..compact()
        };
        let mut d = FrameDecoder::new(config, 0);
        element(&mut d, "product_msg_id", "9905");
        d.start_element(b"fci_image");
        d.start_element(b"fci_grid_compressed");
        d.text("1,4");
        d.end_element(b"fci_grid_compressed");
        assert!(d.finish().is_none());
    }

    #[test]
    fn test_header_text_is_bounded() {
        let config = DecoderConfig {
            text_limit: 8,
            ..compact()
        };
        let mut d = FrameDecoder::new(config, 0);
        d.start_element(b"product_msg_name");
        d.text("ITWS_FCST");
        d.text("_IMAGE_EXTRA");
        d.end_element(b"product_msg_name");
        d.start_element(b"fci_image");
        d.start_element(b"fci_grid_compressed");
        d.text("0,1");
        d.end_element(b"fci_grid_compressed");

        let frame = d.finish().unwrap();
        assert_eq!(frame.identity.product_name, "ITWS_FCST");
    }

    #[test]
    fn test_decode_frame_from_xml() {
        let xml = r#"<?xml version="1.0"?>
<itws_msg>
  <product_header>
    <product_msg_id>9901</product_msg_id>
    <product_header_generation_time_seconds>1700000000</product_header_generation_time_seconds>
    <product_header_generation_time_milliseconds>250</product_header_generation_time_milliseconds>
  </product_header>
  <grid_dx>1000</grid_dx><grid_dy>1000</grid_dy>
  <fci_image>
    <fci_grid_max_x>2</fci_grid_max_x>
    <fci_grid_max_y>1</fci_grid_max_y>
    <fci_grid_compressed><![CDATA[0,3 ]]>2,2 0,1</fci_grid_compressed>
  </fci_image>
  <not even xml
</itws_msg>"#;
        let frame = decode_frame(xml.as_bytes(), 0, &DecoderConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(frame.generated_at_ms, 1_700_000_000_250);
        assert_eq!((frame.geometry.rows, frame.geometry.cols), (2, 3));
        assert_eq!(frame.cells, FrameCells::Expanded(vec![0, 0, 0, 2, 2, 0]));
    }

    #[test]
    fn test_decode_frame_syntax_error_before_payload() {
        let xml = "<itws_msg><grid_dx>1</grid_dy><fci_image></fci_image></itws_msg>";
        let result = decode_frame(xml.as_bytes(), 0, &DecoderConfig::default());
        assert!(matches!(result, Err(DecodeError::Xml { .. })));
    }

    #[test]
    fn test_decode_frame_without_payload() {
        let xml = "<itws_msg><fci_image><fci_grid_max_x>1</fci_grid_max_x></fci_image></itws_msg>";
        let frame = decode_frame(xml.as_bytes(), 0, &DecoderConfig::default()).unwrap();
        assert!(frame.is_none());
    }

    #[test]
    fn test_empty_payload_element() {
        let xml = "<itws_msg><fci_image><fci_grid_compressed/></fci_image></itws_msg>";
        let frame = decode_frame(xml.as_bytes(), 0, &DecoderConfig::default()).unwrap();
        assert!(frame.is_none());
    }
}
