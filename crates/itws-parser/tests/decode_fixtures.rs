//! Decoding of complete product documents built with the shared fixtures.

use itws_parser::{decode_frame, DecoderConfig, TranscodeMode};
use test_utils::{
    create_cell_grid, create_level_grid, rle_from_levels, ItwsMessageBuilder,
    BASE_GENERATION_SECS,
};
use wx_common::{DimensionSource, FrameCells, OffsetMode, SpecialCodes};

fn expanded() -> DecoderConfig {
    DecoderConfig::default()
}

fn compact() -> DecoderConfig {
    DecoderConfig {
        mode: TranscodeMode::Compact,
        ..Default::default()
    }
}

#[test]
fn test_expanded_grid_matches_source_levels() {
    let levels = create_level_grid(16, 24);
    let xml = ItwsMessageBuilder::new()
        .counts(16, 24)
        .pixels(rle_from_levels(&levels))
        .build();

    let frame = decode_frame(xml.as_bytes(), 1, &expanded()).unwrap().unwrap();

    assert_eq!((frame.geometry.rows, frame.geometry.cols), (16, 24));
    assert_eq!(frame.cells, FrameCells::Expanded(levels.clone()));
    assert_eq!(frame.stats.max_level, 6);
    assert_eq!(
        frame.stats.non_zero_cells,
        levels.iter().filter(|l| **l > 0).count() as u64
    );
    assert_eq!(frame.stats.active_levels(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_compact_runs_expand_to_same_grid() {
    let levels = create_cell_grid(10, 10, 4, 2..5, 3..8);
    let xml = ItwsMessageBuilder::new()
        .grid_max(9, 9)
        .pixels(rle_from_levels(&levels))
        .build();

    let frame = decode_frame(xml.as_bytes(), 1, &compact()).unwrap().unwrap();

    assert_eq!(frame.dims_source, DimensionSource::GridMax);
    assert!(matches!(frame.cells, FrameCells::Runs(_)));
    assert_eq!(frame.cells.levels(100).as_ref(), levels.as_slice());
    assert_eq!(frame.stats.non_zero_cells, 15);
}

#[test]
fn test_header_fields() {
    let xml = ItwsMessageBuilder::new()
        .generation(BASE_GENERATION_SECS, 500)
        .expiration(BASE_GENERATION_SECS + 360, 0)
        .cell_size(500, 750)
        .rotation(12.5)
        .trp(40.6413, -73.7781)
        .offsets(-1000, -2000)
        .max_precip_level(3)
        .counts(2, 2)
        .pixels("1,1 3,3")
        .build();

    let frame = decode_frame(xml.as_bytes(), 7, &compact()).unwrap().unwrap();

    assert_eq!(frame.identity.product_id, Some(9901));
    assert_eq!(frame.identity.site, "ATL");
    assert_eq!(frame.identity.airport, "KATL");
    assert_eq!(frame.generated_at_ms, BASE_GENERATION_SECS * 1000 + 500);
    assert_eq!(frame.expires_at_ms, Some((BASE_GENERATION_SECS + 360) * 1000));
    assert_eq!(frame.received_at_ms, 7);
    assert_eq!((frame.geometry.dx_m, frame.geometry.dy_m), (500, 750));
    assert_eq!(frame.geometry.rotation_deg, 12.5);
    assert_eq!(frame.geometry.trp_lat_deg, 40.6413);
    assert_eq!(frame.geometry.offset_mode, OffsetMode::FromMessage);
    assert_eq!(
        (frame.geometry.x_offset_m, frame.geometry.y_offset_m),
        (-1000, -2000)
    );
    assert_eq!(frame.header_max_level, Some(3));
    assert_eq!(frame.compression.as_deref(), Some("RLE"));
    assert_eq!(frame.spacing_secs, Some(300));
}

#[test]
fn test_only_first_image_is_decoded() {
    let xml = ItwsMessageBuilder::new()
        .counts(1, 4)
        .pixels("2,4")
        .extra_image("5,4")
        .build();

    let frame = decode_frame(xml.as_bytes(), 0, &expanded()).unwrap().unwrap();
    assert_eq!(frame.cells, FrameCells::Expanded(vec![2, 2, 2, 2]));
    assert_eq!(frame.stats.max_level, 2);
}

#[test]
fn test_special_codes_counted_and_zeroed() {
    let xml = ItwsMessageBuilder::new()
        .counts(2, 5)
        .pixels("15,3 9,1 7,2 8,1 6,1 3,2")
        .build();

    let frame = decode_frame(xml.as_bytes(), 0, &expanded()).unwrap().unwrap();
    let special = frame.stats.special;
    assert_eq!(special.no_coverage, 3);
    assert_eq!(special.bad, 1);
    assert_eq!(special.attenuated, 2);
    assert_eq!(special.anomalous_propagation, 1);
    assert_eq!(
        frame.cells,
        FrameCells::Expanded(vec![0, 0, 0, 0, 0, 0, 0, 6, 3, 3])
    );
}

#[test]
fn test_special_code_override_from_header() {
    let xml = ItwsMessageBuilder::new()
        .header("fci_grid_no_coverage_value", "5")
        .counts(1, 4)
        .pixels("5,2 15,2")
        .build();

    let frame = decode_frame(xml.as_bytes(), 0, &compact()).unwrap().unwrap();
    assert_eq!(frame.stats.special.no_coverage, 2);
    // 15 is no longer special and is out of range
    assert_eq!(frame.stats.max_level, 0);
    assert_eq!(frame.cells.rle_text(), "0,4");
}

#[test]
fn test_configured_special_codes() {
    let config = DecoderConfig {
        special_codes: SpecialCodes {
            bad: 2,
            ..Default::default()
        },
        ..compact()
    };
    let xml = ItwsMessageBuilder::new().counts(1, 3).pixels("2,3").build();

    let frame = decode_frame(xml.as_bytes(), 0, &config).unwrap().unwrap();
    assert_eq!(frame.stats.special.bad, 3);
    assert_eq!(frame.stats.non_zero_cells, 0);
}

#[test]
fn test_dimension_mismatch_is_published() {
    let xml = ItwsMessageBuilder::new().counts(3, 3).pixels("1,7").build();

    let frame = decode_frame(xml.as_bytes(), 0, &expanded()).unwrap().unwrap();
    assert!(frame.has_dimension_mismatch());
    assert_eq!(frame.dims_source, DimensionSource::ExplicitMismatch);
    // Expanded cells are padded to rows * cols
    assert_eq!(
        frame.cells,
        FrameCells::Expanded(vec![1, 1, 1, 1, 1, 1, 1, 0, 0])
    );
}

#[test]
fn test_product_filter() {
    let config = DecoderConfig {
        target_product_id: Some(9901),
        ..compact()
    };

    let other = ItwsMessageBuilder::new()
        .product_id(Some(9905))
        .counts(1, 1)
        .pixels("1,1")
        .build();
    assert!(decode_frame(other.as_bytes(), 0, &config).unwrap().is_none());

    let unlabeled = ItwsMessageBuilder::new()
        .product_id(None)
        .counts(1, 1)
        .pixels("1,1")
        .build();
    assert!(decode_frame(unlabeled.as_bytes(), 0, &config)
        .unwrap()
        .is_some());
}

#[test]
fn test_missing_generation_time_uses_receipt() {
    let xml = ItwsMessageBuilder::new()
        .without_generation()
        .counts(1, 1)
        .pixels("1,1")
        .build();

    let frame = decode_frame(xml.as_bytes(), 1234, &compact()).unwrap().unwrap();
    assert_eq!(frame.generated_at_ms, 1234);
}

#[test]
fn test_message_without_payload() {
    let xml = ItwsMessageBuilder::new().counts(2, 2).build();
    assert!(decode_frame(xml.as_bytes(), 0, &expanded()).unwrap().is_none());
}

#[test]
fn test_zero_count_runs_produce_no_frame() {
    let xml = ItwsMessageBuilder::new().counts(2, 2).pixels("1,0 2,0").build();
    assert!(decode_frame(xml.as_bytes(), 0, &expanded()).unwrap().is_none());
}

#[test]
fn test_malformed_tokens_are_skipped() {
    let xml = ItwsMessageBuilder::new()
        .counts(1, 3)
        .pixels("2,2 garbage 4,1")
        .build();

    let frame = decode_frame(xml.as_bytes(), 0, &compact()).unwrap().unwrap();
    assert_eq!(frame.stats.total_cells, 3);
    assert_eq!(frame.cells.rle_text(), "2,2 4,1");
}

#[test]
fn test_oversized_header_grid_is_dropped() {
    let xml = "<m><fci_image><fci_grid_nrows>3000000</fci_grid_nrows>\
               <fci_grid_ncols>3000000</fci_grid_ncols>\
               <fci_grid_compressed>1,7</fci_grid_compressed></fci_image></m>";

    assert!(decode_frame(xml.as_bytes(), 0, &expanded()).unwrap().is_none());
    assert!(decode_frame(xml.as_bytes(), 0, &compact()).unwrap().is_none());
}

#[test]
fn test_oversized_square_grid_is_dropped() {
    // 3e9 * 3e9 cells resolves as a perfect square
    let xml = ItwsMessageBuilder::new()
        .pixels("1,9000000000000000000")
        .build();

    assert!(decode_frame(xml.as_bytes(), 0, &compact()).unwrap().is_none());
}
