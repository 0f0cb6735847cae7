//! Header element names and their fields.

/// Container of one forecast/current image. Only the first one is decoded.
pub(crate) const IMAGE_ELEMENT: &[u8] = b"fci_image";

/// Run-length pixel payload inside the image container.
pub(crate) const PAYLOAD_ELEMENT: &[u8] = b"fci_grid_compressed";

/// Header field an element's text is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderTag {
    ProductId,
    ProductName,
    Site,
    Airport,
    GenerationSeconds,
    GenerationMillis,
    ExpirationSeconds,
    ExpirationMillis,
    Spacing,
    GridDx,
    GridDy,
    Rotation,
    TrpLatitude,
    TrpLongitude,
    XOffset,
    YOffset,
    RowCount,
    ColCount,
    GridMaxX,
    GridMaxY,
    MaxPrecipLevel,
    CompressionScheme,
    BadCode,
    NoCoverageCode,
    AttenuatedCode,
    ApCode,
}

impl HeaderTag {
    pub(crate) fn from_name(name: &[u8]) -> Option<Self> {
        let tag = match name {
            b"product_msg_id" => HeaderTag::ProductId,
            b"product_msg_name" => HeaderTag::ProductName,
            b"product_header_site_id" | b"product_header_itws_sites" => HeaderTag::Site,
            b"product_header_airports" => HeaderTag::Airport,
            b"product_header_generation_time_seconds" => HeaderTag::GenerationSeconds,
            b"product_header_generation_time_milliseconds" => HeaderTag::GenerationMillis,
            b"product_header_expiration_time_seconds" => HeaderTag::ExpirationSeconds,
            b"product_header_expiration_time_milliseconds" => HeaderTag::ExpirationMillis,
            b"fci_spacing" => HeaderTag::Spacing,
            b"grid_dx" => HeaderTag::GridDx,
            b"grid_dy" => HeaderTag::GridDy,
            b"grid_rotation" => HeaderTag::Rotation,
            b"grid_TRP_latitude" => HeaderTag::TrpLatitude,
            b"grid_TRP_longitude" => HeaderTag::TrpLongitude,
            b"grid_xoffset" | b"grid_x_offset" | b"xOffsetM" | b"prcp_xoffset" => {
                HeaderTag::XOffset
            }
            b"grid_yoffset" | b"grid_y_offset" | b"yOffsetM" | b"prcp_yoffset" => {
                HeaderTag::YOffset
            }
            b"fci_grid_nrows" | b"grid_nrows" | b"nrows" => HeaderTag::RowCount,
            b"fci_grid_ncols" | b"grid_ncols" | b"ncols" => HeaderTag::ColCount,
            b"fci_grid_max_x" => HeaderTag::GridMaxX,
            b"fci_grid_max_y" => HeaderTag::GridMaxY,
            b"fci_grid_max_precip_level" => HeaderTag::MaxPrecipLevel,
            b"fci_grid_compression_encoding_scheme" => HeaderTag::CompressionScheme,
            b"fci_grid_bad_value" => HeaderTag::BadCode,
            b"fci_grid_no_coverage_value" => HeaderTag::NoCoverageCode,
            b"fci_grid_attenuated_value" => HeaderTag::AttenuatedCode,
            b"fci_grid_ap_value" => HeaderTag::ApCode,
            _ => return None,
        };
        Some(tag)
    }

    /// Tags that only count inside the first image container.
    pub(crate) fn is_image_scoped(&self) -> bool {
        matches!(
            self,
            HeaderTag::RowCount
                | HeaderTag::ColCount
                | HeaderTag::GridMaxX
                | HeaderTag::GridMaxY
                | HeaderTag::MaxPrecipLevel
                | HeaderTag::CompressionScheme
        )
    }
}

/// Parse an integer, ignoring any fractional part (`"926.0"` -> 926).
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let whole = match text.find('.') {
        Some(dot) => &text[..dot],
        None => text,
    };
    whole.trim().parse().ok()
}

pub(crate) fn parse_f64(text: &str) -> Option<f64> {
    text.trim().parse().ok().filter(|v: &f64| v.is_finite())
}
