//! ITWS product message fixtures.
//!
//! [`ItwsMessageBuilder`] writes a product XML document in the layout the
//! bridge consumes: a product header, grid geometry fields, one or more
//! `fci_image` containers, the first of which carries the pixel payload.

/// Default product identifier of the precipitation forecast image product.
pub const FORECAST_IMAGE_PRODUCT_ID: i64 = 9901;

/// Generation time used by fixtures unless overridden (2023-11-14T22:13:20Z).
pub const BASE_GENERATION_SECS: i64 = 1_700_000_000;

/// Builder for ITWS product XML documents.
#[derive(Debug, Clone)]
pub struct ItwsMessageBuilder {
    product_id: Option<i64>,
    product_name: String,
    site: String,
    airport: String,
    generation: Option<(i64, i64)>,
    expiration: Option<(i64, i64)>,
    dx_m: i32,
    dy_m: i32,
    rotation_deg: f64,
    trp: Option<(f64, f64)>,
    offsets: Option<(i32, i32)>,
    counts: Option<(i64, i64)>,
    grid_max: Option<(i64, i64)>,
    max_precip_level: Option<i64>,
    header_extra: Vec<(String, String)>,
    pixels: Option<String>,
    extra_images: Vec<String>,
}

impl Default for ItwsMessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ItwsMessageBuilder {
    pub fn new() -> Self {
        Self {
            product_id: Some(FORECAST_IMAGE_PRODUCT_ID),
            product_name: "Precip 5-Level Forecast Image".to_string(),
            site: "ATL".to_string(),
            airport: "KATL".to_string(),
            generation: Some((BASE_GENERATION_SECS, 0)),
            expiration: None,
            dx_m: 926,
            dy_m: 926,
            rotation_deg: 0.0,
            trp: Some((33.6367, -84.4281)),
            offsets: None,
            counts: None,
            grid_max: None,
            max_precip_level: None,
            header_extra: Vec::new(),
            pixels: None,
            extra_images: Vec::new(),
        }
    }

    pub fn product_id(mut self, id: Option<i64>) -> Self {
        self.product_id = id;
        self
    }

    pub fn product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = name.into();
        self
    }

    pub fn generation(mut self, seconds: i64, millis: i64) -> Self {
        self.generation = Some((seconds, millis));
        self
    }

    pub fn without_generation(mut self) -> Self {
        self.generation = None;
        self
    }

    pub fn expiration(mut self, seconds: i64, millis: i64) -> Self {
        self.expiration = Some((seconds, millis));
        self
    }

    pub fn cell_size(mut self, dx_m: i32, dy_m: i32) -> Self {
        self.dx_m = dx_m;
        self.dy_m = dy_m;
        self
    }

    pub fn rotation(mut self, degrees: f64) -> Self {
        self.rotation_deg = degrees;
        self
    }

    pub fn trp(mut self, lat_deg: f64, lon_deg: f64) -> Self {
        self.trp = Some((lat_deg, lon_deg));
        self
    }

    pub fn offsets(mut self, x_m: i32, y_m: i32) -> Self {
        self.offsets = Some((x_m, y_m));
        self
    }

    /// Explicit row/col counts inside the image container.
    pub fn counts(mut self, rows: i64, cols: i64) -> Self {
        self.counts = Some((rows, cols));
        self
    }

    /// `fci_grid_max_x` / `fci_grid_max_y` inside the image container.
    pub fn grid_max(mut self, max_x: i64, max_y: i64) -> Self {
        self.grid_max = Some((max_x, max_y));
        self
    }

    pub fn max_precip_level(mut self, level: i64) -> Self {
        self.max_precip_level = Some(level);
        self
    }

    /// Add an arbitrary header element before the image container.
    pub fn header(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_extra.push((tag.into(), value.into()));
        self
    }

    /// Run-length pixel text for the first image.
    pub fn pixels(mut self, rle: impl Into<String>) -> Self {
        self.pixels = Some(rle.into());
        self
    }

    /// Append another image container (a later forecast frame).
    pub fn extra_image(mut self, rle: impl Into<String>) -> Self {
        self.extra_images.push(rle.into());
        self
    }

    pub fn build(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<itws_msg>\n");

        xml.push_str("  <product_header>\n");
        if let Some(id) = self.product_id {
            push_element(&mut xml, 4, "product_msg_id", &id.to_string());
        }
        push_element(&mut xml, 4, "product_msg_name", &self.product_name);
        push_element(&mut xml, 4, "product_header_itws_sites", &self.site);
        push_element(&mut xml, 4, "product_header_airports", &self.airport);
        if let Some((secs, millis)) = self.generation {
            push_element(&mut xml, 4, "product_header_generation_time_seconds", &secs.to_string());
            push_element(
                &mut xml,
                4,
                "product_header_generation_time_milliseconds",
                &millis.to_string(),
            );
        }
        if let Some((secs, millis)) = self.expiration {
            push_element(&mut xml, 4, "product_header_expiration_time_seconds", &secs.to_string());
            push_element(
                &mut xml,
                4,
                "product_header_expiration_time_milliseconds",
                &millis.to_string(),
            );
        }
        xml.push_str("  </product_header>\n");

        xml.push_str("  <prcp_grid_info>\n");
        push_element(&mut xml, 4, "grid_dx", &self.dx_m.to_string());
        push_element(&mut xml, 4, "grid_dy", &self.dy_m.to_string());
        push_element(&mut xml, 4, "grid_rotation", &self.rotation_deg.to_string());
        if let Some((lat, lon)) = self.trp {
            push_element(&mut xml, 4, "grid_TRP_latitude", &lat.to_string());
            push_element(&mut xml, 4, "grid_TRP_longitude", &lon.to_string());
        }
        if let Some((x, y)) = self.offsets {
            push_element(&mut xml, 4, "grid_xoffset", &x.to_string());
            push_element(&mut xml, 4, "grid_yoffset", &y.to_string());
        }
        for (tag, value) in &self.header_extra {
            push_element(&mut xml, 4, tag, value);
        }
        xml.push_str("  </prcp_grid_info>\n");

        xml.push_str("  <fci_image>\n");
        push_element(&mut xml, 4, "fci_spacing", "300");
        if let Some((rows, cols)) = self.counts {
            push_element(&mut xml, 4, "fci_grid_nrows", &rows.to_string());
            push_element(&mut xml, 4, "fci_grid_ncols", &cols.to_string());
        }
        if let Some((max_x, max_y)) = self.grid_max {
            push_element(&mut xml, 4, "fci_grid_max_x", &max_x.to_string());
            push_element(&mut xml, 4, "fci_grid_max_y", &max_y.to_string());
        }
        if let Some(level) = self.max_precip_level {
            push_element(&mut xml, 4, "fci_grid_max_precip_level", &level.to_string());
        }
        push_element(&mut xml, 4, "fci_grid_compression_encoding_scheme", "RLE");
        if let Some(pixels) = &self.pixels {
            push_element(&mut xml, 4, "fci_grid_compressed", pixels);
        }
        xml.push_str("  </fci_image>\n");

        for rle in &self.extra_images {
            xml.push_str("  <fci_image>\n");
            push_element(&mut xml, 4, "fci_spacing", "300");
            push_element(&mut xml, 4, "fci_grid_compressed", rle);
            xml.push_str("  </fci_image>\n");
        }

        xml.push_str("</itws_msg>\n");
        xml
    }
}

fn push_element(xml: &mut String, indent: usize, tag: &str, value: &str) {
    for _ in 0..indent {
        xml.push(' ');
    }
    xml.push('<');
    xml.push_str(tag);
    xml.push('>');
    xml.push_str(&escape(value));
    xml.push_str("</");
    xml.push_str(tag);
    xml.push_str(">\n");
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
