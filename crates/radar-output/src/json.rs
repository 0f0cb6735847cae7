//! Append-only JSON builder.
//!
//! Documents are written front to back into one buffer; there is no
//! intermediate value tree. Commas are inserted automatically, so callers
//! only describe structure:
//!
//! ```
//! use radar_output::JsonWriter;
//!
//! let mut w = JsonWriter::new();
//! w.begin_object();
//! w.key("rows").u64(2);
//! w.key("levels").begin_array().u64(1).u64(3).end_array();
//! w.end_object();
//! assert_eq!(w.as_str(), r#"{"rows":2,"levels":[1,3]}"#);
//! ```

use std::fmt::Write as _;

/// Streaming JSON writer over a `String` buffer.
#[derive(Debug, Default)]
pub struct JsonWriter {
    out: String,
    /// One entry per open container: true until its first member is written
    first: Vec<bool>,
    after_key: bool,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            ..Default::default()
        }
    }

    fn separator(&mut self) {
        if self.after_key {
            self.after_key = false;
            return;
        }
        if let Some(first) = self.first.last_mut() {
            if *first {
                *first = false;
            } else {
                self.out.push(',');
            }
        }
    }

    pub fn begin_object(&mut self) -> &mut Self {
        self.separator();
        self.out.push('{');
        self.first.push(true);
        self
    }

    pub fn end_object(&mut self) -> &mut Self {
        self.first.pop();
        self.out.push('}');
        self
    }

    pub fn begin_array(&mut self) -> &mut Self {
        self.separator();
        self.out.push('[');
        self.first.push(true);
        self
    }

    pub fn end_array(&mut self) -> &mut Self {
        self.first.pop();
        self.out.push(']');
        self
    }

    /// Object member name. The next value written belongs to it.
    pub fn key(&mut self, name: &str) -> &mut Self {
        self.separator();
        self.push_quoted(name);
        self.out.push(':');
        self.after_key = true;
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.separator();
        self.push_quoted(value);
        self
    }

    /// String value produced directly into the buffer.
    ///
    /// The closure must only write characters that need no escaping.
    pub fn string_with(&mut self, write: impl FnOnce(&mut String)) -> &mut Self {
        self.separator();
        self.out.push('"');
        write(&mut self.out);
        self.out.push('"');
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.separator();
        let _ = write!(self.out, "{}", value);
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.separator();
        let _ = write!(self.out, "{}", value);
        self
    }

    /// Finite numbers only; NaN and infinities are written as `null`.
    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.separator();
        match serde_json::Number::from_f64(value) {
            Some(number) => {
                let _ = write!(self.out, "{}", number);
            }
            None => self.out.push_str("null"),
        }
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.separator();
        self.out.push_str(if value { "true" } else { "false" });
        self
    }

    pub fn null(&mut self) -> &mut Self {
        self.separator();
        self.out.push_str("null");
        self
    }

    pub fn opt_i64(&mut self, value: Option<i64>) -> &mut Self {
        match value {
            Some(v) => self.i64(v),
            None => self.null(),
        }
    }

    fn push_quoted(&mut self, value: &str) {
        let _ = write!(self.out, "{}", serde_json::Value::from(value));
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out.into_bytes()
    }
}
