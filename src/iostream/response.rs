//! Parsable response lines for test and console applications.
//!
//! ```text
//! response  {{(cmd)}{tag:value}{tag:value}}
//! header   #{{(cmd)}{tag}{tag}}
//! multi     {{value}{value}}
//! error     {{(cmd)}{error:message}{errorCode:N}}
//! ```
//!
//! Each line's fields are staged in a fixed buffer before anything is
//! written. If a field does not fit or its tag is malformed, the fields
//! staged so far are written followed by ` {internal_error:N}` and the line
//! is closed.

use core::fmt::{self, Write as _};

use heapless::String;
use log::warn;

use super::{IoStream, StreamExt};
use crate::error::{ResponseError, Result};

/// Staging buffer size for one line's fields.
pub const LINE_CAPACITY: usize = 256;

/// Highest precision accepted by [`format_float`].
pub const MAX_FLOAT_PRECISION: u8 = 9;

/// One `{tag:value}` pair.
#[derive(Clone, Copy)]
pub struct Field<'a> {
    pub tag: &'a str,
    pub value: &'a dyn fmt::Display,
}

impl<'a> Field<'a> {
    pub fn new(tag: &'a str, value: &'a dyn fmt::Display) -> Self {
        Self { tag, value }
    }
}

/// Which half of each field a line carries.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Part {
    Both,
    TagOnly,
    ValueOnly,
}

/// Writes response lines to a stream.
pub struct ResponsePrinter<'a, S: ?Sized> {
    stream: &'a S,
    enabled: bool,
}

impl<'a, S: IoStream + ?Sized> ResponsePrinter<'a, S> {
    pub fn new(stream: &'a S) -> Self {
        Self {
            stream,
            enabled: true,
        }
    }

    /// While disabled every call succeeds without output.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `{{(cmd)}{tag:value}...}`
    pub fn response(&self, command: Option<&str>, fields: &[Field<'_>]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.start(command)?;
        self.emit(fields, Part::Both, true)
    }

    /// `#{{(cmd)}{tag}...}` describing the columns of later `multi` lines.
    pub fn header(&self, command: Option<&str>, tags: &[&str]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.stream.write_all(b"#")?;
        self.start(command)?;
        let fields: heapless::Vec<Field<'_>, 32> = tags
            .iter()
            .take(32)
            .map(|tag| Field::new(tag, &""))
            .collect();
        self.emit(&fields, Part::TagOnly, true)
    }

    /// `{{value}...}`, one row under a previous `header`.
    pub fn multi(&self, values: &[&dyn fmt::Display]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.stream.write_all(b"{")?;
        let fields: heapless::Vec<Field<'_>, 32> =
            values.iter().take(32).map(|v| Field::new("", *v)).collect();
        self.emit(&fields, Part::ValueOnly, true)
    }

    /// Open a multi-part line: `{{(cmd)}`. With no command the `{(cmd)}`
    /// block is left out; an empty command still prints `{()}`.
    pub fn start(&self, command: Option<&str>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.stream.write_all(b"{")?;
        if let Some(command) = command {
            self.stream.print(format_args!("{{({command})}}"))?;
        }
        Ok(())
    }

    /// Add fields to an open line.
    pub fn continue_with(&self, fields: &[Field<'_>]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.emit(fields, Part::Both, false)
    }

    /// Add the last fields and close the line.
    pub fn end(&self, fields: &[Field<'_>]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.emit(fields, Part::Both, true)
    }

    /// `{{(cmd)}{error:message}{errorCode:N}}`
    pub fn error(&self, command: Option<&str>, code: u8, message: fmt::Arguments<'_>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.start(command)?;
        self.stream.write_all(b"{error:")?;
        self.stream.print(message)?;
        self.stream.print(format_args!("}}{{errorCode:{code}}}}}\n"))
    }

    fn emit(&self, fields: &[Field<'_>], part: Part, finalize: bool) -> Result<()> {
        let mut line: String<LINE_CAPACITY> = String::new();
        let mut failure = None;
        for field in fields {
            let mark = line.len();
            if let Err(e) = stage(&mut line, field, part) {
                line.truncate(mark);
                failure = Some(e);
                break;
            }
        }
        self.stream.write_all(line.as_bytes())?;
        if let Some(e) = failure {
            warn!("response: line cut short: {e}");
            self.stream
                .print(format_args!(" {{internal_error:{}}}", e.code()))?;
        }
        if finalize {
            self.stream.write_all(b"}\n")?;
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Append one field in its framed form.
fn stage<const N: usize>(
    line: &mut String<N>,
    field: &Field<'_>,
    part: Part,
) -> core::result::Result<(), ResponseError> {
    let tag = field.tag.trim_start_matches('\n');
    if part != Part::ValueOnly && tag.contains([':', '{', '}', ',']) {
        return Err(ResponseError::InvalidTag);
    }
    let newlines = field.tag.len() - tag.len();
    let staged = (|| -> fmt::Result {
        for _ in 0..newlines {
            line.push('\n').map_err(|()| fmt::Error)?;
        }
        match part {
            Part::Both => write!(line, "{{{tag}:{}}}", field.value),
            Part::TagOnly => write!(line, "{{{tag}}}"),
            Part::ValueOnly => write!(line, "{{{}}}", field.value),
        }
    })();
    staged.map_err(|_| ResponseError::LineTooLong)
}

/// Fixed-point text for `value`, rounded half away from zero.
/// `None` when the scaled value does not fit in 31 bits, the value is not
/// finite, or `precision` exceeds [`MAX_FLOAT_PRECISION`].
pub fn format_float(value: f32, precision: u8) -> Option<String<24>> {
    if precision > MAX_FLOAT_PRECISION || !value.is_finite() {
        return None;
    }
    let negative = value < 0.0;
    let mut scaled = value;
    for _ in 0..precision {
        scaled *= 10.0;
    }
    let magnitude = if negative { 0.5 - scaled } else { scaled + 0.5 };
    if magnitude >= i32::MAX as f32 {
        return None;
    }
    let whole = magnitude as u32;
    let mut out = String::new();
    if negative {
        out.push('-').ok()?;
    }
    if precision == 0 {
        write!(out, "{whole}").ok()?;
    } else {
        let div = 10u32.pow(u32::from(precision));
        write!(
            out,
            "{}.{:0width$}",
            whole / div,
            whole % div,
            width = usize::from(precision)
        )
        .ok()?;
    }
    Some(out)
}
