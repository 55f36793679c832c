//! Output formatting for registered-value dumps.
//!
//! Supports human-readable, JSON, and raw output formats.

use crate::cli::args::OutputFormat;
use crate::handler::ScalarKind;
use crate::session::RegisteredValue;
use crate::Value;
use serde::Serialize;
use std::io::{self, Write};

/// Every registered value of one session, ready for output.
#[derive(Debug, Serialize)]
pub struct ValueDump {
    pub session_id: u32,
    pub values: Vec<ValueRecord>,
}

/// One registered scalar.
#[derive(Debug, Serialize)]
pub struct ValueRecord {
    pub oid: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

impl ValueDump {
    pub fn new(session_id: u32, values: &[RegisteredValue]) -> Self {
        Self {
            session_id,
            values: values.iter().map(record).collect(),
        }
    }

    /// Write the dump to stdout.
    pub fn write(&self, format: OutputFormat) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        self.write_to(&mut stdout, format)
    }

    pub fn write_to<W: Write>(&self, w: &mut W, format: OutputFormat) -> io::Result<()> {
        match format {
            OutputFormat::Human => self.write_human(w),
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
                writeln!(w, "{}", json)
            }
            OutputFormat::Raw => {
                for rec in &self.values {
                    writeln!(w, "{}\t{}", rec.oid, plain(&rec.value))?;
                }
                Ok(())
            }
        }
    }

    fn write_human<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "Session {}: {} value(s)", self.session_id, self.values.len())?;
        for rec in &self.values {
            write!(w, "{} = {}: ", rec.oid, rec.value_type)?;
            match (&rec.formatted, &rec.value) {
                (Some(formatted), _) => writeln!(w, "{}", formatted)?,
                (None, serde_json::Value::String(s)) => writeln!(w, "\"{}\"", s)?,
                (None, other) => writeln!(w, "{}", other)?,
            }
        }
        Ok(())
    }
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn record(rv: &RegisteredValue) -> ValueRecord {
    let (value, formatted) = format_value(rv.kind, &rv.value);
    ValueRecord {
        oid: rv.oid.to_string(),
        value_type: rv.kind.name().to_string(),
        value,
        formatted,
    }
}

/// JSON value plus an optional display form.
fn format_value(kind: ScalarKind, value: &Value) -> (serde_json::Value, Option<String>) {
    match value {
        Value::Integer(v) => (serde_json::Value::from(*v), None),
        Value::Counter32(v) | Value::Gauge32(v) => (serde_json::Value::from(*v), None),
        Value::Counter64(v) => (serde_json::Value::from(*v), None),
        Value::TimeTicks(v) => (serde_json::Value::from(*v), Some(format_timeticks(*v))),
        Value::IpAddress(a) => (
            serde_json::Value::String(format!("{}.{}.{}.{}", a[0], a[1], a[2], a[3])),
            None,
        ),
        Value::OctetString(data) if kind == ScalarKind::DisplayString || is_printable(data) => {
            let text = String::from_utf8_lossy(data).into_owned();
            (serde_json::Value::String(text), None)
        }
        Value::OctetString(data) | Value::Opaque(data) => (
            serde_json::Value::String(hex_string(data)),
            Some(format_hex_string(data)),
        ),
        other => (serde_json::Value::String(other.to_string()), None),
    }
}

/// Check if bytes are printable ASCII/UTF-8.
fn is_printable(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.chars().all(|c| c.is_ascii_graphic() || c.is_ascii_whitespace()),
        Err(_) => false,
    }
}

/// Format bytes as hex string (lowercase, no separator).
fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Format bytes as spaced hex for display.
fn format_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format TimeTicks as human-readable duration.
fn format_timeticks(centiseconds: u32) -> String {
    let total_seconds = centiseconds / 100;
    let cs = centiseconds % 100;

    let days = total_seconds / 86400;
    let hours = (total_seconds % 86400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}.{:02}", days, hours, minutes, seconds, cs)
    } else {
        format!("{:02}:{:02}:{:02}.{:02}", hours, minutes, seconds, cs)
    }
}

/// Write an error message to stderr.
pub fn write_error(err: &crate::Error) {
    eprintln!("Error: {}", err);
}
