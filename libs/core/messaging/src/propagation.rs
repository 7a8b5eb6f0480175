//! W3C Trace Context propagation through message attributes.
//!
//! Publishers inject a `traceparent` attribute; the trace middleware reads it
//! back so log lines on both sides share a trace id.

use std::collections::HashMap;

/// Attribute key carrying the W3C trace parent.
pub const TRACEPARENT: &str = "traceparent";

/// Trace identifiers extracted from, or injected into, message attributes.
///
/// Format: `{version}-{trace_id}-{span_id}-{flags}`, e.g.
/// `00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub sampled: bool,
}

impl TraceContext {
    /// Start a new trace.
    pub fn new_root() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().as_simple().to_string(),
            span_id: new_span_id(),
            sampled: true,
        }
    }

    /// Same trace, fresh span id.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id(),
            sampled: self.sampled,
        }
    }

    /// Parse a `traceparent` value. Returns `None` for anything malformed,
    /// including the all-zero ids W3C Trace Context declares invalid.
    pub fn parse(traceparent: &str) -> Option<Self> {
        let mut parts = traceparent.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        if version.len() != 2 || version == "ff" || !is_lower_hex(version) {
            return None;
        }
        if trace_id.len() != 32 || !is_lower_hex(trace_id) || is_zero(trace_id) {
            return None;
        }
        if span_id.len() != 16 || !is_lower_hex(span_id) || is_zero(span_id) {
            return None;
        }
        if flags.len() != 2 || !is_lower_hex(flags) {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;
        // Only version 00 is fixed at four fields
        if version == "00" && parts.next().is_some() {
            return None;
        }

        Some(Self {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            sampled: flags & 0x01 == 0x01,
        })
    }

    /// Read the context from message attributes, if one is present and valid.
    pub fn extract(attributes: &HashMap<String, String>) -> Option<Self> {
        attributes.get(TRACEPARENT).and_then(|v| Self::parse(v))
    }

    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { "01" } else { "00" };
        format!("00-{}-{}-{}", self.trace_id, self.span_id, flags)
    }

    /// Write the context into message attributes.
    pub fn inject(&self, attributes: &mut HashMap<String, String>) {
        attributes.insert(TRACEPARENT.to_string(), self.to_traceparent());
    }
}

fn new_span_id() -> String {
    uuid::Uuid::new_v4().as_simple().to_string()[..16].to_string()
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn is_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}
