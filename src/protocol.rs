//! Structural messages exchanged with embedded documents
//!
//! Every message is tagged with the `page-sync` namespace and an event name.
//! Embedded documents post `document-ready` (cross-origin handshake) and
//! `event` (host-originated interaction); guests receive `apply`.

use serde::{Deserialize, Serialize};

use crate::context::ContextId;

pub const SYNC_NS: &str = "page-sync";
pub const DOCUMENT_READY: &str = "document-ready";
pub const EVENT: &str = "event";
pub const APPLY: &str = "apply";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub ns: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Message {
    pub fn sync(name: &str, context: Option<ContextId>, data: serde_json::Value) -> Self {
        Self {
            ns: SYNC_NS.to_string(),
            name: name.to_string(),
            context: context.map(|id| id.to_string()),
            data,
        }
    }

    /// Handshake a cross-origin document posts once it is interactive
    pub fn document_ready(context: ContextId, viewport: Option<&str>) -> Self {
        let data = match viewport {
            Some(content) => serde_json::json!({ "viewport": content }),
            None => serde_json::Value::Null,
        };
        Self::sync(DOCUMENT_READY, Some(context), data)
    }

    /// Host-originated interaction, as captured inside the document
    pub fn event(event: &SyncEvent) -> Self {
        Self::sync(EVENT, None, event.to_value())
    }

    /// Relay of a host event into a guest document
    pub fn apply(event: &SyncEvent) -> Self {
        Self::sync(APPLY, None, event.to_value())
    }

    pub fn is_sync(&self, name: &str) -> bool {
        self.ns == SYNC_NS && self.name == name
    }

    pub fn is_handshake_for(&self, context: ContextId) -> bool {
        self.is_sync(DOCUMENT_READY) && self.context.as_deref() == Some(&context.to_string())
    }

    /// Viewport declaration carried by a `document-ready` handshake
    pub fn viewport_content(&self) -> Option<&str> {
        self.data.get("viewport").and_then(|v| v.as_str())
    }

    pub fn sync_event(&self) -> Option<SyncEvent> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// An interaction replayed on guests.
///
/// Positions are relative so that documents rendered at different sizes
/// stay aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// Scroll offsets as fractions (0..=1) of the scrollable range
    Scroll { left: f64, top: f64 },
    Input { target: String, value: String },
    Click { target: String },
    Navigate { url: String },
    Reload,
}

impl SyncEvent {
    pub fn scroll_from_pixels(left: f64, top: f64, max_left: f64, max_top: f64) -> Self {
        Self::Scroll {
            left: ratio(left, max_left),
            top: ratio(top, max_top),
        }
    }

    /// Pixel offsets for a document with the given scrollable range
    pub fn scroll_to_pixels(&self, max_left: f64, max_top: f64) -> Option<(f64, f64)> {
        match self {
            Self::Scroll { left, top } => Some((
                (left * max_left.max(0.0)).round(),
                (top * max_top.max(0.0)).round(),
            )),
            _ => None,
        }
    }

    fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn ratio(pos: f64, max: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        (pos / max).clamp(0.0, 1.0)
    }
}
