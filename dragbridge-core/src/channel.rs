//! The asynchronous method channel shared with the host application.
//!
//! Outgoing notifications are fire-and-forget: the bridge never waits for the host to react.
//! Incoming requests arrive as [`MethodCall`]s whose arguments are decoded with `serde`.

use std::fmt;

use serde::Deserialize;
use serde_json::{json, Value};
use smol_str::SmolStr;

use crate::error::BridgeError;

/// Sends notifications to the host application.
///
/// Implementations must not block; the bridge calls this from the UI thread and from the
/// threads the OS writes file promises on.
pub trait EventChannel: Send + Sync {
    fn invoke(&self, event: ChannelEvent);
}

impl fmt::Debug for dyn EventChannel + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("EventChannel")
    }
}

/// A notification sent to the host application.
///
/// Positions are already in the host's top-left-origin space, encoded as `[x, y]`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A drag gesture started from the draggable region `id`.
    DraggingBegin { id: String, position: [f64; 2] },
    DraggingMoved { id: String, position: [f64; 2] },
    DraggingEnded { id: String, position: [f64; 2] },
    /// The pointer entered the drop region.
    DraggingEntered { position: [f64; 2] },
    DraggingUpdated { position: [f64; 2] },
    DraggingExited,
    /// Something was dropped on the drop region.
    PerformDragOperation,
    /// The OS is ready to receive the bytes of `file_name`; the host must start feeding them.
    FileStreamCallback { id: String, file_name: String, url: String },
}

impl ChannelEvent {
    /// The method name the event is invoked under.
    pub fn method(&self) -> &'static str {
        match self {
            ChannelEvent::DraggingBegin { .. } => "draggingBegin",
            ChannelEvent::DraggingMoved { .. } => "draggingMoved",
            ChannelEvent::DraggingEnded { .. } => "draggingEnded",
            ChannelEvent::DraggingEntered { .. } => "draggingEntered",
            ChannelEvent::DraggingUpdated { .. } => "draggingUpdated",
            ChannelEvent::DraggingExited => "draggingExited",
            ChannelEvent::PerformDragOperation => "performDragOperation",
            ChannelEvent::FileStreamCallback { .. } => "fileStreamCallback",
        }
    }

    /// The arguments the event is invoked with.
    pub fn arguments(&self) -> Value {
        match self {
            ChannelEvent::DraggingBegin { id, position }
            | ChannelEvent::DraggingMoved { id, position }
            | ChannelEvent::DraggingEnded { id, position } => {
                json!({ "id": id, "position": position })
            },
            ChannelEvent::DraggingEntered { position } | ChannelEvent::DraggingUpdated { position } => {
                json!(position)
            },
            ChannelEvent::DraggingExited | ChannelEvent::PerformDragOperation => Value::Null,
            ChannelEvent::FileStreamCallback { id, file_name, url } => {
                json!({ "id": id, "fileName": file_name, "url": url })
            },
        }
    }
}

/// A request received from the host application.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: SmolStr,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<SmolStr>, arguments: Value) -> Self {
        MethodCall { method: method.into(), arguments }
    }

    /// Decode the arguments of `method`, reporting malformed ones as [`BridgeError::InvalidArgument`].
    pub(crate) fn decode<'de, T: Deserialize<'de>>(&'de self, method: &'static str) -> Result<T, BridgeError> {
        T::deserialize(&self.arguments).map_err(|e| BridgeError::invalid(method, e))
    }
}
