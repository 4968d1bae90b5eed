//! Native drag-and-drop for cross-platform UI layers, with file promises.
//!
//! A UI layer that draws its own widgets cannot hand the OS real views to drag from or drop on.
//! `dragbridge` fills that gap: the host application describes rectangular *draggable regions*
//! over its window, and the bridge places native views there that start real drag sessions.
//! Items can be plain names, or *file promises*: files whose bytes do not exist when the drag
//! starts, and are produced by the host application in chunks once the user drops them
//! somewhere writable.
//!
//! # Talking to the bridge
//!
//! The host application and the bridge exchange messages over an asynchronous method channel.
//! Notifications from the bridge go through an [`EventChannel`] implementation supplied by the
//! host. Requests from the host are [`MethodCall`]s handed to [`DragDropBridge::handle`]:
//!
//! | Method | Arguments | Effect |
//! |---|---|---|
//! | `setDraggableView` | `{id, x, y, width, height, names, fileNames?, fileSizes?, image?}` | define or replace a region |
//! | `removeDraggableView` | `{id}` | remove a region |
//! | `feedFileStream` | `{id, fileName, status, data?}` | the next chunk, or the end of a promised file |
//! | `updateProgress` | `{id, fileName, count}` | bytes produced so far |
//!
//! Failures are reported as a [`BridgeError`], whose [`code`](BridgeError::code) is stable.
//!
//! # File promise delivery
//!
//! 1. The user drags a region carrying `fileNames` and `fileSizes`. One delivery task per file is
//!    registered under the region id.
//! 2. When the file is dropped somewhere writable, the OS asks for it and the host receives
//!    `fileStreamCallback` with `{id, fileName, url}`.
//! 3. The host feeds chunks with `status: "kWriting"`, then `status: "kEnded"`.
//!
//! A drop that lands back inside the application's own window never reaches step 2; its tasks
//! are discarded when the drag ends. Set [`BridgeAttributes::with_delivery_timeout`] to also
//! clean up transfers the OS or the host abandon.
//!
//! # Platform support
//!
//! The protocol in this crate is platform independent and fully usable with a custom
//! [`ViewHost`]. The native backend is only available on macOS, in [`macos`].
//!
//! [`EventChannel`]: channel::EventChannel
//! [`MethodCall`]: channel::MethodCall
//! [`DragDropBridge::handle`]: bridge::DragDropBridge::handle
//! [`BridgeError`]: error::BridgeError
//! [`BridgeAttributes::with_delivery_timeout`]: attributes::BridgeAttributes::with_delivery_timeout
//! [`ViewHost`]: host::ViewHost
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use dragbridge_core::{
    attributes, bridge, channel, coords, error, host, item, progress, registry, sink, source,
    target, task,
};

#[doc(inline)]
pub use dragbridge_core::attributes::BridgeAttributes;
#[doc(inline)]
pub use dragbridge_core::bridge::DragDropBridge;
#[doc(inline)]
pub use dragbridge_core::error::BridgeError;

#[cfg(macos)]
pub mod macos;
