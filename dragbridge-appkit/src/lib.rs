//! # macOS / AppKit
//!
//! Native views and delegates behind [`DragDropBridge`](dragbridge_core::bridge::DragDropBridge)
//! on macOS.
//!
//! [`AppKitViewHost`] attaches to a window's content view. Every draggable region becomes a
//! [`DraggableView`] that starts `NSDraggingSession`s, whose file promises are
//! `NSFilePromiseProvider`s driven by a [`FilePromiseDelegate`]. The drop region is a
//! [`DropTargetView`] covering the whole content view.
//!
//! The OS writes file promises on background operation queues, so the event channel may be
//! invoked off the main thread; [`MainThreadChannel`] moves those calls back to the main queue.
#![cfg(target_os = "macos")]

mod channel;
mod draggable_view;
mod drop_target_view;
mod host;
mod progress;
mod promise;
mod util;

pub use self::channel::MainThreadChannel;
pub use self::draggable_view::DraggableView;
pub use self::drop_target_view::DropTargetView;
pub use self::host::AppKitViewHost;
pub use self::progress::FileProgressPublisher;
pub use self::promise::FilePromiseDelegate;

/// A bridge attached to an AppKit content view.
pub type AppKitBridge = dragbridge_core::bridge::DragDropBridge<AppKitViewHost>;
