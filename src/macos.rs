//! # macOS / AppKit
//!
//! The bridge attaches to the content view of an `NSWindow`:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dragbridge::channel::{ChannelEvent, EventChannel};
//! use dragbridge::macos::{AppKitBridge, AppKitViewHost, MainThreadChannel};
//! use dragbridge::BridgeAttributes;
//! # use objc2_app_kit::NSView;
//!
//! struct HostChannel;
//!
//! impl EventChannel for HostChannel {
//!     fn invoke(&self, event: ChannelEvent) {
//!         // Forward `event.method()` and `event.arguments()` to the UI layer.
//!     }
//! }
//!
//! # fn attach(content_view: &NSView) {
//! let channel = Arc::new(MainThreadChannel::new(HostChannel));
//! let mut bridge = AppKitBridge::new(
//!     AppKitViewHost::new(content_view),
//!     channel,
//!     BridgeAttributes::default(),
//! );
//! # }
//! ```
//!
//! File promises are written on a serial operation queue per promised file, so
//! [`EventChannel::invoke`](crate::channel::EventChannel::invoke) may be called off the main
//! thread. Wrap channels that must only be used on the main thread in a [`MainThreadChannel`].
//!
//! Progress of a promised file is shown by the Finder through a published `NSProgress`.

pub use dragbridge_appkit::*;
