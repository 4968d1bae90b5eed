//! Base types for bridging native drag-and-drop with a cross-platform UI layer.
//!
//! This crate contains the platform independent half of `dragbridge`: the file-promise delivery
//! protocol, the drag session and drop region controllers, and the dispatch facade that routes
//! requests coming from the host application. Backends (such as `dragbridge-appkit`) plug the
//! native drag subsystem into the seams exposed here: [`host::ViewHost`],
//! [`sink::ByteSink`], [`progress::ProgressPublisher`] and [`task::WriteRequest`].
//!
//! The host application is reached through an [`channel::EventChannel`], a fire-and-forget
//! method channel, and talks back by handing [`channel::MethodCall`]s to
//! [`bridge::DragDropBridge::handle`].

pub mod attributes;
pub mod bridge;
pub mod channel;
pub mod coords;
pub mod error;
pub mod host;
pub mod item;
pub mod progress;
pub mod registry;
pub mod sink;
pub mod source;
pub mod target;
pub mod task;

mod util;
