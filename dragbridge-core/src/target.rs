//! The drop region.
//!
//! A [`DropTarget`] is passive: it forwards what the pointer does over the region to the host
//! application and accepts every drop. Dropped file promises are materialized by the OS through
//! the originating side's write callback, not here.

use std::sync::Arc;

use dpi::LogicalPosition;
use tracing::trace;

use crate::channel::{ChannelEvent, EventChannel};
use crate::coords::{self, LogicalRect};
use crate::source::DragOperation;

#[derive(Debug)]
pub struct DropTarget {
    channel: Arc<dyn EventChannel>,
    accepted_types: Vec<String>,
}

impl DropTarget {
    /// Creates a drop region registered for `accepted_types`, in order and without duplicates.
    pub fn new(channel: Arc<dyn EventChannel>, accepted_types: impl IntoIterator<Item = String>) -> Self {
        let mut types: Vec<String> = Vec::new();
        for ty in accepted_types {
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
        DropTarget { channel, accepted_types: types }
    }

    /// The pasteboard types the native view registers for.
    pub fn accepted_types(&self) -> &[String] {
        &self.accepted_types
    }

    /// The pointer entered the region at `point`, relative to `bounds`.
    pub fn entered(&self, point: LogicalPosition<f64>, bounds: &LogicalRect) -> DragOperation {
        let position = coords::to_channel(point, bounds);
        trace!(?position, "dragging entered");
        self.channel.invoke(ChannelEvent::DraggingEntered { position });
        DragOperation::MOVE
    }

    pub fn updated(&self, point: LogicalPosition<f64>, bounds: &LogicalRect) -> DragOperation {
        let position = coords::to_channel(point, bounds);
        trace!(?position, "dragging updated");
        self.channel.invoke(ChannelEvent::DraggingUpdated { position });
        DragOperation::MOVE
    }

    pub fn exited(&self) {
        trace!("dragging exited");
        self.channel.invoke(ChannelEvent::DraggingExited);
    }

    /// Something was dropped. Always succeeds.
    pub fn perform(&self) -> bool {
        trace!("perform drag operation");
        self.channel.invoke(ChannelEvent::PerformDragOperation);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<ChannelEvent>>);

    impl EventChannel for Recorder {
        fn invoke(&self, event: ChannelEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn forwards_pointer_events() {
        let channel = Arc::new(Recorder::default());
        let target = DropTarget::new(channel.clone(), Vec::new());
        let bounds = LogicalRect::new(0.0, 0.0, 800.0, 600.0);

        assert_eq!(target.entered(LogicalPosition::new(10.0, 590.0), &bounds), DragOperation::MOVE);
        assert_eq!(target.updated(LogicalPosition::new(20.0, 500.0), &bounds), DragOperation::MOVE);
        target.exited();
        assert!(target.perform());

        assert_eq!(*channel.0.lock().unwrap(), [
            ChannelEvent::DraggingEntered { position: [10.0, 10.0] },
            ChannelEvent::DraggingUpdated { position: [20.0, 100.0] },
            ChannelEvent::DraggingExited,
            ChannelEvent::PerformDragOperation,
        ]);
    }

    #[test]
    fn accepted_types_are_deduplicated() {
        let types = ["public.file-url", "public.folder", "public.file-url"].map(String::from);
        let target = DropTarget::new(Arc::new(Recorder::default()), types);
        assert_eq!(target.accepted_types(), ["public.file-url", "public.folder"]);
    }
}
