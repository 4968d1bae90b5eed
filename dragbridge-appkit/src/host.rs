use std::collections::HashMap;
use std::sync::Arc;

use dragbridge_core::coords::LogicalRect;
use dragbridge_core::host::ViewHost;
use dragbridge_core::source::DragSource;
use dragbridge_core::target::DropTarget;
use objc2::rc::{Retained, Weak};
use objc2::{MainThreadMarker, MainThreadOnly};
use objc2_app_kit::{NSFilePromiseReceiver, NSView, NSWindowOrderingMode};
use tracing::debug;

use crate::draggable_view::DraggableView;
use crate::drop_target_view::DropTargetView;
use crate::util;

/// Hosts draggable regions and the drop region in a window's content view.
///
/// The content view is referenced weakly; once it is gone, requests needing it fail with
/// [`BridgeError::Unavailable`](dragbridge_core::error::BridgeError::Unavailable).
#[derive(Debug)]
pub struct AppKitViewHost {
    mtm: MainThreadMarker,
    content_view: Weak<NSView>,
    draggables: HashMap<String, Retained<DraggableView>>,
    drop_target: Option<Retained<DropTargetView>>,
}

impl AppKitViewHost {
    pub fn new(content_view: &NSView) -> Self {
        AppKitViewHost {
            mtm: content_view.mtm(),
            content_view: Weak::new(content_view),
            draggables: HashMap::new(),
            drop_target: None,
        }
    }

    pub fn content_view(&self) -> Option<Retained<NSView>> {
        self.content_view.load()
    }

    pub fn draggable_view(&self, id: &str) -> Option<&Retained<DraggableView>> {
        self.draggables.get(id)
    }

    pub fn drop_target_view(&self) -> Option<&Retained<DropTargetView>> {
        self.drop_target.as_ref()
    }
}

impl ViewHost for AppKitViewHost {
    fn content_bounds(&self) -> Option<LogicalRect> {
        self.content_view().map(|view| util::rect(view.bounds()))
    }

    fn promise_receiver_types(&self) -> Vec<String> {
        NSFilePromiseReceiver::readableDraggedTypes().iter().map(|ty| ty.to_string()).collect()
    }

    fn insert_draggable(&mut self, source: Arc<DragSource>) {
        let Some(content_view) = self.content_view() else {
            return;
        };
        let id = source.id().to_owned();
        let view = DraggableView::new(self.mtm, source);
        content_view.addSubview(&view);
        debug!(id = %id, "inserted draggable view");

        if let Some(previous) = self.draggables.insert(id, view) {
            previous.removeFromSuperview();
        }
    }

    fn remove_draggable(&mut self, id: &str) {
        if let Some(view) = self.draggables.remove(id) {
            view.removeFromSuperview();
        }
    }

    fn install_drop_target(&mut self, target: Arc<DropTarget>) {
        let Some(content_view) = self.content_view() else {
            return;
        };
        let view = DropTargetView::new(self.mtm, target, content_view.bounds());
        // Below the draggable views, so those keep receiving mouse events.
        content_view.addSubview_positioned_relativeTo(&view, NSWindowOrderingMode::Below, None);

        if let Some(previous) = self.drop_target.replace(view) {
            previous.removeFromSuperview();
        }
    }

    fn remove_drop_target(&mut self) {
        if let Some(view) = self.drop_target.take() {
            view.removeFromSuperview();
        }
    }
}

impl Drop for AppKitViewHost {
    fn drop(&mut self) {
        for view in self.draggables.values() {
            view.removeFromSuperview();
        }
        self.remove_drop_target();
    }
}
