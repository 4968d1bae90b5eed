//! Outgoing drag gestures.
//!
//! A [`DragSource`] backs one draggable region. The backend forwards mouse events to it; once the
//! pointer has travelled far enough, the source materializes the native dragging items, registers
//! the file promises among them and hands the items back so the backend can start the native
//! drag session. Lifecycle notifications of that session are forwarded to the host application.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use bitflags::bitflags;
use dpi::{LogicalPosition, LogicalSize};
use tracing::{debug, trace};

use crate::attributes::BridgeAttributes;
use crate::channel::{ChannelEvent, EventChannel};
use crate::coords::{self, LogicalRect};
use crate::item::{DragImage, DragItem};
use crate::registry::TransferRegistry;
use crate::task::DeliveryTask;
use crate::util::lock;

bitflags! {
    /// The operations a drag may perform, with the values of the native operation mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DragOperation: u64 {
        const COPY = 1;
        const LINK = 2;
        const GENERIC = 4;
        const PRIVATE = 8;
        const MOVE = 16;
        const DELETE = 32;
    }
}

/// Where a drag is currently hovering, relative to the application that started it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DraggingContext {
    OutsideApplication,
    WithinApplication,
    /// A context the platform reported that is not known here.
    Other,
}

/// Copy when leaving the application, move within it.
pub fn source_operation_mask(context: DraggingContext) -> DragOperation {
    match context {
        DraggingContext::OutsideApplication => DragOperation::COPY,
        DraggingContext::WithinApplication => DragOperation::MOVE,
        DraggingContext::Other => DragOperation::GENERIC,
    }
}

/// A region of the content view that starts drags, as described by the host application.
#[derive(Debug, Clone, PartialEq)]
pub struct DraggableRegion {
    /// Also the id of every drag session started from the region.
    pub id: String,
    /// Native frame inside the content view.
    pub frame: LogicalRect,
    pub image: Option<Arc<[u8]>>,
    pub items: Vec<DragItem>,
}

/// What a native dragging item puts on the pasteboard.
#[derive(Debug, Clone)]
pub enum DraggingContent {
    /// A file promise provider advertising `file_type`, fulfilled by `task`.
    FilePromise { task: Arc<DeliveryTask>, file_type: String },
    /// An empty payload tagged with `marker_type`.
    Marker { name: String, marker_type: String },
}

/// A native dragging item, ready to be handed to the OS.
#[derive(Debug, Clone)]
pub struct DraggingItem {
    /// Where the image is placed, in the region's coordinate space.
    pub origin: LogicalPosition<f64>,
    pub image: DragImage,
    pub content: DraggingContent,
}

/// Drives the drag gestures of one [`DraggableRegion`].
#[derive(Debug)]
pub struct DragSource {
    region: DraggableRegion,
    channel: Arc<dyn EventChannel>,
    registry: Arc<TransferRegistry>,
    attributes: Arc<BridgeAttributes>,
    anchor: Mutex<Option<LogicalPosition<f64>>>,
}

impl DragSource {
    pub fn new(
        region: DraggableRegion,
        channel: Arc<dyn EventChannel>,
        registry: Arc<TransferRegistry>,
        attributes: Arc<BridgeAttributes>,
    ) -> Self {
        DragSource { region, channel, registry, attributes, anchor: Mutex::new(None) }
    }

    pub fn id(&self) -> &str {
        &self.region.id
    }

    pub fn frame(&self) -> LogicalRect {
        self.region.frame
    }

    pub fn region(&self) -> &DraggableRegion {
        &self.region
    }

    /// Remember where the press happened, in the region's coordinate space.
    pub fn mouse_down(&self, location: LogicalPosition<f64>) {
        *lock(&self.anchor) = Some(location);
    }

    /// Track the pointer while pressed.
    ///
    /// Returns the items of a new drag session once the pointer has moved past the trigger
    /// offset on either axis; every file promise among them is already registered. Returns
    /// `None` while below the offset, or when there was no press.
    pub fn mouse_dragged(&self, location: LogicalPosition<f64>) -> Option<Vec<DraggingItem>> {
        let mut anchor = lock(&self.anchor);
        let start = (*anchor)?;
        let threshold = self.attributes.drag_trigger_offset;
        if (location.x - start.x).abs() <= threshold && (location.y - start.y).abs() <= threshold {
            return None;
        }
        *anchor = None;
        drop(anchor);

        Some(self.materialize(location))
    }

    fn materialize(&self, location: LogicalPosition<f64>) -> Vec<DraggingItem> {
        let mut tasks = Vec::new();
        let items: Vec<_> = self
            .region
            .items
            .iter()
            .map(|item| {
                let content = match item {
                    DragItem::Promise { file_name, file_size } => {
                        let task = Arc::new(DeliveryTask::new(
                            self.region.id.clone(),
                            file_name.clone(),
                            *file_size,
                            self.channel.clone(),
                        ));
                        tasks.push(task.clone());
                        DraggingContent::FilePromise {
                            task,
                            file_type: self.attributes.promise_file_type.clone(),
                        }
                    },
                    DragItem::Plain { name } => DraggingContent::Marker {
                        name: name.clone(),
                        marker_type: self.attributes.marker_type.clone(),
                    },
                };
                DraggingItem { origin: location, image: self.image_for(item), content }
            })
            .collect();

        if !tasks.is_empty() {
            self.registry.register(&self.region.id, tasks.clone());
            for task in &tasks {
                task.mark_awaiting_write();
            }
        }
        debug!(id = %self.region.id, items = items.len(), promises = tasks.len(), "drag materialized");
        items
    }

    fn image_for(&self, item: &DragItem) -> DragImage {
        match &self.region.image {
            Some(bytes) => DragImage::Encoded(bytes.clone()),
            None => DragImage::Placeholder {
                label: item.label().to_owned(),
                size: LogicalSize::new(self.attributes.placeholder_width, self.region.frame.size.height),
            },
        }
    }

    pub fn operation_mask(&self, context: DraggingContext) -> DragOperation {
        source_operation_mask(context)
    }

    /// The native session started at `screen_point`.
    pub fn session_began(&self, screen_point: LogicalPosition<f64>, screen: &LogicalRect) {
        let position = coords::to_channel(screen_point, screen);
        trace!(id = %self.region.id, ?position, "dragging began");
        self.channel.invoke(ChannelEvent::DraggingBegin { id: self.region.id.clone(), position });
    }

    pub fn session_moved(&self, screen_point: LogicalPosition<f64>, screen: &LogicalRect) {
        let position = coords::to_channel(screen_point, screen);
        trace!(id = %self.region.id, ?position, "dragging moved");
        self.registry.keep_alive(&self.region.id);
        self.channel.invoke(ChannelEvent::DraggingMoved { id: self.region.id.clone(), position });
    }

    /// The native session ended at `screen_point`.
    ///
    /// When the drop lands inside `main_window`, the session's promises are discarded: the OS
    /// never asks for files moved within the application. Outside of it they stay registered
    /// until the OS writes them, and their delivery timeout starts over.
    pub fn session_ended(
        &self,
        screen_point: LogicalPosition<f64>,
        screen: &LogicalRect,
        main_window: Option<&LogicalRect>,
    ) {
        let position = coords::to_channel(screen_point, screen);
        trace!(id = %self.region.id, ?position, "dragging ended");
        self.channel.invoke(ChannelEvent::DraggingEnded { id: self.region.id.clone(), position });

        if main_window.is_some_and(|frame| frame.contains(screen_point)) {
            self.registry.discard(&self.region.id);
        } else {
            // The timeout counts from the drop, not from the start of the gesture.
            self.registry.keep_alive(&self.region.id);
        }
        if let Some(timeout) = self.attributes.delivery_timeout {
            self.registry.reap_stalled(timeout, Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::task::DeliveryState;

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<ChannelEvent>>);

    impl EventChannel for Recorder {
        fn invoke(&self, event: ChannelEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    const SCREEN: LogicalRect = LogicalRect::new(0.0, 0.0, 1000.0, 800.0);
    const WINDOW: LogicalRect = LogicalRect::new(100.0, 100.0, 400.0, 300.0);

    fn source(items: Vec<DragItem>) -> (DragSource, Arc<TransferRegistry>, Arc<Recorder>) {
        let channel = Arc::new(Recorder::default());
        let registry = Arc::new(TransferRegistry::new());
        let region = DraggableRegion {
            id: "abc".into(),
            frame: LogicalRect::new(0.0, 0.0, 120.0, 40.0),
            image: None,
            items,
        };
        let source = DragSource::new(region, channel.clone(), registry.clone(), Default::default());
        (source, registry, channel)
    }

    fn promises() -> Vec<DragItem> {
        vec![
            DragItem::Promise { file_name: "a.png".into(), file_size: 10 },
            DragItem::Promise { file_name: "b.png".into(), file_size: 20 },
        ]
    }

    #[test]
    fn small_movements_do_not_start_a_drag() {
        let (source, registry, _) = source(promises());
        source.mouse_down(LogicalPosition::new(10.0, 10.0));
        assert!(source.mouse_dragged(LogicalPosition::new(13.0, 7.0)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn negative_movements_start_a_drag() {
        let (source, _, _) = source(promises());
        source.mouse_down(LogicalPosition::new(10.0, 10.0));
        assert!(source.mouse_dragged(LogicalPosition::new(6.0, 10.0)).is_some());
    }

    #[test]
    fn drag_without_press_is_ignored() {
        let (source, _, _) = source(promises());
        assert!(source.mouse_dragged(LogicalPosition::new(50.0, 50.0)).is_none());
    }

    #[test]
    fn promises_are_registered_before_the_session_starts() {
        let (source, registry, _) = source(promises());
        source.mouse_down(LogicalPosition::new(10.0, 10.0));
        let items = source.mouse_dragged(LogicalPosition::new(20.0, 10.0)).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(registry.session_len("abc"), 2);
        for name in ["a.png", "b.png"] {
            assert_eq!(registry.find("abc", name).unwrap().state(), DeliveryState::AwaitingWrite);
        }
        assert!(matches!(
            &items[0].content,
            DraggingContent::FilePromise { file_type, .. } if file_type == "public.file-url"
        ));
        assert_eq!(items[0].origin, LogicalPosition::new(20.0, 10.0));
        assert_eq!(items[0].image, DragImage::Placeholder {
            label: "a.png".into(),
            size: LogicalSize::new(300.0, 40.0),
        });

        // The anchor is consumed: further movement belongs to the native session.
        assert!(source.mouse_dragged(LogicalPosition::new(40.0, 10.0)).is_none());
    }

    #[test]
    fn plain_items_become_markers() {
        let (source, registry, _) = source(vec![DragItem::Plain { name: "docs".into() }]);
        source.mouse_down(LogicalPosition::new(0.0, 0.0));
        let items = source.mouse_dragged(LogicalPosition::new(0.0, 5.0)).unwrap();

        assert!(registry.is_empty());
        assert!(matches!(
            &items[0].content,
            DraggingContent::Marker { name, marker_type } if name == "docs" && marker_type == "public.folder"
        ));
    }

    #[test]
    fn supplied_image_is_reused_for_every_item() {
        let channel = Arc::new(Recorder::default());
        let image: Arc<[u8]> = Arc::from(&b"png"[..]);
        let region = DraggableRegion {
            id: "abc".into(),
            frame: LogicalRect::new(0.0, 0.0, 120.0, 40.0),
            image: Some(image.clone()),
            items: promises(),
        };
        let source = DragSource::new(region, channel, Arc::default(), Default::default());
        source.mouse_down(LogicalPosition::new(0.0, 0.0));
        let items = source.mouse_dragged(LogicalPosition::new(5.0, 5.0)).unwrap();
        assert!(items.iter().all(|item| item.image == DragImage::Encoded(image.clone())));
    }

    #[test]
    fn lifecycle_events_are_flipped() {
        let (source, _, channel) = source(promises());
        source.session_began(LogicalPosition::new(10.0, 700.0), &SCREEN);
        source.session_moved(LogicalPosition::new(20.0, 600.0), &SCREEN);
        source.session_ended(LogicalPosition::new(30.0, 500.0), &SCREEN, None);

        assert_eq!(*channel.0.lock().unwrap(), [
            ChannelEvent::DraggingBegin { id: "abc".into(), position: [10.0, 100.0] },
            ChannelEvent::DraggingMoved { id: "abc".into(), position: [20.0, 200.0] },
            ChannelEvent::DraggingEnded { id: "abc".into(), position: [30.0, 300.0] },
        ]);
    }

    #[test]
    fn ending_inside_the_window_discards_promises() {
        let (source, registry, _) = source(promises());
        source.mouse_down(LogicalPosition::new(10.0, 10.0));
        let items = source.mouse_dragged(LogicalPosition::new(20.0, 10.0)).unwrap();

        source.session_ended(LogicalPosition::new(200.0, 200.0), &SCREEN, Some(&WINDOW));
        assert!(registry.is_empty());
        assert!(items.iter().all(|item| match &item.content {
            DraggingContent::FilePromise { task, .. } => task.state() == DeliveryState::Closed,
            DraggingContent::Marker { .. } => false,
        }));
    }

    #[test]
    fn ending_outside_the_window_keeps_promises() {
        let (source, registry, _) = source(promises());
        source.mouse_down(LogicalPosition::new(10.0, 10.0));
        source.mouse_dragged(LogicalPosition::new(20.0, 10.0)).unwrap();

        source.session_ended(LogicalPosition::new(700.0, 700.0), &SCREEN, Some(&WINDOW));
        assert_eq!(registry.session_len("abc"), 2);
    }

    #[test]
    fn long_drag_ending_outside_the_window_keeps_promises() {
        let channel = Arc::new(Recorder::default());
        let registry = Arc::new(TransferRegistry::new());
        let region = DraggableRegion {
            id: "abc".into(),
            frame: LogicalRect::new(0.0, 0.0, 120.0, 40.0),
            image: None,
            items: vec![DragItem::Promise { file_name: "a.png".into(), file_size: 10 }],
        };
        let attributes = BridgeAttributes::default().with_delivery_timeout(Some(Duration::from_millis(50)));
        let source = DragSource::new(region, channel, registry.clone(), Arc::new(attributes));

        source.mouse_down(LogicalPosition::new(10.0, 10.0));
        source.mouse_dragged(LogicalPosition::new(20.0, 10.0)).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        source.session_ended(LogicalPosition::new(700.0, 700.0), &SCREEN, Some(&WINDOW));

        assert_eq!(registry.session_len("abc"), 1);
        assert_eq!(registry.find("abc", "a.png").unwrap().state(), DeliveryState::AwaitingWrite);

        // Once dropped, the promise still expires if the OS never asks for it.
        std::thread::sleep(Duration::from_millis(120));
        let reaped = registry.reap_stalled(Duration::from_millis(50), Instant::now());
        assert_eq!(reaped.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn operation_mask_depends_on_context() {
        assert_eq!(source_operation_mask(DraggingContext::OutsideApplication), DragOperation::COPY);
        assert_eq!(source_operation_mask(DraggingContext::WithinApplication), DragOperation::MOVE);
        assert_eq!(source_operation_mask(DraggingContext::Other), DragOperation::GENERIC);
    }
}
