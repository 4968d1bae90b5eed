use std::sync::Arc;

use dpi::LogicalPosition;
use dragbridge_core::coords::LogicalRect;
use dragbridge_core::item::DragImage;
use dragbridge_core::source::{DragSource, DraggingContent, DraggingContext, DraggingItem};
use objc2::rc::Retained;
use objc2::runtime::{AnyObject, ProtocolObject};
use objc2::{define_class, msg_send, AllocAnyThread, DefinedClass, MainThreadMarker, MainThreadOnly};
use objc2_app_kit::{
    NSApplication, NSColor, NSDragOperation, NSDraggingContext, NSDraggingItem, NSDraggingSession,
    NSDraggingSource, NSEvent, NSImage, NSPasteboardItem, NSPasteboardWriting, NSRectFill,
    NSResponder, NSScreen, NSStringDrawing, NSView,
};
use objc2_foundation::{NSArray, NSData, NSObject, NSObjectProtocol, NSPoint, NSRect, NSSize, NSString};
use tracing::{trace, warn};

use crate::promise::FilePromiseDelegate;
use crate::util;

#[derive(Debug)]
pub struct DraggableViewState {
    source: Arc<DragSource>,
}

define_class!(
    #[unsafe(super(NSView, NSResponder, NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "DragBridgeDraggableView"]
    #[ivars = DraggableViewState]
    pub struct DraggableView;

    unsafe impl NSObjectProtocol for DraggableView {}

    impl DraggableView {
        #[unsafe(method(mouseDown:))]
        fn mouse_down(&self, event: &NSEvent) {
            trace!("mouseDown:");
            self.ivars().source.mouse_down(self.local_position(event));
        }

        #[unsafe(method(mouseDragged:))]
        fn mouse_dragged(&self, event: &NSEvent) {
            let Some(items) = self.ivars().source.mouse_dragged(self.local_position(event)) else {
                return;
            };
            let items: Vec<_> = items.iter().map(dragging_item).collect();
            let items = NSArray::from_retained_slice(&items);
            self.beginDraggingSessionWithItems_event_source(&items, event, ProtocolObject::from_ref(self));
        }

        #[unsafe(method(acceptsFirstMouse:))]
        fn accepts_first_mouse(&self, _event: Option<&NSEvent>) -> bool {
            true
        }
    }

    unsafe impl NSDraggingSource for DraggableView {
        #[unsafe(method(draggingSession:sourceOperationMaskForDraggingContext:))]
        fn source_operation_mask(
            &self,
            _session: &NSDraggingSession,
            context: NSDraggingContext,
        ) -> NSDragOperation {
            let context = match context {
                NSDraggingContext::OutsideApplication => DraggingContext::OutsideApplication,
                NSDraggingContext::WithinApplication => DraggingContext::WithinApplication,
                _ => DraggingContext::Other,
            };
            let mask = self.ivars().source.operation_mask(context);
            NSDragOperation::from_bits_retain(mask.bits() as _)
        }

        #[unsafe(method(draggingSession:willBeginAtPoint:))]
        fn will_begin(&self, _session: &NSDraggingSession, screen_point: NSPoint) {
            self.ivars().source.session_began(util::position(screen_point), &self.screen_frame());
        }

        #[unsafe(method(draggingSession:movedToPoint:))]
        fn moved(&self, _session: &NSDraggingSession, screen_point: NSPoint) {
            self.ivars().source.session_moved(util::position(screen_point), &self.screen_frame());
        }

        #[unsafe(method(draggingSession:endedAtPoint:operation:))]
        fn ended(&self, _session: &NSDraggingSession, screen_point: NSPoint, _operation: NSDragOperation) {
            let main_window = NSApplication::sharedApplication(self.mtm())
                .mainWindow()
                .map(|window| util::rect(window.frame()));
            self.ivars().source.session_ended(
                util::position(screen_point),
                &self.screen_frame(),
                main_window.as_ref(),
            );
        }
    }
);

impl DraggableView {
    pub fn new(mtm: MainThreadMarker, source: Arc<DragSource>) -> Retained<Self> {
        let frame = util::ns_rect(source.frame());
        let this = Self::alloc(mtm).set_ivars(DraggableViewState { source });
        unsafe { msg_send![super(this), initWithFrame: frame] }
    }

    pub fn source(&self) -> &Arc<DragSource> {
        &self.ivars().source
    }

    fn local_position(&self, event: &NSEvent) -> LogicalPosition<f64> {
        util::position(self.convertPoint_fromView(event.locationInWindow(), None))
    }

    /// Frame of the screen the view is on, which drag session points are relative to.
    fn screen_frame(&self) -> LogicalRect {
        self.window()
            .and_then(|window| window.screen())
            .or_else(|| NSScreen::mainScreen(self.mtm()))
            .map(|screen| util::rect(screen.frame()))
            .unwrap_or_default()
    }
}

fn dragging_item(item: &DraggingItem) -> Retained<NSDraggingItem> {
    let writer: Retained<ProtocolObject<dyn NSPasteboardWriting>> = match &item.content {
        DraggingContent::FilePromise { task, file_type } => {
            ProtocolObject::from_retained(FilePromiseDelegate::provider(task.clone(), file_type))
        },
        DraggingContent::Marker { name, marker_type } => {
            let marker = NSPasteboardItem::new();
            if !marker.setData_forType(&NSData::new(), &NSString::from_str(marker_type)) {
                warn!(name = %name, marker_type = %marker_type, "failed to set marker data");
            }
            ProtocolObject::from_retained(marker)
        },
    };

    let dragging_item = NSDraggingItem::initWithPasteboardWriter(NSDraggingItem::alloc(), &writer);
    let image = drag_image(&item.image);
    let frame = NSRect::new(util::ns_point(item.origin), image.size());
    let contents: &AnyObject = &image;
    // SAFETY: Dragging contents may be any image.
    unsafe { dragging_item.setDraggingFrame_contents(frame, Some(contents)) };
    dragging_item
}

fn drag_image(image: &DragImage) -> Retained<NSImage> {
    match image {
        DragImage::Encoded(bytes) => {
            let data = NSData::with_bytes(bytes);
            match NSImage::initWithData(NSImage::alloc(), &data) {
                Some(image) => image,
                None => {
                    warn!(len = bytes.len(), "undecodable drag image, using a blank one");
                    NSImage::new()
                },
            }
        },
        DragImage::Placeholder { label, size } => placeholder(label, util::ns_size(*size)),
    }
}

/// A white image of `size` with `label` centered in black.
#[allow(deprecated)]
fn placeholder(label: &str, size: NSSize) -> Retained<NSImage> {
    let image = NSImage::initWithSize(NSImage::alloc(), size);
    let label = NSString::from_str(label);

    image.lockFocus();
    // SAFETY: Drawing happens between `lockFocus` and `unlockFocus`. No attributes are passed,
    // so the default font and color are used.
    unsafe {
        NSColor::whiteColor().set();
        NSRectFill(NSRect::new(NSPoint::new(0.0, 0.0), size));
        let text = label.sizeWithAttributes(None);
        let origin = NSPoint::new(
            (size.width - text.width) / 2.0,
            (size.height - text.height) / 2.0,
        );
        label.drawAtPoint_withAttributes(origin, None);
    }
    image.unlockFocus();

    image
}
