use std::sync::Arc;

use dragbridge_core::target::DropTarget;
use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2::{define_class, msg_send, DefinedClass, MainThreadMarker, MainThreadOnly};
use objc2_app_kit::{
    NSAutoresizingMaskOptions, NSDragOperation, NSDraggingDestination, NSDraggingInfo,
    NSResponder, NSView,
};
use objc2_foundation::{NSArray, NSObject, NSObjectProtocol, NSRect, NSString};
use tracing::trace;

use crate::util;

#[derive(Debug)]
pub struct DropTargetViewState {
    target: Arc<DropTarget>,
}

define_class!(
    #[unsafe(super(NSView, NSResponder, NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "DragBridgeDropTargetView"]
    #[ivars = DropTargetViewState]
    pub struct DropTargetView;

    unsafe impl NSObjectProtocol for DropTargetView {}

    unsafe impl NSDraggingDestination for DropTargetView {
        #[unsafe(method(draggingEntered:))]
        fn dragging_entered(&self, sender: &ProtocolObject<dyn NSDraggingInfo>) -> NSDragOperation {
            trace!("draggingEntered:");
            let point = self.convertPoint_fromView(sender.draggingLocation(), None);
            let operation = self.ivars().target.entered(util::position(point), &util::rect(self.bounds()));
            NSDragOperation::from_bits_retain(operation.bits() as _)
        }

        #[unsafe(method(draggingUpdated:))]
        fn dragging_updated(&self, sender: &ProtocolObject<dyn NSDraggingInfo>) -> NSDragOperation {
            let point = self.convertPoint_fromView(sender.draggingLocation(), None);
            let operation = self.ivars().target.updated(util::position(point), &util::rect(self.bounds()));
            NSDragOperation::from_bits_retain(operation.bits() as _)
        }

        #[unsafe(method(draggingExited:))]
        fn dragging_exited(&self, _sender: Option<&ProtocolObject<dyn NSDraggingInfo>>) {
            trace!("draggingExited:");
            self.ivars().target.exited();
        }

        #[unsafe(method(performDragOperation:))]
        fn perform_drag_operation(&self, _sender: &ProtocolObject<dyn NSDraggingInfo>) -> bool {
            trace!("performDragOperation:");
            self.ivars().target.perform()
        }
    }
);

impl DropTargetView {
    /// A view over `frame` that registers for the target's types and resizes with its superview.
    pub fn new(mtm: MainThreadMarker, target: Arc<DropTarget>, frame: NSRect) -> Retained<Self> {
        let types: Vec<_> = target.accepted_types().iter().map(|ty| NSString::from_str(ty)).collect();
        let this = Self::alloc(mtm).set_ivars(DropTargetViewState { target });
        let this: Retained<Self> = unsafe { msg_send![super(this), initWithFrame: frame] };

        this.registerForDraggedTypes(&NSArray::from_retained_slice(&types));
        this.setAutoresizingMask(
            NSAutoresizingMaskOptions::ViewWidthSizable | NSAutoresizingMaskOptions::ViewHeightSizable,
        );
        this
    }

    pub fn target(&self) -> &Arc<DropTarget> {
        &self.ivars().target
    }
}
