//! Routing of host application requests.
//!
//! [`DragDropBridge`] owns everything one window needs: the draggable regions, the drop region
//! and the [`TransferRegistry`] they share. Requests arrive as [`MethodCall`]s; each is validated
//! in full before any state is touched, so a rejected request leaves the bridge as it was.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, trace_span, warn};

use crate::attributes::BridgeAttributes;
use crate::channel::{EventChannel, MethodCall};
use crate::coords;
use crate::error::BridgeError;
use crate::host::ViewHost;
use crate::item::items_from_request;
use crate::registry::TransferRegistry;
use crate::source::{DragSource, DraggableRegion};
use crate::target::DropTarget;
use crate::task::{FeedOutcome, FileStreamStatus};

/// Arguments of `setDraggableView`. Geometry is in the host's top-left-origin space.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDraggableView {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub file_names: Option<Vec<String>>,
    #[serde(default)]
    pub file_sizes: Option<Vec<u64>>,
    #[serde(default)]
    pub image: Option<Vec<u8>>,
}

/// Arguments of `removeDraggableView`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoveDraggableView {
    pub id: String,
}

/// Arguments of `feedFileStream`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedFileStream {
    pub id: String,
    pub file_name: String,
    pub status: FileStreamStatus,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
}

/// Arguments of `updateProgress`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgress {
    pub id: String,
    pub file_name: String,
    pub count: u64,
}

/// The drag-and-drop bridge of one window.
#[derive(Debug)]
pub struct DragDropBridge<H: ViewHost> {
    host: H,
    channel: Arc<dyn EventChannel>,
    registry: Arc<TransferRegistry>,
    attributes: Arc<BridgeAttributes>,
    draggables: HashMap<String, Arc<DragSource>>,
    drop_target: Option<Arc<DropTarget>>,
}

impl<H: ViewHost> DragDropBridge<H> {
    pub fn new(host: H, channel: Arc<dyn EventChannel>, attributes: BridgeAttributes) -> Self {
        DragDropBridge {
            host,
            channel,
            registry: Arc::new(TransferRegistry::new()),
            attributes: Arc::new(attributes),
            draggables: HashMap::new(),
            drop_target: None,
        }
    }

    /// Dispatch a request from the host application.
    pub fn handle(&mut self, call: &MethodCall) -> Result<(), BridgeError> {
        let _span = trace_span!("handle", method = %call.method).entered();
        self.reap_stalled_transfers();

        match call.method.as_str() {
            "setDraggableView" => self.set_draggable_view(call.decode("setDraggableView")?),
            "removeDraggableView" => self.remove_draggable_view(call.decode("removeDraggableView")?),
            "feedFileStream" => self.feed_file_stream(call.decode("feedFileStream")?),
            "updateProgress" => self.update_progress(call.decode("updateProgress")?),
            method => {
                warn!(method, "unknown method");
                Err(BridgeError::NotImplemented(method.to_owned()))
            },
        }
    }

    /// Define or replace the draggable region `request.id`.
    ///
    /// The first region also installs the drop region.
    pub fn set_draggable_view(&mut self, request: SetDraggableView) -> Result<(), BridgeError> {
        const METHOD: &str = "setDraggableView";

        let SetDraggableView { id, x, y, width, height, names, file_names, file_sizes, image } = request;
        if [x, y, width, height].iter().any(|value| !value.is_finite()) || width < 0.0 || height < 0.0 {
            return Err(BridgeError::invalid(
                METHOD,
                format_args!("bad geometry {width}x{height} at ({x}, {y})"),
            ));
        }
        let items = items_from_request(names, file_names, file_sizes)?;
        let bounds = self.host.content_bounds().ok_or(BridgeError::Unavailable("no content view"))?;
        let frame = coords::region_from_channel(x, y, width, height, &bounds);

        if self.drop_target.is_none() {
            let accepted = self
                .host
                .promise_receiver_types()
                .into_iter()
                .chain([self.attributes.marker_type.clone()]);
            let target = Arc::new(DropTarget::new(self.channel.clone(), accepted));
            self.host.install_drop_target(target.clone());
            self.drop_target = Some(target);
            debug!("installed drop target");
        }

        if self.draggables.remove(&id).is_some() {
            self.host.remove_draggable(&id);
        }
        let region = DraggableRegion { id: id.clone(), frame, image: image.map(Arc::from), items };
        let source = Arc::new(DragSource::new(
            region,
            self.channel.clone(),
            self.registry.clone(),
            self.attributes.clone(),
        ));
        self.host.insert_draggable(source.clone());
        self.draggables.insert(id, source);
        Ok(())
    }

    /// Remove a draggable region. Transfers already started from it continue.
    pub fn remove_draggable_view(&mut self, request: RemoveDraggableView) -> Result<(), BridgeError> {
        if self.draggables.remove(&request.id).is_some() {
            self.host.remove_draggable(&request.id);
            debug!(id = %request.id, "removed draggable region");
        }
        Ok(())
    }

    /// Feed the next chunk of a promised file, or end its stream.
    ///
    /// An ended stream is removed from the registry, whatever state its task was in.
    pub fn feed_file_stream(&mut self, request: FeedFileStream) -> Result<(), BridgeError> {
        let FeedFileStream { id, file_name, status, data } = request;
        let task = self.registry.find(&id, &file_name)?;
        let result = task.feed(data.as_deref(), status);

        let removed = match status {
            FileStreamStatus::Ended => {
                if let Ok(FeedOutcome::Dropped) = result {
                    // The OS has not asked for the file yet; it must not be written later.
                    task.abandon();
                }
                self.registry.remove_completed(&id, &file_name).map(drop)
            },
            FileStreamStatus::Writing => Ok(()),
        };
        // A failed write outranks a missing registry entry.
        result?;
        removed?;
        Ok(())
    }

    /// Report how many bytes of a promised file have been produced.
    ///
    /// Ignored until the OS has asked for the file.
    pub fn update_progress(&mut self, request: UpdateProgress) -> Result<(), BridgeError> {
        let task = self.registry.find(&request.id, &request.file_name)?;
        task.update_progress(request.count);
        Ok(())
    }

    /// Remove the drop region. The next `setDraggableView` installs a new one.
    pub fn teardown_drop_target(&mut self) {
        if self.drop_target.take().is_some() {
            self.host.remove_drop_target();
            debug!("removed drop target");
        }
    }

    /// Force-close transfers idle for longer than the delivery timeout, if one is set.
    ///
    /// Runs on every request; hosts may also call it from a timer. Returns how many were closed.
    pub fn reap_stalled_transfers(&self) -> usize {
        match self.attributes.delivery_timeout {
            Some(timeout) => self.registry.reap_stalled(timeout, Instant::now()).len(),
            None => 0,
        }
    }

    pub fn registry(&self) -> &Arc<TransferRegistry> {
        &self.registry
    }

    pub fn attributes(&self) -> &BridgeAttributes {
        &self.attributes
    }

    pub fn has_drop_target(&self) -> bool {
        self.drop_target.is_some()
    }

    pub fn drop_target(&self) -> Option<&Arc<DropTarget>> {
        self.drop_target.as_ref()
    }

    pub fn draggable(&self, id: &str) -> Option<&Arc<DragSource>> {
        self.draggables.get(id)
    }

    /// Ids of the current draggable regions, sorted.
    pub fn draggable_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.draggables.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use dpi::LogicalPosition;
    use serde_json::json;

    use super::*;
    use crate::channel::ChannelEvent;
    use crate::coords::LogicalRect;
    use crate::sink::ByteSink;
    use crate::task::{DeliveryState, DeliveryTask, WriteCompletion, WriteRequest};

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<ChannelEvent>>);

    impl EventChannel for Recorder {
        fn invoke(&self, event: ChannelEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[derive(Debug, Default)]
    struct Host {
        bounds: Option<LogicalRect>,
        views: Vec<(String, LogicalRect)>,
        drop_target: Option<Arc<DropTarget>>,
    }

    impl ViewHost for Host {
        fn content_bounds(&self) -> Option<LogicalRect> {
            self.bounds
        }

        fn insert_draggable(&mut self, source: Arc<DragSource>) {
            self.views.push((source.id().to_owned(), source.frame()));
        }

        fn remove_draggable(&mut self, id: &str) {
            self.views.retain(|(view, _)| view != id);
        }

        fn install_drop_target(&mut self, target: Arc<DropTarget>) {
            self.drop_target = Some(target);
        }

        fn remove_drop_target(&mut self) {
            self.drop_target = None;
        }
    }

    fn bridge() -> DragDropBridge<Host> {
        let host = Host { bounds: Some(LogicalRect::new(0.0, 0.0, 800.0, 600.0)), ..Default::default() };
        DragDropBridge::new(host, Arc::new(Recorder::default()), BridgeAttributes::default())
    }

    fn set_view(id: &str) -> MethodCall {
        MethodCall::new(
            "setDraggableView",
            json!({ "id": id, "x": 10.0, "y": 20.0, "width": 100.0, "height": 50.0, "names": ["docs"] }),
        )
    }

    #[test]
    fn first_region_installs_the_drop_target() {
        let mut bridge = bridge();
        assert!(!bridge.has_drop_target());

        bridge.handle(&set_view("a")).unwrap();
        let target = bridge.drop_target().unwrap().clone();
        assert_eq!(target.accepted_types(), ["public.folder"]);

        bridge.handle(&set_view("b")).unwrap();
        assert!(Arc::ptr_eq(bridge.drop_target().unwrap(), &target));
        assert_eq!(bridge.draggable_ids(), ["a", "b"]);
    }

    #[test]
    fn region_frame_is_flipped_into_the_content_view() {
        let mut bridge = bridge();
        bridge.handle(&set_view("a")).unwrap();
        assert_eq!(bridge.host().views, [("a".to_owned(), LogicalRect::new(10.0, 530.0, 100.0, 50.0))]);
    }

    #[test]
    fn setting_a_region_twice_replaces_it() {
        let mut bridge = bridge();
        bridge.handle(&set_view("a")).unwrap();
        bridge.handle(&set_view("a")).unwrap();
        assert_eq!(bridge.host().views.len(), 1);
        assert_eq!(bridge.draggable_ids(), ["a"]);
    }

    #[test]
    fn invalid_requests_change_nothing() {
        let mut bridge = bridge();
        let call = MethodCall::new(
            "setDraggableView",
            json!({ "id": "a", "x": 0, "y": 0, "width": 1, "height": 1, "fileNames": ["x"] }),
        );
        assert_eq!(bridge.handle(&call).unwrap_err().code(), "missingOrInvalidArg");

        let call = MethodCall::new("setDraggableView", json!({ "id": "a", "x": 0 }));
        assert_eq!(bridge.handle(&call).unwrap_err().code(), "missingOrInvalidArg");

        let call = MethodCall::new(
            "setDraggableView",
            json!({ "id": "a", "x": 0, "y": 0, "width": -1, "height": 1 }),
        );
        assert_eq!(bridge.handle(&call).unwrap_err().code(), "missingOrInvalidArg");

        assert!(!bridge.has_drop_target());
        assert!(bridge.draggable_ids().is_empty());
    }

    #[test]
    fn missing_content_view_is_unavailable() {
        let mut bridge = DragDropBridge::new(Host::default(), Arc::new(Recorder::default()), Default::default());
        assert_eq!(bridge.handle(&set_view("a")).unwrap_err().code(), "unavailable");
        assert!(!bridge.has_drop_target());
    }

    #[test]
    fn removing_a_region() {
        let mut bridge = bridge();
        bridge.handle(&set_view("a")).unwrap();
        bridge.handle(&MethodCall::new("removeDraggableView", json!({ "id": "a" }))).unwrap();
        bridge.handle(&MethodCall::new("removeDraggableView", json!({ "id": "a" }))).unwrap();
        assert!(bridge.host().views.is_empty());
        assert!(bridge.has_drop_target());
    }

    #[test]
    fn unknown_methods_are_not_implemented() {
        let mut bridge = bridge();
        let error = bridge.handle(&MethodCall::new("shake", json!(null))).unwrap_err();
        assert_eq!(error.code(), "notImplemented");
    }

    #[test]
    fn feeding_an_unknown_transfer_is_not_found() {
        let mut bridge = bridge();
        let call = MethodCall::new(
            "feedFileStream",
            json!({ "id": "a", "fileName": "x", "status": "kWriting", "data": [1, 2] }),
        );
        assert_eq!(bridge.handle(&call).unwrap_err().code(), "notFound");
        let call = MethodCall::new("updateProgress", json!({ "id": "a", "fileName": "x", "count": 1 }));
        assert_eq!(bridge.handle(&call).unwrap_err().code(), "notFound");
    }

    #[test]
    fn ending_a_stream_the_os_never_asked_for_closes_it() {
        let (mut bridge, task) = dragged_promise();
        bridge.handle(&feed("kEnded", None)).unwrap();
        assert!(bridge.registry().is_empty());
        assert_eq!(task.state(), DeliveryState::Closed);
    }

    #[derive(Debug, Default)]
    struct MemorySink {
        bytes: Arc<Mutex<Vec<u8>>>,
        fail_close: bool,
    }

    impl ByteSink for MemorySink {
        fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
            self.bytes.lock().unwrap().extend_from_slice(chunk);
            Ok(())
        }

        fn close(&mut self) -> io::Result<()> {
            if self.fail_close {
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            } else {
                Ok(())
            }
        }
    }

    /// A bridge with one promised file `x.bin` under region `a`, dragged but not yet written.
    fn dragged_promise() -> (DragDropBridge<Host>, Arc<DeliveryTask>) {
        let mut bridge = bridge();
        bridge
            .handle(&MethodCall::new(
                "setDraggableView",
                json!({
                    "id": "a", "x": 0, "y": 0, "width": 10, "height": 10,
                    "names": [], "fileNames": ["x.bin"], "fileSizes": [4],
                }),
            ))
            .unwrap();
        let source = bridge.draggable("a").unwrap().clone();
        source.mouse_down(LogicalPosition::new(1.0, 1.0));
        source.mouse_dragged(LogicalPosition::new(9.0, 1.0)).unwrap();
        let task = bridge.registry().find("a", "x.bin").unwrap();
        (bridge, task)
    }

    fn feed(status: &str, data: Option<&[u8]>) -> MethodCall {
        MethodCall::new(
            "feedFileStream",
            json!({ "id": "a", "fileName": "x.bin", "status": status, "data": data }),
        )
    }

    #[test]
    fn unknown_stream_status_is_rejected_without_side_effects() {
        let (mut bridge, task) = dragged_promise();
        let sink = MemorySink::default();
        let bytes = sink.bytes.clone();
        let request = WriteRequest::new("/tmp/x.bin", "file:///tmp/x.bin", WriteCompletion::new(|_| {}))
            .with_sink(Box::new(sink));
        task.begin_write(request).unwrap();
        bridge.handle(&feed("kWriting", Some(&[1, 2]))).unwrap();

        let error = bridge.handle(&feed("kPaused", Some(&[3]))).unwrap_err();
        assert_eq!(error.code(), "missingOrInvalidArg");
        assert_eq!(task.state(), DeliveryState::Streaming);
        assert_eq!(*bytes.lock().unwrap(), [1, 2]);
        assert!(bridge.registry().contains("a", "x.bin"));
    }

    #[test]
    fn write_failure_is_reported_even_if_the_transfer_is_gone() {
        let (mut bridge, task) = dragged_promise();
        let registry = bridge.registry().clone();
        let sink = MemorySink { fail_close: true, ..Default::default() };
        let completion = WriteCompletion::new(move |_| {
            registry.discard("a");
        });
        let request = WriteRequest::new("/tmp/x.bin", "file:///tmp/x.bin", completion).with_sink(Box::new(sink));
        task.begin_write(request).unwrap();

        let error = bridge.handle(&feed("kEnded", None)).unwrap_err();
        assert_eq!(error.code(), "writeFailure");
        assert!(bridge.registry().is_empty());
    }

    #[test]
    fn teardown_removes_the_drop_target() {
        let mut bridge = bridge();
        bridge.handle(&set_view("a")).unwrap();
        bridge.teardown_drop_target();
        assert!(!bridge.has_drop_target());
        assert!(bridge.host().drop_target.is_none());

        bridge.handle(&set_view("b")).unwrap();
        assert!(bridge.has_drop_target());
    }
}
