use std::time::Duration;

/// Tunables of a [`DragDropBridge`](crate::bridge::DragDropBridge).
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeAttributes {
    pub drag_trigger_offset: f64,
    pub placeholder_width: f64,
    pub promise_file_type: String,
    pub marker_type: String,
    pub delivery_timeout: Option<Duration>,
}

impl Default for BridgeAttributes {
    #[inline]
    fn default() -> Self {
        Self {
            drag_trigger_offset: 3.0,
            placeholder_width: 300.0,
            promise_file_type: "public.file-url".into(),
            marker_type: "public.folder".into(),
            delivery_timeout: None,
        }
    }
}

impl BridgeAttributes {
    /// Sets how far the pointer must travel, on either axis, before a press turns into a drag.
    ///
    /// The default is `3.0`.
    #[inline]
    pub fn with_drag_trigger_offset(mut self, offset: f64) -> Self {
        self.drag_trigger_offset = offset;
        self
    }

    /// Sets the width of generated placeholder drag images. Their height is the region's.
    ///
    /// The default is `300.0`.
    #[inline]
    pub fn with_placeholder_width(mut self, width: f64) -> Self {
        self.placeholder_width = width;
        self
    }

    /// Sets the type identifier advertised by file-promise providers.
    ///
    /// The default is `"public.file-url"`.
    #[inline]
    pub fn with_promise_file_type<T: Into<String>>(mut self, file_type: T) -> Self {
        self.promise_file_type = file_type.into();
        self
    }

    /// Sets the pasteboard type of plain items, which the drop region also accepts.
    ///
    /// The default is `"public.folder"`.
    #[inline]
    pub fn with_marker_type<T: Into<String>>(mut self, marker_type: T) -> Self {
        self.marker_type = marker_type.into();
        self
    }

    /// Sets how long a transfer may sit idle before it is force-closed and reported as failed.
    ///
    /// The default is `None`: transfers wait for the host application forever.
    #[inline]
    pub fn with_delivery_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.delivery_timeout = timeout;
        self
    }
}
