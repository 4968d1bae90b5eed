//! What a draggable region carries.

use std::collections::HashSet;
use std::sync::Arc;

use dpi::LogicalSize;

use crate::error::BridgeError;

/// One item of a drag gesture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DragItem {
    /// A named item. The drop target resolves it through the host application; the pasteboard
    /// only carries an empty marker.
    Plain { name: String },
    /// A file whose bytes are produced on demand once the OS picks a destination.
    Promise { file_name: String, file_size: u64 },
}

impl DragItem {
    /// The text shown on the placeholder drag image.
    pub fn label(&self) -> &str {
        match self {
            DragItem::Plain { name } => name,
            DragItem::Promise { file_name, .. } => file_name,
        }
    }

    pub fn is_promise(&self) -> bool {
        matches!(self, DragItem::Promise { .. })
    }
}

/// Build the item list of a region.
///
/// A gesture is homogeneous: file promises when both `file_names` and `file_sizes` are given,
/// plain names otherwise.
pub fn items_from_request(
    names: Vec<String>,
    file_names: Option<Vec<String>>,
    file_sizes: Option<Vec<u64>>,
) -> Result<Vec<DragItem>, BridgeError> {
    const METHOD: &str = "setDraggableView";

    match (file_names, file_sizes) {
        (Some(file_names), Some(file_sizes)) => {
            if file_names.len() != file_sizes.len() {
                return Err(BridgeError::invalid(
                    METHOD,
                    format_args!(
                        "{} file names but {} file sizes",
                        file_names.len(),
                        file_sizes.len()
                    ),
                ));
            }
            let mut seen = HashSet::with_capacity(file_names.len());
            if let Some(duplicate) = file_names.iter().find(|name| !seen.insert(name.as_str())) {
                return Err(BridgeError::invalid(METHOD, format_args!("duplicate file name `{duplicate}`")));
            }
            Ok(file_names
                .into_iter()
                .zip(file_sizes)
                .map(|(file_name, file_size)| DragItem::Promise { file_name, file_size })
                .collect())
        },
        (None, None) => Ok(names.into_iter().map(|name| DragItem::Plain { name }).collect()),
        (Some(_), None) => Err(BridgeError::invalid(METHOD, "`fileNames` given without `fileSizes`")),
        (None, Some(_)) => Err(BridgeError::invalid(METHOD, "`fileSizes` given without `fileNames`")),
    }
}

/// The image shown under the pointer while dragging.
#[derive(Debug, Clone, PartialEq)]
pub enum DragImage {
    /// Encoded image bytes supplied by the host application, decoded by the backend.
    Encoded(Arc<[u8]>),
    /// A generated image showing `label`.
    Placeholder { label: String, size: LogicalSize<f64> },
}
