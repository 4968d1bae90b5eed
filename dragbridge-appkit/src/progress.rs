use dragbridge_core::progress::{ProgressPublisher, PublishedProgress};
use objc2::rc::Retained;
use objc2::Message;
use objc2_foundation::{
    NSProgress, NSProgressFileOperationKindDownloading, NSProgressKindFile, NSURL,
};
use tracing::trace;

/// Publishes the progress of a promised file to the Finder, attached to the destination URL.
#[derive(Debug)]
pub struct FileProgressPublisher {
    url: Retained<NSURL>,
}

// SAFETY: `NSURL` is immutable.
unsafe impl Send for FileProgressPublisher {}

impl FileProgressPublisher {
    pub fn new(url: &NSURL) -> Self {
        FileProgressPublisher { url: url.retain() }
    }
}

impl ProgressPublisher for FileProgressPublisher {
    fn publish(self: Box<Self>, total_units: u64) -> Box<dyn PublishedProgress> {
        let progress = NSProgress::discreteProgressWithTotalUnitCount(units(total_units));
        // SAFETY: The kind constants are valid for the lifetime of the program.
        unsafe {
            progress.setKind(Some(NSProgressKindFile));
            progress.setFileOperationKind(Some(NSProgressFileOperationKindDownloading));
        }
        progress.setFileURL(Some(&self.url));
        progress.setCancellable(false);
        progress.setPausable(false);
        progress.publish();
        trace!(total_units, "published progress");

        Box::new(FileProgress(progress))
    }
}

struct FileProgress(Retained<NSProgress>);

// SAFETY: `NSProgress` is thread-safe.
unsafe impl Send for FileProgress {}

impl PublishedProgress for FileProgress {
    fn set_completed(&mut self, units_done: u64) {
        self.0.setCompletedUnitCount(units(units_done));
    }

    fn unpublish(&mut self) {
        self.0.unpublish();
    }
}

fn units(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
