//! Progress reporting for file-promise transfers.
//!
//! While a promised file is being written the OS shows a progress indicator at the destination.
//! Backends publish that indicator through [`ProgressPublisher`]; the delivery task keeps the
//! counter within bounds before forwarding it.

use tracing::trace;

/// Creates the platform progress object of one transfer.
pub trait ProgressPublisher: Send {
    /// Publish a progress object counting up to `total_units`.
    fn publish(self: Box<Self>, total_units: u64) -> Box<dyn PublishedProgress>;
}

/// A published progress object.
pub trait PublishedProgress: Send {
    fn set_completed(&mut self, units: u64);

    /// Withdraw the progress object. Called exactly once per published object.
    fn unpublish(&mut self);
}

/// Progress reporting for platforms that have none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressPublisher for NoopProgress {
    fn publish(self: Box<Self>, _total_units: u64) -> Box<dyn PublishedProgress> {
        self
    }
}

impl PublishedProgress for NoopProgress {
    fn set_completed(&mut self, _units: u64) {}

    fn unpublish(&mut self) {}
}

/// The bounded counter behind a published progress object.
///
/// The completed count never exceeds the total and never goes backwards.
pub(crate) struct FileProgress {
    total: u64,
    completed: u64,
    published: Box<dyn PublishedProgress>,
}

impl FileProgress {
    pub(crate) fn publish(publisher: Box<dyn ProgressPublisher>, total: u64) -> Self {
        FileProgress { total, completed: 0, published: publisher.publish(total) }
    }

    pub(crate) fn completed(&self) -> u64 {
        self.completed
    }

    /// Report `count` completed units and return the value now reported.
    pub(crate) fn update(&mut self, count: u64) -> u64 {
        let count = count.min(self.total);
        if count < self.completed {
            trace!(count, completed = self.completed, "ignoring progress going backwards");
            return self.completed;
        }
        self.completed = count;
        self.published.set_completed(count);
        count
    }

    pub(crate) fn unpublish(mut self) {
        self.published.unpublish();
    }
}
