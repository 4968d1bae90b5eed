//! Delivery of a single promised file.
//!
//! A [`DeliveryTask`] is created for every file-promise item of a drag gesture. It moves through
//! the following states:
//!
//! ```text
//! Created ──> AwaitingWrite ──> Streaming ──> Closed
//!    │              │                            ▲
//!    └──────────────┴────── abandon / expire ────┘
//! ```
//!
//! - **Created**: constructed with its identity and expected size.
//! - **AwaitingWrite**: registered and handed to the native drag session; waiting for the OS to
//!   pick a destination.
//! - **Streaming**: the OS asked for the file ([`DeliveryTask::begin_write`]). The destination
//!   sink is open, progress is published and the host application has been asked to feed bytes.
//! - **Closed**: the host fed `kEnded`, the write failed, or the task was abandoned. Terminal.
//!
//! Chunks fed before the task is streaming are dropped: the host may race ahead of the OS.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use std::{fmt, mem};

use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::channel::{ChannelEvent, EventChannel};
use crate::error::WriteError;
use crate::progress::{FileProgress, NoopProgress, ProgressPublisher};
use crate::sink::{ByteSink, FileSink};
use crate::util::lock;

/// Status attached to every chunk fed by the host application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
pub enum FileStreamStatus {
    /// More bytes follow.
    #[serde(rename = "kWriting")]
    Writing,
    /// The stream is complete.
    #[serde(rename = "kEnded")]
    Ended,
}

/// The observable state of a [`DeliveryTask`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryState {
    Created,
    AwaitingWrite,
    Streaming,
    Closed,
}

/// What happened to a fed chunk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The task was not streaming; the chunk was discarded.
    Dropped,
    /// The chunk was appended to the destination.
    Appended(usize),
    /// The stream ended and the OS was told the write completed.
    Closed,
}

/// Reports the outcome of a file-promise write to the OS. Invoked at most once.
pub struct WriteCompletion(Box<dyn FnOnce(Result<(), WriteError>) + Send>);

impl WriteCompletion {
    pub fn new(callback: impl FnOnce(Result<(), WriteError>) + Send + 'static) -> Self {
        WriteCompletion(Box::new(callback))
    }

    fn complete(self, result: Result<(), WriteError>) {
        (self.0)(result)
    }
}

impl fmt::Debug for WriteCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("WriteCompletion")
    }
}

/// The OS request to write a promised file to a chosen destination.
///
/// By default the destination is opened as a [`FileSink`] and progress is not reported;
/// backends attach their own pieces with [`with_sink`][Self::with_sink] and
/// [`with_progress`][Self::with_progress].
pub struct WriteRequest {
    destination: PathBuf,
    url: String,
    sink: Option<Box<dyn ByteSink>>,
    progress: Box<dyn ProgressPublisher>,
    completion: WriteCompletion,
}

impl WriteRequest {
    /// `url` is what the host application is told about; it usually is the `file://` form of
    /// `destination`.
    pub fn new(destination: impl Into<PathBuf>, url: impl Into<String>, completion: WriteCompletion) -> Self {
        WriteRequest {
            destination: destination.into(),
            url: url.into(),
            sink: None,
            progress: Box::new(NoopProgress),
            completion,
        }
    }

    /// Write into `sink` instead of opening the destination path.
    #[inline]
    pub fn with_sink(mut self, sink: Box<dyn ByteSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Report progress through `publisher`.
    #[inline]
    pub fn with_progress(mut self, publisher: Box<dyn ProgressPublisher>) -> Self {
        self.progress = publisher;
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for WriteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRequest")
            .field("destination", &self.destination)
            .field("url", &self.url)
            .field("custom_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

/// The open destination of a streaming task.
struct Stream {
    sink: Box<dyn ByteSink>,
    progress: FileProgress,
    completion: WriteCompletion,
}

impl Stream {
    /// Close the sink and report success, or the close error.
    fn finish(mut self) -> Result<(), WriteError> {
        let result = self.sink.close();
        self.progress.unpublish();
        match result {
            Ok(()) => {
                self.completion.complete(Ok(()));
                Ok(())
            },
            Err(error) => {
                self.completion.complete(Err(WriteError::Io(io_copy(&error))));
                Err(WriteError::Io(error))
            },
        }
    }

    /// Report `error` without closing the sink.
    fn fail(self, error: WriteError) {
        self.progress.unpublish();
        self.completion.complete(Err(error));
        // The sink is dropped here, unclosed. The OS cleans up the partial file.
    }
}

enum Stage {
    Created,
    AwaitingWrite,
    Streaming(Stream),
    Closed,
}

impl Stage {
    fn state(&self) -> DeliveryState {
        match self {
            Stage::Created => DeliveryState::Created,
            Stage::AwaitingWrite => DeliveryState::AwaitingWrite,
            Stage::Streaming(_) => DeliveryState::Streaming,
            Stage::Closed => DeliveryState::Closed,
        }
    }
}

struct Inner {
    stage: Stage,
    last_activity: Instant,
}

impl Inner {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Move to `Closed`, handing back the stream if one was open.
    fn close(&mut self) -> Option<Stream> {
        self.touch();
        match mem::replace(&mut self.stage, Stage::Closed) {
            Stage::Streaming(stream) => Some(stream),
            _ => None,
        }
    }
}

/// One promised file transfer, keyed by drag session and file name.
pub struct DeliveryTask {
    session_id: String,
    file_name: String,
    expected_size: u64,
    channel: Arc<dyn EventChannel>,
    inner: Mutex<Inner>,
}

impl DeliveryTask {
    pub fn new(
        session_id: impl Into<String>,
        file_name: impl Into<String>,
        expected_size: u64,
        channel: Arc<dyn EventChannel>,
    ) -> Self {
        DeliveryTask {
            session_id: session_id.into(),
            file_name: file_name.into(),
            expected_size,
            channel,
            inner: Mutex::new(Inner { stage: Stage::Created, last_activity: Instant::now() }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Total number of bytes the host announced. Only used to scale progress.
    pub fn expected_size(&self) -> u64 {
        self.expected_size
    }

    pub fn state(&self) -> DeliveryState {
        lock(&self.inner).stage.state()
    }

    /// The progress currently reported, or `None` if no progress is published.
    pub fn progress(&self) -> Option<u64> {
        match &lock(&self.inner).stage {
            Stage::Streaming(stream) => Some(stream.progress.completed()),
            _ => None,
        }
    }

    /// How long the task has gone without a feed, a progress update or a state change.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(lock(&self.inner).last_activity)
    }

    /// Reset the idle clock of an open task.
    pub(crate) fn keep_alive(&self) {
        let mut inner = lock(&self.inner);
        if !matches!(inner.stage, Stage::Closed) {
            inner.touch();
        }
    }

    /// Mark the task as handed to the native drag session.
    pub(crate) fn mark_awaiting_write(&self) {
        let mut inner = lock(&self.inner);
        if let Stage::Created = inner.stage {
            inner.stage = Stage::AwaitingWrite;
            inner.touch();
            debug!(session_id = %self.session_id, file_name = %self.file_name, "awaiting write");
        }
    }

    /// Start streaming into the destination the OS picked.
    ///
    /// This is the only way into `Streaming`. On success the host application is asked to feed
    /// the file through [`ChannelEvent::FileStreamCallback`]. On failure the request's
    /// completion has already been told.
    pub fn begin_write(&self, request: WriteRequest) -> Result<(), WriteError> {
        let WriteRequest { destination, url, sink, progress, completion } = request;

        let mut inner = lock(&self.inner);
        let streaming = match inner.stage {
            Stage::Created | Stage::AwaitingWrite => None,
            Stage::Streaming(_) => Some(true),
            Stage::Closed => Some(false),
        };
        if let Some(streaming) = streaming {
            drop(inner);
            let error = || if streaming { WriteError::AlreadyStarted } else { WriteError::Abandoned };
            warn!(
                session_id = %self.session_id,
                file_name = %self.file_name,
                error = %error(),
                "rejecting OS write request"
            );
            completion.complete(Err(error()));
            return Err(error());
        }

        let sink = match sink {
            Some(sink) => sink,
            None => match FileSink::open(&destination) {
                Ok(sink) => Box::new(sink),
                Err(error) => {
                    inner.close();
                    drop(inner);
                    warn!(?destination, %error, "could not open file promise destination");
                    completion.complete(Err(WriteError::Io(io_copy(&error))));
                    return Err(WriteError::Io(error));
                },
            },
        };

        let progress = FileProgress::publish(progress, self.expected_size);
        inner.stage = Stage::Streaming(Stream { sink, progress, completion });
        inner.touch();
        drop(inner);

        debug!(session_id = %self.session_id, file_name = %self.file_name, %url, "streaming");
        self.channel.invoke(ChannelEvent::FileStreamCallback {
            id: self.session_id.clone(),
            file_name: self.file_name.clone(),
            url,
        });
        Ok(())
    }

    /// Feed the next chunk, or the end of the stream.
    ///
    /// Feeding a task that is not streaming is a no-op returning [`FeedOutcome::Dropped`].
    /// A `Writing` status without a chunk fails the write.
    pub fn feed(&self, chunk: Option<&[u8]>, status: FileStreamStatus) -> Result<FeedOutcome, WriteError> {
        let mut inner = lock(&self.inner);
        let Stage::Streaming(stream) = &mut inner.stage else {
            warn!(
                session_id = %self.session_id,
                file_name = %self.file_name,
                state = ?inner.stage.state(),
                ?status,
                "dropping chunk fed to a task that is not streaming"
            );
            return Ok(FeedOutcome::Dropped);
        };

        match (status, chunk) {
            (FileStreamStatus::Writing, Some(chunk)) => match stream.sink.append(chunk) {
                Ok(()) => {
                    inner.touch();
                    trace!(file_name = %self.file_name, len = chunk.len(), "appended chunk");
                    Ok(FeedOutcome::Appended(chunk.len()))
                },
                Err(error) => {
                    let stream = inner.close();
                    drop(inner);
                    warn!(file_name = %self.file_name, %error, "file promise write failed");
                    if let Some(stream) = stream {
                        stream.fail(WriteError::Io(io_copy(&error)));
                    }
                    Err(WriteError::Io(error))
                },
            },
            (FileStreamStatus::Writing, None) => {
                let stream = inner.close();
                drop(inner);
                warn!(file_name = %self.file_name, "chunk fed without data, failing the write");
                if let Some(stream) = stream {
                    stream.fail(WriteError::MissingChunk);
                }
                Err(WriteError::MissingChunk)
            },
            (FileStreamStatus::Ended, _) => {
                let stream = inner.close();
                drop(inner);
                debug!(session_id = %self.session_id, file_name = %self.file_name, "stream ended");
                match stream {
                    Some(stream) => stream.finish().map(|()| FeedOutcome::Closed),
                    None => Ok(FeedOutcome::Closed),
                }
            },
        }
    }

    /// Set the completed byte count shown by the OS.
    ///
    /// Returns the count now reported, or `None` if the task is not streaming, in which case
    /// the update is ignored.
    pub fn update_progress(&self, count: u64) -> Option<u64> {
        let mut inner = lock(&self.inner);
        let Stage::Streaming(stream) = &mut inner.stage else {
            return None;
        };
        let reported = stream.progress.update(count);
        inner.touch();
        Some(reported)
    }

    /// Close the task without delivering it.
    ///
    /// A streaming task reports [`WriteError::Abandoned`] to the OS. Returns whether the task
    /// was still open.
    pub fn abandon(&self) -> bool {
        self.close_with(WriteError::Abandoned)
    }

    /// Close the task because it stalled.
    ///
    /// A streaming task closes its sink and reports [`WriteError::TimedOut`] to the OS. Returns
    /// whether the task was still open.
    pub fn expire(&self) -> bool {
        self.close_with(WriteError::TimedOut)
    }

    fn close_with(&self, error: WriteError) -> bool {
        let mut inner = lock(&self.inner);
        if let Stage::Closed = inner.stage {
            return false;
        }
        let stream = inner.close();
        drop(inner);

        debug!(session_id = %self.session_id, file_name = %self.file_name, %error, "closing");
        if let Some(mut stream) = stream {
            if let Err(close_error) = stream.sink.close() {
                warn!(file_name = %self.file_name, %close_error, "could not close destination");
            }
            stream.fail(error);
        }
        true
    }
}

impl fmt::Debug for DeliveryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryTask")
            .field("session_id", &self.session_id)
            .field("file_name", &self.file_name)
            .field("expected_size", &self.expected_size)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// `io::Error` is not `Clone`; keep the kind and message for the second recipient.
fn io_copy(error: &std::io::Error) -> std::io::Error {
    std::io::Error::new(error.kind(), error.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::mpsc;

    use super::*;
    use crate::sink::WriterSink;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ChannelEvent>>);

    impl EventChannel for Recorder {
        fn invoke(&self, event: ChannelEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenSink;

    impl ByteSink for BrokenSink {
        fn append(&mut self, _chunk: &[u8]) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn task() -> (DeliveryTask, Arc<Recorder>) {
        let channel = Arc::new(Recorder::default());
        let task = DeliveryTask::new("abc", "photo.png", 1024, channel.clone());
        task.mark_awaiting_write();
        (task, channel)
    }

    fn request(
        buffer: &SharedBuffer,
    ) -> (WriteRequest, mpsc::Receiver<Result<(), WriteError>>) {
        let (tx, rx) = mpsc::channel();
        let completion = WriteCompletion::new(move |result| tx.send(result).unwrap());
        let request = WriteRequest::new("/tmp/photo.png", "file:///tmp/photo.png", completion)
            .with_sink(Box::new(WriterSink::new(buffer.clone())));
        (request, rx)
    }

    #[test]
    fn streams_chunks_in_order() {
        let (task, channel) = task();
        let buffer = SharedBuffer::default();
        let (request, completion) = request(&buffer);

        task.begin_write(request).unwrap();
        assert_eq!(task.state(), DeliveryState::Streaming);
        assert_eq!(channel.0.lock().unwrap()[0], ChannelEvent::FileStreamCallback {
            id: "abc".into(),
            file_name: "photo.png".into(),
            url: "file:///tmp/photo.png".into(),
        });

        assert_eq!(task.feed(Some(b"first "), FileStreamStatus::Writing).unwrap(), FeedOutcome::Appended(6));
        assert_eq!(task.feed(Some(b"second"), FileStreamStatus::Writing).unwrap(), FeedOutcome::Appended(6));
        assert_eq!(task.feed(None, FileStreamStatus::Ended).unwrap(), FeedOutcome::Closed);

        assert_eq!(*buffer.0.lock().unwrap(), b"first second");
        assert!(completion.try_recv().unwrap().is_ok());
        assert_eq!(task.state(), DeliveryState::Closed);
    }

    #[test]
    fn chunks_before_streaming_are_dropped() {
        let (task, _) = task();
        assert_eq!(task.feed(Some(b"early"), FileStreamStatus::Writing).unwrap(), FeedOutcome::Dropped);
        assert_eq!(task.update_progress(10), None);
        assert_eq!(task.state(), DeliveryState::AwaitingWrite);
    }

    #[test]
    fn writing_without_data_fails_the_write() {
        let (task, _) = task();
        let buffer = SharedBuffer::default();
        let (request, completion) = request(&buffer);
        task.begin_write(request).unwrap();

        assert!(matches!(task.feed(None, FileStreamStatus::Writing), Err(WriteError::MissingChunk)));
        assert!(matches!(completion.try_recv().unwrap(), Err(WriteError::MissingChunk)));
        assert_eq!(task.state(), DeliveryState::Closed);
        assert_eq!(task.progress(), None);

        // The host may still send the end of the stream; nothing is reported twice.
        assert_eq!(task.feed(None, FileStreamStatus::Ended).unwrap(), FeedOutcome::Dropped);
        assert!(completion.try_recv().is_err());
    }

    #[test]
    fn sink_errors_fail_the_write() {
        let (task, _) = task();
        let (tx, rx) = mpsc::channel();
        let request = WriteRequest::new("/tmp/x", "file:///tmp/x", WriteCompletion::new(move |r| {
            tx.send(r).unwrap();
        }))
        .with_sink(Box::new(BrokenSink));
        task.begin_write(request).unwrap();

        assert!(matches!(task.feed(Some(b"x"), FileStreamStatus::Writing), Err(WriteError::Io(_))));
        assert!(matches!(rx.try_recv().unwrap(), Err(WriteError::Io(_))));
        assert_eq!(task.state(), DeliveryState::Closed);
    }

    #[test]
    fn second_write_request_is_rejected() {
        let (task, _) = task();
        let buffer = SharedBuffer::default();
        let (first, _first_completion) = request(&buffer);
        let (second, second_completion) = request(&buffer);

        task.begin_write(first).unwrap();
        assert!(matches!(task.begin_write(second), Err(WriteError::AlreadyStarted)));
        assert!(matches!(second_completion.try_recv().unwrap(), Err(WriteError::AlreadyStarted)));
        assert_eq!(task.state(), DeliveryState::Streaming);
    }

    #[test]
    fn progress_is_only_reported_while_streaming() {
        let (task, _) = task();
        let buffer = SharedBuffer::default();
        let (request, _completion) = request(&buffer);

        task.begin_write(request).unwrap();
        assert_eq!(task.update_progress(512), Some(512));
        assert_eq!(task.update_progress(256), Some(512));
        assert_eq!(task.progress(), Some(512));

        task.feed(None, FileStreamStatus::Ended).unwrap();
        assert_eq!(task.update_progress(1024), None);
    }

    #[test]
    fn expiring_a_streaming_task_reports_a_timeout() {
        let (task, _) = task();
        let buffer = SharedBuffer::default();
        let (request, completion) = request(&buffer);
        task.begin_write(request).unwrap();

        assert!(task.expire());
        assert!(matches!(completion.try_recv().unwrap(), Err(WriteError::TimedOut)));
        assert!(!task.expire());
        assert!(!task.abandon());
    }

    #[test]
    fn abandoning_an_idle_task_closes_it() {
        let (task, channel) = task();
        assert!(task.abandon());
        assert_eq!(task.state(), DeliveryState::Closed);
        assert!(channel.0.lock().unwrap().is_empty());
    }

    #[test]
    fn write_request_for_a_closed_task_reports_abandoned() {
        let (task, channel) = task();
        task.abandon();
        let buffer = SharedBuffer::default();
        let (request, completion) = request(&buffer);

        assert!(matches!(task.begin_write(request), Err(WriteError::Abandoned)));
        assert!(matches!(completion.try_recv().unwrap(), Err(WriteError::Abandoned)));
        assert_eq!(task.state(), DeliveryState::Closed);
        assert!(channel.0.lock().unwrap().is_empty());
    }

    #[test]
    fn keep_alive_resets_the_idle_clock() {
        let (task, _) = task();
        std::thread::sleep(Duration::from_millis(10));
        let before = task.idle_for(Instant::now());
        assert!(before >= Duration::from_millis(10));
        task.keep_alive();
        assert!(task.idle_for(Instant::now()) < before);
    }

    #[test]
    fn default_sink_opens_the_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        let (task, _) = task();
        let (tx, rx) = mpsc::channel();
        let completion = WriteCompletion::new(move |result| tx.send(result).unwrap());

        task.begin_write(WriteRequest::new(&path, "file:///photo.png", completion)).unwrap();
        task.feed(Some(b"png"), FileStreamStatus::Writing).unwrap();
        task.feed(None, FileStreamStatus::Ended).unwrap();

        assert!(rx.try_recv().unwrap().is_ok());
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }

    #[test]
    fn status_uses_the_wire_names() {
        let status: FileStreamStatus = serde_json::from_str("\"kWriting\"").unwrap();
        assert_eq!(status, FileStreamStatus::Writing);
        let status: FileStreamStatus = serde_json::from_str("\"kEnded\"").unwrap();
        assert_eq!(status, FileStreamStatus::Ended);
        assert!(serde_json::from_str::<FileStreamStatus>("\"kPaused\"").is_err());
    }
}
