//! Destination streams that promised bytes are written into.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// The terminal consumer of a file-promise transfer.
///
/// A sink receives chunks in the order they were fed and is closed exactly once, when the
/// transfer ends successfully. A sink that is dropped without [`close`][Self::close] belongs to
/// a failed transfer.
pub trait ByteSink: Send {
    /// Append `chunk` at the end of the stream.
    fn append(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Flush and close the stream. Appending afterwards fails.
    fn close(&mut self) -> io::Result<()>;
}

/// A [`ByteSink`] over any [`Write`] implementation.
#[derive(Debug)]
pub struct WriterSink<W: Write + Send> {
    writer: Option<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer: Some(writer) }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl<W: Write + Send> ByteSink for WriterSink<W> {
    fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_all(chunk),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "sink is closed")),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

/// A buffered sink appending to a file on disk.
pub type FileSink = WriterSink<BufWriter<File>>;

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    ///
    /// Existing content is kept; truncation is left to whoever picked the destination.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(WriterSink::new(BufWriter::new(file)))
    }
}
