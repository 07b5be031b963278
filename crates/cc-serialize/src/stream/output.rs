use std::io::{self, Write};
use std::sync::mpsc::{sync_channel, Receiver, SendError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::config::ParallelStreamConfig;
use super::failure::StreamFailure;
use super::pool::BufferPool;

/// Message from the producer to the writer thread.
#[derive(Debug)]
pub enum Chunk {
    Data(Vec<u8>),
    /// No more data; flush the sink and stop.
    Close,
}

/// Output stream that hands filled buffers to a dedicated writer thread.
///
/// The producer fills one buffer at a time and sends it once full. The writer
/// thread opens the sink, writes buffers in the order they were sent and
/// returns each one to the pool, even when the write fails. Failures on either
/// side are sticky: the next `write` and `close` report them.
///
/// `flush` only checks for failures; buffered bytes reach the sink on a full
/// chunk or on `close`.
pub struct ParallelOutputStream {
    pool: Arc<BufferPool>,
    sender: Option<SyncSender<Chunk>>,
    current: Option<Vec<u8>>,
    writer: Option<JoinHandle<()>>,
}

impl ParallelOutputStream {
    /// Spawns the writer thread. `open` is called once, on that thread.
    pub fn new<W, F>(config: &ParallelStreamConfig, open: F) -> io::Result<Self>
    where
        W: Write + 'static,
        F: FnOnce() -> io::Result<W> + Send + 'static,
    {
        let channel = sync_channel(config.max_chunks.max(1) + 1);
        Self::with_channel(config, open, channel)
    }

    /// Like [`new`](Self::new) with a caller-supplied channel.
    pub fn with_channel<W, F>(
        config: &ParallelStreamConfig,
        open: F,
        (sender, receiver): (SyncSender<Chunk>, Receiver<Chunk>),
    ) -> io::Result<Self>
    where
        W: Write + 'static,
        F: FnOnce() -> io::Result<W> + Send + 'static,
    {
        let pool = Arc::new(BufferPool::new(config));
        let writer = {
            let pool = Arc::clone(&pool);
            thread::Builder::new()
                .name("cc-parallel-writer".to_string())
                .spawn(move || run_writer(open, receiver, &pool))?
        };
        Ok(Self {
            pool,
            sender: Some(sender),
            current: None,
            writer: Some(writer),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    /// Sends the partial buffer, stops the writer thread and reports any
    /// failure recorded by either side. Closing again returns the same outcome.
    pub fn close(&mut self) -> Result<(), StreamFailure> {
        let Some(sender) = self.sender.take() else {
            return self.pool.check();
        };

        if let Some(buffer) = self.current.take() {
            if buffer.is_empty() {
                self.pool.give_back(buffer);
            } else if let Err(SendError(chunk)) = sender.send(Chunk::Data(buffer)) {
                self.writer_gone(chunk);
            }
        }
        let _ = sender.send(Chunk::Close);
        drop(sender);

        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                self.pool.fail(StreamFailure::WriterPanicked);
            }
        }
        tracing::debug!(allocated = self.pool.allocated(), "parallel output stream closed");
        self.pool.check()
    }

    fn buffer(&mut self) -> Result<&mut Vec<u8>, StreamFailure> {
        if self.current.is_none() {
            self.current = Some(self.pool.take()?);
        }
        self.current.as_mut().ok_or(StreamFailure::WriterGone)
    }

    fn send_current(&mut self) -> Result<(), StreamFailure> {
        let (Some(sender), Some(buffer)) = (&self.sender, self.current.take()) else {
            return Ok(());
        };
        match sender.send(Chunk::Data(buffer)) {
            Ok(()) => Ok(()),
            Err(SendError(chunk)) => Err(self.writer_gone(chunk)),
        }
    }

    /// Records why the writer thread stopped receiving and reclaims the chunk
    /// it never got.
    fn writer_gone(&mut self, chunk: Chunk) -> StreamFailure {
        if let Chunk::Data(buffer) = chunk {
            self.pool.give_back(buffer);
        }
        // The receiver is gone, so the thread has finished or is unwinding.
        let failure = match self.writer.take().map(JoinHandle::join) {
            Some(Err(_)) => StreamFailure::WriterPanicked,
            _ => StreamFailure::WriterGone,
        };
        self.pool.fail(failure);
        self.pool.failure().unwrap_or(StreamFailure::WriterGone)
    }
}

impl Write for ParallelOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream is closed"));
        }
        self.pool.check()?;

        let chunk_size = self.pool.chunk_size();
        let mut remaining = buf;
        while !remaining.is_empty() {
            let buffer = self.buffer()?;
            let n = (chunk_size - buffer.len()).min(remaining.len());
            buffer.extend_from_slice(&remaining[..n]);
            remaining = &remaining[n..];
            if buffer.len() == chunk_size {
                self.send_current()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.pool.check()?;
        Ok(())
    }
}

impl Drop for ParallelOutputStream {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(failure) = self.close() {
                tracing::warn!("parallel output stream dropped with failure: {failure}");
            }
        }
    }
}

impl std::fmt::Debug for ParallelOutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelOutputStream")
            .field("closed", &self.is_closed())
            .field("pending", &self.current.as_ref().map_or(0, Vec::len))
            .finish()
    }
}

fn run_writer<W, F>(open: F, receiver: Receiver<Chunk>, pool: &BufferPool)
where
    W: Write,
    F: FnOnce() -> io::Result<W>,
{
    let mut sink = match open() {
        Ok(sink) => sink,
        Err(err) => {
            tracing::warn!("failed to open parallel output sink: {err}");
            pool.fail(StreamFailure::Io(Arc::new(err)));
            drain(&receiver, pool);
            return;
        }
    };

    let mut written = 0usize;
    while let Ok(chunk) = receiver.recv() {
        match chunk {
            Chunk::Data(buffer) => {
                let result = sink.write_all(&buffer);
                written += buffer.len();
                pool.give_back(buffer);
                if let Err(err) = result {
                    tracing::warn!("parallel output sink write failed: {err}");
                    pool.fail(StreamFailure::Io(Arc::new(err)));
                    drain(&receiver, pool);
                    return;
                }
            }
            Chunk::Close => break,
        }
    }

    if let Err(err) = sink.flush() {
        pool.fail(StreamFailure::Io(Arc::new(err)));
    }
    tracing::debug!(bytes = written, "parallel writer finished");
}

/// Keeps returning buffers after a failure so the producer never blocks on a
/// full channel.
fn drain(receiver: &Receiver<Chunk>, pool: &BufferPool) {
    while let Ok(chunk) = receiver.recv() {
        match chunk {
            Chunk::Data(buffer) => pool.give_back(buffer),
            Chunk::Close => return,
        }
    }
}
