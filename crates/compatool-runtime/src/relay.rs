use crate::RuntimeError;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

/// Shared line-oriented log destination.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    /// Truncate or create `path` (and its parent directories).
    pub fn file(path: &Path) -> Result<Self, RuntimeError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(w, "{line}")?;
        w.flush()
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub relayed: u64,
    /// Lines that were not valid UTF-8 and were discarded.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    relayed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RelayStats {
        RelayStats {
            relayed: self.relayed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Best-effort stderr relay running on its own thread.
///
/// Each line is written to the sink and mirrored as a `debug` event under the
/// `compatool::wine` target. Lines that fail to decode are dropped and
/// counted; they never stop the relay.
#[derive(Debug)]
pub struct LogRelay {
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl LogRelay {
    pub fn spawn<R>(reader: R, sink: Option<LogSink>) -> Result<Self, RuntimeError>
    where
        R: Read + Send + 'static,
    {
        let counters = Arc::new(Counters::default());
        let thread_counters = Arc::clone(&counters);
        let handle = std::thread::Builder::new()
            .name("compatool-stderr".to_owned())
            .spawn(move || {
                relay_lines(BufReader::new(reader), sink.as_ref(), &thread_counters);
            })?;
        Ok(Self {
            handle: Some(handle),
            counters,
        })
    }

    /// Counters so far; the relay may still be running.
    pub fn stats(&self) -> RelayStats {
        self.counters.snapshot()
    }

    /// Wait for the stream to close and return the final counters.
    pub fn join(mut self) -> RelayStats {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("stderr relay thread panicked");
            }
        }
        self.counters.snapshot()
    }
}

/// Longest stderr line kept; longer lines are discarded and counted as dropped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Read one `\n`-terminated line into `buf`, keeping at most `max` bytes plus
/// the line terminator.
/// Returns `None` at end of stream, otherwise whether the line overflowed.
fn read_line_capped<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<Option<bool>> {
    let mut seen = false;
    let mut overflow = false;
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(seen.then_some(overflow));
        }
        seen = true;
        let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (&available[..=i], true),
            None => (available, false),
        };
        let used = chunk.len();
        if !overflow {
            if buf.len() + used > max + 2 {
                overflow = true;
                buf.clear();
            } else {
                buf.extend_from_slice(chunk);
            }
        }
        reader.consume(used);
        if done {
            return Ok(Some(overflow));
        }
    }
}

fn relay_lines<R: BufRead>(mut reader: R, sink: Option<&LogSink>, counters: &Counters) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let overflow = match read_line_capped(&mut reader, &mut buf, MAX_LINE_BYTES) {
            Ok(None) => break,
            Ok(Some(overflow)) => overflow,
            Err(e) => {
                tracing::debug!("stderr relay stopped: {e}");
                break;
            }
        };
        if overflow {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("dropped stderr line longer than {MAX_LINE_BYTES} bytes");
            continue;
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        if buf.is_empty() {
            continue;
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("dropped undecodable stderr line ({} bytes)", buf.len());
            continue;
        };
        tracing::debug!(target: "compatool::wine", "{line}");
        if let Some(sink) = sink {
            if let Err(e) = sink.write_line(line) {
                tracing::trace!("log sink write failed: {e}");
            }
        }
        counters.relayed.fetch_add(1, Ordering::Relaxed);
    }
}
