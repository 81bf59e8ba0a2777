use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ── DeferredFileWriter ───────────────────────────────────

type Slot = Arc<Mutex<Option<File>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<File>> {
    // A panic while writing a log line leaves the file usable.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A `MakeWriter` that drops everything until a log file is set.
///
/// The subscriber is installed before the config is read, so the log file
/// path is not known yet; `DeferredFileHandle::set_file` opens it afterwards.
#[derive(Clone)]
pub struct DeferredFileWriter {
    slot: Slot,
}

#[derive(Clone)]
pub struct DeferredFileHandle {
    slot: Slot,
}

impl DeferredFileWriter {
    pub fn new() -> (Self, DeferredFileHandle) {
        let slot: Slot = Arc::new(Mutex::new(None));
        (Self { slot: slot.clone() }, DeferredFileHandle { slot })
    }
}

impl DeferredFileHandle {
    /// Start appending log lines to `path`, creating parent dirs.
    pub fn set_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *lock(&self.slot) = Some(file);
        Ok(())
    }
}

pub struct DeferredWriter {
    slot: Slot,
}

impl Write for DeferredWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match lock(&self.slot).as_mut() {
            Some(f) => f.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match lock(&self.slot).as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DeferredFileWriter {
    type Writer = DeferredWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DeferredWriter {
            slot: self.slot.clone(),
        }
    }
}

// ── Subscriber ───────────────────────────────────────────

/// Install the global subscriber: stderr (RUST_LOG, default
/// `proxgate=info`, or debug when verbose) plus a file layer that stays
/// silent until the returned handle is given a file.
pub fn init(verbose: bool) -> DeferredFileHandle {
    let terminal_filter = if verbose {
        EnvFilter::new("proxgate=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("proxgate=info"))
    };

    // stdout carries replies in `serve` mode; logs always go to stderr.
    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    let (file_writer, file_handle) = DeferredFileWriter::new();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("proxgate=debug"));

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();

    file_handle
}
