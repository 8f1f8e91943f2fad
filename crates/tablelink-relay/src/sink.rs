//! Destinations for encoded link frames.

use crate::error::{RelayError, Result};
use std::sync::{Arc, Mutex};
use tablelink_core::LinkedMem;

/// Where the relay writes each encoded `LinkedMem` frame.
pub trait LinkSink: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Open the destination. The relay refuses to start if this fails.
    fn open(&mut self) -> Result<()>;

    /// Write one frame. `mem` is the decoded state `frame` was encoded from.
    fn write(&mut self, mem: &LinkedMem, frame: &[u8]) -> Result<()>;
}

/// Sink that only logs what would be written.
#[derive(Debug, Default)]
pub struct LogSink;

impl LinkSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn open(&mut self) -> Result<()> {
        log::info!("[SINK] Logging frames instead of writing shared memory");
        Ok(())
    }

    fn write(&mut self, mem: &LinkedMem, frame: &[u8]) -> Result<()> {
        log::debug!(
            "[SINK] tick={} name={:?} pos={:?} front={:?} context_len={} ({} bytes)",
            mem.tick,
            mem.name,
            mem.avatar_position,
            mem.avatar_front,
            mem.context_len(),
            frame.len()
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Frames {
    last_frame: Option<Vec<u8>>,
    last_mem: Option<LinkedMem>,
    writes: u64,
}

/// Sink that keeps the most recent frame in memory.
///
/// Clones share the same storage, so a test can hand one clone to the
/// relay and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Frames>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last frame written, if any.
    pub fn last_frame(&self) -> Option<Vec<u8>> {
        self.lock().last_frame.clone()
    }

    /// The state the last frame was encoded from.
    pub fn last_mem(&self) -> Option<LinkedMem> {
        self.lock().last_mem.clone()
    }

    /// Number of frames written.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Frames> {
        self.frames.lock().expect("Memory sink lock poisoned")
    }
}

impl LinkSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, mem: &LinkedMem, frame: &[u8]) -> Result<()> {
        let mut frames = self.lock();
        frames.last_frame = Some(frame.to_vec());
        frames.last_mem = Some(mem.clone());
        frames.writes += 1;
        Ok(())
    }
}

/// Name of the shared-memory object Mumble's Link plugin creates.
pub fn link_name() -> &'static str {
    if cfg!(windows) {
        "MumbleLink"
    } else if cfg!(target_os = "macos") {
        "/tmp/MumbleLink.<uid>"
    } else {
        "/dev/shm/MumbleLink.<uid>"
    }
}

/// Writer for the real shared-memory link.
///
/// Not available in this build: `open` always fails, so a relay asked for
/// the native sink exits instead of silently dropping frames.
#[derive(Debug, Default)]
pub struct NativeSink;

impl LinkSink for NativeSink {
    fn name(&self) -> &str {
        "native"
    }

    fn open(&mut self) -> Result<()> {
        Err(RelayError::SinkUnavailable(format!(
            "cannot map {}; shared-memory writing is not supported in this build",
            link_name()
        )))
    }

    fn write(&mut self, _mem: &LinkedMem, _frame: &[u8]) -> Result<()> {
        Err(RelayError::Sink("native sink is not open".to_string()))
    }
}
