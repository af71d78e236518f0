//! Microphone capture seam and the buffer of recorded fragments

use async_trait::async_trait;
use crmai_common::AudioPayload;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Source of microphone access
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire the microphone and start capturing. Fails when access is
    /// denied or no device is present.
    async fn open(&self) -> anyhow::Result<Box<dyn CaptureHandle>>;
}

/// A running capture
pub trait CaptureHandle: Send {
    /// Fragments captured since the previous call, in capture order
    fn take_fragments(&mut self) -> Vec<Vec<u8>>;

    /// Stop capturing and release the device. Called at most once per
    /// recording, but implementations should tolerate repeats.
    fn release(&mut self);
}

/// Captured audio fragments in arrival order
#[derive(Debug, Default)]
pub struct RecordingBuffer {
    fragments: Vec<Vec<u8>>,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty fragments are skipped.
    pub fn push(&mut self, fragment: Vec<u8>) {
        if !fragment.is_empty() {
            self.fragments.push(fragment);
        }
    }

    pub fn extend(&mut self, fragments: impl IntoIterator<Item = Vec<u8>>) {
        for fragment in fragments {
            self.push(fragment);
        }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.fragments.iter().map(Vec::len).sum()
    }

    /// Concatenate all fragments into one WAV upload.
    pub fn into_payload(self) -> AudioPayload {
        let mut bytes = Vec::with_capacity(self.total_bytes());
        for fragment in self.fragments {
            bytes.extend_from_slice(&fragment);
        }
        AudioPayload::wav(bytes)
    }
}

/// State of the recording currently in progress
pub(crate) struct ActiveRecording {
    /// Distinguishes this recording from earlier ones for late timers
    pub generation: u64,
    pub started_at: Instant,
    handle: Box<dyn CaptureHandle>,
    buffer: RecordingBuffer,
    timers: Vec<AbortHandle>,
}

impl ActiveRecording {
    pub fn new(generation: u64, handle: Box<dyn CaptureHandle>) -> Self {
        Self {
            generation,
            started_at: Instant::now(),
            handle,
            buffer: RecordingBuffer::new(),
            timers: Vec::new(),
        }
    }

    pub fn add_timer(&mut self, timer: AbortHandle) {
        self.timers.push(timer);
    }

    /// Move whatever the device captured so far into the buffer.
    pub fn drain(&mut self) {
        let fragments = self.handle.take_fragments();
        self.buffer.extend(fragments);
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Stop timers, release the device and hand over the recorded audio.
    pub fn finish(mut self) -> AudioPayload {
        self.drain();
        std::mem::take(&mut self.buffer).into_payload()
    }
}

impl Drop for ActiveRecording {
    fn drop(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        self.handle.release();
    }
}
