/// Frame pipeline configuration and per-frame statistics

use std::time::Duration;
use crate::error::{Error, Result};

/// Frame pipeline configuration
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Number of frame-resource ring slots (2 or 3)
    pub frames_in_flight: usize,
    /// Number of recording worker threads
    pub worker_count: usize,
    /// Smallest number of batches handed to one worker
    pub min_chunk_size: usize,
    /// Longest the main thread waits on a slot's fence before failing
    pub fence_timeout: Duration,
    /// Nominal size of one transient uniform backing buffer, per lane
    pub transient_uniform_size: u64,
    /// Nominal size of one transient vertex backing buffer, per lane
    pub transient_vertex_size: u64,
    /// Size of the per-frame uniform buffer of each slot
    pub frame_uniform_size: u64,
    /// Record opaque and alpha-tested batches on the worker threads
    pub parallel_recording: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self {
            frames_in_flight: 2,
            worker_count: cores.saturating_sub(1).max(1),
            min_chunk_size: 200,
            fence_timeout: Duration::from_secs(5),
            transient_uniform_size: 1024 * 1024,
            transient_vertex_size: 1024 * 1024,
            frame_uniform_size: 64 * 1024,
            parallel_recording: true,
        }
    }
}

impl FrameConfig {
    /// Check the configuration before any device object is created
    ///
    /// # Errors
    ///
    /// `InitializationFailed` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(2..=3).contains(&self.frames_in_flight) {
            return Err(Error::InitializationFailed(format!(
                "frames_in_flight must be 2 or 3, got {}",
                self.frames_in_flight
            )));
        }
        if self.worker_count == 0 {
            return Err(Error::InitializationFailed("worker_count must be at least 1".to_string()));
        }
        if self.min_chunk_size == 0 {
            return Err(Error::InitializationFailed("min_chunk_size must be at least 1".to_string()));
        }
        if self.transient_uniform_size == 0 || self.transient_vertex_size == 0 {
            return Err(Error::InitializationFailed("transient buffer sizes must be non-zero".to_string()));
        }
        if self.frame_uniform_size == 0 {
            return Err(Error::InitializationFailed("frame_uniform_size must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Counters of one submitted frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame index passed to `begin_frame`
    pub frame_index: u64,
    /// Draw commands recorded across all passes
    pub draw_calls: u32,
    /// Parallel chunks dispatched to workers
    pub chunks: u32,
    /// Draws recorded on the serial lane
    pub serial_draws: u32,
    /// Transient bytes handed out across all lanes
    pub transient_bytes: u64,
    /// Transient backing buffers owned by the slot
    pub backing_buffers: u32,
}

#[cfg(test)]
#[path = "frame_config_tests.rs"]
mod tests;
