//! Error types for the Nebula3D engine
//!
//! This module defines the error type used throughout the engine core:
//! GPU allocation, synchronization misuse, device waits, and parallel
//! recording failures.

use std::fmt;

/// Result type for Nebula3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nebula3D engine errors
///
/// None of these are recoverable inside the frame pipeline. They abort the
/// current frame and propagate to the application shell.
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock device, worker pool, etc.)
    BackendError(String),

    /// Out of GPU memory (new backing buffer or command buffer allocation failed)
    OutOfMemory,

    /// Invalid resource (buffer, command list, pass id, etc.)
    InvalidResource(String),

    /// Initialization failed (device, ring, pool, recorder)
    InitializationFailed(String),

    /// A command list was used in a state that its lifecycle forbids
    /// (recording into a closed list, ending twice, executing an open list)
    SynchronizationMisuse(String),

    /// A fence wait did not complete within the configured timeout
    DeviceTimeout(String),

    /// A parallel recording chunk failed; raised after all sibling chunks joined
    ChunkFailed {
        /// Index of the first failing chunk (in partition order)
        chunk: usize,
        /// Failure description
        message: String,
    },

    /// The frame was aborted and nothing was submitted
    FrameAborted(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::SynchronizationMisuse(msg) => write!(f, "Synchronization misuse: {}", msg),
            Error::DeviceTimeout(msg) => write!(f, "Device timeout: {}", msg),
            Error::ChunkFailed { chunk, message } => {
                write!(f, "Recording chunk {} failed: {}", chunk, message)
            }
            Error::FrameAborted(msg) => write!(f, "Frame aborted: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
