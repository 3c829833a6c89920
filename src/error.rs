//! Error types for the memory structures and the simulation around them.

use crate::constants::{FrameId, PageNo, Pid};

/// Result alias for page-table, pool and MMU operations.
pub type Result<T> = core::result::Result<T, MemoryError>;

/// Errors raised by the page table store, the free frame pool and the MMU.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// `processes` or `pages_per_process` was zero, or a cap was exceeded.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
    /// The pid does not name one of the page tables.
    #[error("process {pid} out of range (processes={processes})")]
    ProcessOutOfRange { pid: Pid, processes: usize },
    /// The page number is past the end of the page table.
    #[error("page {page} out of range (pages_per_process={pages})")]
    PageOutOfRange { page: PageNo, pages: usize },
    /// Frame identifier outside `0..frames`.
    #[error("frame {frame} out of range (frames={frames})")]
    FrameOutOfRange { frame: FrameId, frames: usize },
    /// Touching an entry that holds no frame.
    #[error("page {page} of process {pid} is not mapped")]
    NotMapped { pid: Pid, page: PageNo },
    #[error("free frame pool is empty")]
    PoolEmpty,
    /// Pushing into a full pool; means a frame was freed twice somewhere.
    #[error("free frame pool is full")]
    PoolFull,
    /// A consistency check over store + pool failed.
    #[error("memory invariant violated: {0}")]
    InvariantViolated(String),
}

/// Errors raised while configuring or running a whole simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// A peer hung up while a message was still expected.
    #[error("channel disconnected: {0}")]
    Disconnected(&'static str),
    /// A reply code that is neither a frame nor a known sentinel.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("thread {0} panicked")]
    ThreadPanicked(String),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}
