//! Messages exchanged between process actors, the MMU and the scheduler.
//!
//! The envelopes keep the integer wire codes (frames are non-negative, the
//! sentinels in [`crate::constants`] are negative) and offer typed views
//! through [`Request::page_ref`] and [`Reply::kind`].

use std::fmt;

use crate::constants::*;
use crate::error::SimError;

/// Actor -> MMU reference request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub pid: Pid,
    pub page: i32,
    /// Legal upper bound on `page` for this request only
    pub bound: i32,
}

/// What a request's page field stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRef {
    Page(i32),
    EndOfStream,
}

impl Request {
    pub fn access(pid: Pid, page: i32, bound: i32) -> Self {
        Request { pid, page, bound }
    }

    /// End-of-reference marker; `bound` carries no meaning
    pub fn end_of_stream(pid: Pid) -> Self {
        Request {
            pid,
            page: END_OF_STREAM,
            bound: -1,
        }
    }

    pub fn page_ref(&self) -> PageRef {
        if self.page == END_OF_STREAM {
            PageRef::EndOfStream
        } else {
            PageRef::Page(self.page)
        }
    }
}

/// MMU -> actor reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub pid: Pid,
    pub result: i32,
}

/// Decoded reply code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Frame(FrameId),
    Invalid,
    Unresolvable,
    EndOfStream,
}

impl Reply {
    pub fn new(pid: Pid, kind: ReplyKind) -> Self {
        Reply { pid, result: kind.to_code() }
    }

    pub fn kind(&self) -> Result<ReplyKind, SimError> {
        ReplyKind::from_code(self.result)
    }
}

impl ReplyKind {
    /// Integer code carried on the wire
    pub fn to_code(self) -> i32 {
        match self {
            // frame ids are bounded by MAX_FRAMES, well inside i32
            ReplyKind::Frame(frame) => frame as i32,
            ReplyKind::Invalid => INVALID_PAGE,
            ReplyKind::Unresolvable => UNRESOLVABLE_FAULT,
            ReplyKind::EndOfStream => END_OF_STREAM,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, SimError> {
        match code {
            c if c >= 0 => Ok(ReplyKind::Frame(c as FrameId)),
            INVALID_PAGE => Ok(ReplyKind::Invalid),
            UNRESOLVABLE_FAULT => Ok(ReplyKind::Unresolvable),
            END_OF_STREAM => Ok(ReplyKind::EndOfStream),
            other => Err(SimError::Protocol(format!("unknown reply code {}", other))),
        }
    }
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyKind::Frame(frame) => write!(f, "frame {}", frame),
            ReplyKind::Invalid => f.write_str("invalid page"),
            ReplyKind::Unresolvable => f.write_str("unresolvable fault"),
            ReplyKind::EndOfStream => f.write_str("end of stream"),
        }
    }
}

/// MMU -> scheduler side notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub pid: Pid,
    /// `true`: a fault was resolved. `false`: the process finished its stream.
    pub fault_handled: bool,
}

impl Notification {
    pub fn fault(pid: Pid) -> Self {
        Notification { pid, fault_handled: true }
    }

    pub fn completion(pid: Pid) -> Self {
        Notification { pid, fault_handled: false }
    }

    #[inline]
    pub fn is_completion(&self) -> bool {
        !self.fault_handled
    }
}

/// Scheduler -> actor control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Start issuing references
    Run,
    /// Give up without issuing anything
    Cancel,
}
