//! Process actor: replays a reference string against the MMU once admitted.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use crate::constants::*;
use crate::error::SimError;
use crate::protocol::{Admission, Reply, ReplyKind, Request};

/// Why an actor stopped issuing references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every reference was answered with a frame
    Completed,
    /// The MMU rejected a reference as illegal
    IllegalPage(i32),
    /// The MMU could not find a frame for a reference
    Unresolvable(i32),
    /// The scheduler cancelled the actor before admitting it
    Cancelled,
}

/// What an actor did during its turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub pid: Pid,
    /// Raw reply codes received, one per issued reference
    pub results: Vec<i32>,
    pub termination: Termination,
}

impl ProcessReport {
    pub fn issued(&self) -> usize {
        self.results.len()
    }
}

/// Channels connecting one actor to the scheduler and the MMU
pub struct ActorChannels {
    pub ready: Sender<Pid>,
    pub admission: Receiver<Admission>,
    pub requests: Sender<Request>,
    pub replies: Receiver<Reply>,
}

/// A simulated process with a fixed reference string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessActor {
    pub pid: Pid,
    pub references: Vec<i32>,
    /// Legal upper bound sent with every request
    pub bound: i32,
}

impl ProcessActor {
    pub fn new(pid: Pid, references: Vec<i32>, bound: i32) -> Self {
        ProcessActor { pid, references, bound }
    }

    /// Register as ready, wait for admission, then issue one request per
    /// reference and wait for each reply before sending the next.
    ///
    /// The stream always ends with an end-of-stream marker unless the actor was
    /// cancelled, so the MMU sees every admitted process finish.
    pub fn run(self, channels: ActorChannels) -> Result<ProcessReport, SimError> {
        let pid = self.pid;
        channels
            .ready
            .send(pid)
            .map_err(|_| SimError::Disconnected("ready queue"))?;

        let admission = channels
            .admission
            .recv()
            .map_err(|_| SimError::Disconnected("admission mailbox"))?;
        if admission == Admission::Cancel {
            info!("pid={} cancelled before admission", pid);
            return Ok(ProcessReport {
                pid,
                results: Vec::new(),
                termination: Termination::Cancelled,
            });
        }
        info!("pid={} starting, {} references", pid, self.references.len());

        let mut results = Vec::with_capacity(self.references.len());
        let mut termination = Termination::Completed;
        for &page in &self.references {
            let reply = Self::round_trip(&channels, Request::access(pid, page, self.bound))?;
            results.push(reply.result);
            match reply.kind()? {
                ReplyKind::Frame(frame) => debug!("pid={} page={} -> frame={}", pid, page, frame),
                ReplyKind::Invalid => {
                    warn!("pid={} INVALID page={} (bound={}), terminating", pid, page, self.bound);
                    termination = Termination::IllegalPage(page);
                    break;
                }
                ReplyKind::Unresolvable => {
                    warn!("pid={} fault on page={} could not be resolved, terminating", pid, page);
                    termination = Termination::Unresolvable(page);
                    break;
                }
                ReplyKind::EndOfStream => {
                    return Err(SimError::Protocol(format!(
                        "pid={} got an end-of-stream echo for page {}",
                        pid, page
                    )));
                }
            }
        }

        let echo = Self::round_trip(&channels, Request::end_of_stream(pid))?;
        if echo.result != END_OF_STREAM {
            return Err(SimError::Protocol(format!(
                "pid={} expected end-of-stream echo, got {}",
                pid, echo.result
            )));
        }
        info!("pid={} finished reference string ({:?})", pid, termination);

        Ok(ProcessReport {
            pid,
            results,
            termination,
        })
    }

    fn round_trip(channels: &ActorChannels, request: Request) -> Result<Reply, SimError> {
        channels
            .requests
            .send(request)
            .map_err(|_| SimError::Disconnected("mmu request channel"))?;
        let reply = channels
            .replies
            .recv()
            .map_err(|_| SimError::Disconnected("actor reply mailbox"))?;
        if reply.pid != request.pid {
            return Err(SimError::Protocol(format!(
                "pid={} received a reply addressed to pid={}",
                request.pid, reply.pid
            )));
        }
        Ok(reply)
    }
}
