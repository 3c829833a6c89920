//! First-come first-served admission scheduler.
//!
//! Admits one ready actor at a time and keeps it running until the MMU
//! reports that actor's end of stream. Fault notifications are tallied but
//! never end a turn.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use crate::constants::Pid;
use crate::error::SimError;
use crate::protocol::{Admission, Notification};

/// Summary of a scheduler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Pids in the order they were admitted
    pub admitted: Vec<Pid>,
    /// Fault notifications received, per pid
    pub faults: Vec<u64>,
    pub completed: usize,
}

pub struct Scheduler {
    ready: Receiver<Pid>,
    admissions: Vec<Sender<Admission>>,
    notifications: Receiver<Notification>,
}

impl Scheduler {
    /// `admissions[pid]` is the admission mailbox of actor `pid`
    pub fn new(
        ready: Receiver<Pid>,
        admissions: Vec<Sender<Admission>>,
        notifications: Receiver<Notification>,
    ) -> Self {
        Scheduler {
            ready,
            admissions,
            notifications,
        }
    }

    pub fn run(self) -> Result<SchedulerReport, SimError> {
        let num_procs = self.admissions.len();
        let mut finished = vec![false; num_procs];
        let mut report = SchedulerReport {
            faults: vec![0; num_procs],
            ..SchedulerReport::default()
        };
        info!("Scheduler started (FCFS), {} processes", num_procs);

        while report.completed < num_procs {
            let pid = self
                .ready
                .recv()
                .map_err(|_| SimError::Disconnected("ready queue"))?;
            let Some(mailbox) = self.admissions.get(pid) else {
                warn!("ignoring ready registration from unknown pid={}", pid);
                continue;
            };
            if finished[pid] {
                warn!("pid={} registered after it already finished, cancelling", pid);
                cancel(pid, mailbox);
                continue;
            }

            info!("Picked process {} from ready queue", pid);
            mailbox
                .send(Admission::Run)
                .map_err(|_| SimError::Disconnected("admission mailbox"))?;
            report.admitted.push(pid);

            self.run_turn(pid, &mut finished, &mut report)?;
        }

        info!("All {} processes finished, scheduler exiting", num_procs);
        Ok(report)
    }

    /// Consume notifications until `active` reports its end of stream
    fn run_turn(&self, active: Pid, finished: &mut [bool], report: &mut SchedulerReport) -> Result<(), SimError> {
        loop {
            let note = match self.notifications.recv() {
                Ok(note) => note,
                Err(_) => {
                    self.cancel_waiting(&report.admitted);
                    return Err(SimError::Disconnected("scheduler notification channel"));
                }
            };
            let from = note.pid;
            if from >= finished.len() {
                warn!("notification from unknown pid={}", from);
                continue;
            }

            if note.fault_handled {
                report.faults[from] += 1;
                debug!("Process {}: page fault handled", from);
                continue;
            }

            if !finished[from] {
                finished[from] = true;
                report.completed += 1;
            }
            if from == active {
                info!("Process {} finished", from);
                return Ok(());
            }
            warn!("completion from pid={} while pid={} holds the turn", from, active);
        }
    }

    /// Cancel every actor that has not been admitted yet
    fn cancel_waiting(&self, admitted: &[Pid]) {
        for (pid, mailbox) in self.admissions.iter().enumerate() {
            if !admitted.contains(&pid) {
                cancel(pid, mailbox);
            }
        }
    }
}

/// A cancel is best effort: the actor may already be gone
fn cancel(pid: Pid, mailbox: &Sender<Admission>) {
    if mailbox.send(Admission::Cancel).is_err() {
        debug!("cancel for pid={} reached no actor, mailbox closed", pid);
    }
}
