//! Serialised access to the [`Mmu`].
//!
//! [`MmuService`] owns the MMU on one thread and drains a request channel one
//! message at a time. [`SharedMmu`] is the alternative for callers that need
//! several front-ends: the lock is held for a whole request.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use log::{error, info};
use parking_lot::Mutex;

use crate::error::{MemoryError, SimError};
use crate::mmu::{Mmu, Response};
use crate::protocol::{Notification, Reply, Request};

/// MMU service loop: sole owner of the page tables and the free pool
pub struct MmuService {
    mmu: Mmu,
    requests: Receiver<Request>,
    /// One reply mailbox per actor, indexed by pid
    replies: Vec<Sender<Reply>>,
    notifications: Sender<Notification>,
}

impl MmuService {
    pub fn new(
        mmu: Mmu,
        requests: Receiver<Request>,
        replies: Vec<Sender<Reply>>,
        notifications: Sender<Notification>,
    ) -> Self {
        MmuService {
            mmu,
            requests,
            replies,
            notifications,
        }
    }

    /// Serve requests until every process has sent its end-of-stream marker.
    ///
    /// Blocks while no request is pending. Hands back the MMU so its final
    /// state can be inspected.
    pub fn run(mut self) -> Result<Mmu, SimError> {
        while !self.mmu.is_finished() {
            let request = self
                .requests
                .recv()
                .map_err(|_| SimError::Disconnected("mmu request channel"))?;

            let Some(mailbox) = self.replies.get(request.pid) else {
                // nobody to answer, the sender is broken
                error!("dropping request from unknown pid={}: {:?}", request.pid, request);
                continue;
            };

            let response = self.mmu.handle(&request)?;
            mailbox
                .send(response.reply)
                .map_err(|_| SimError::Disconnected("actor reply mailbox"))?;
            if let Some(note) = response.notification {
                self.notifications
                    .send(note)
                    .map_err(|_| SimError::Disconnected("scheduler notification channel"))?;
            }
        }

        info!("Shutting down MMU after {} completions", self.mmu.completed());
        Ok(self.mmu)
    }
}

/// MMU behind a mutex; each `handle` call runs start to finish under the lock
#[derive(Clone)]
pub struct SharedMmu {
    inner: Arc<Mutex<Mmu>>,
}

impl SharedMmu {
    pub fn new(mmu: Mmu) -> Self {
        SharedMmu {
            inner: Arc::new(Mutex::new(mmu)),
        }
    }

    pub fn handle(&self, request: &Request) -> Result<Response, MemoryError> {
        self.inner.lock().handle(request)
    }

    /// Run `f` against a consistent view of the MMU
    pub fn inspect<R>(&self, f: impl FnOnce(&Mmu) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Take the MMU back once every other handle is gone
    pub fn into_inner(self) -> Option<Mmu> {
        Arc::try_unwrap(self.inner).ok().map(Mutex::into_inner)
    }
}
