use log::{debug, info, warn};

use crate::constants::*;
use crate::error::{MemoryError, Result};
use crate::eviction::select_local_victim;
use crate::memory::{FreeFramePool, PageTableStore};
use crate::protocol::{Notification, PageRef, Reply, ReplyKind, Request};

/// Access counter owned by the MMU. Ticks once per legal access, never resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalClock(Timestamp);

impl GlobalClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> Timestamp {
        self.0
    }

    /// Advance and return the new time
    #[inline]
    pub fn tick(&mut self) -> Timestamp {
        self.0 += 1;
        self.0
    }
}

/// Result of resolving one page reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Page outside the request's bound
    Invalid,
    /// Page was resident
    Hit(FrameId),
    /// Fault served from the free pool
    Allocated(FrameId),
    /// Fault served by taking the frame of the process's own LRU page
    Evicted { victim: PageNo, frame: FrameId },
    /// Fault with an empty pool and no resident page of this process to evict
    Unresolvable,
}

impl Outcome {
    pub fn frame(&self) -> Option<FrameId> {
        match *self {
            Outcome::Hit(frame) | Outcome::Allocated(frame) | Outcome::Evicted { frame, .. } => Some(frame),
            Outcome::Invalid | Outcome::Unresolvable => None,
        }
    }

    /// Whether a page fault was serviced
    pub fn fault_handled(&self) -> bool {
        matches!(self, Outcome::Allocated(_) | Outcome::Evicted { .. })
    }

    pub fn to_reply_kind(&self) -> ReplyKind {
        match self.frame() {
            Some(frame) => ReplyKind::Frame(frame),
            None if *self == Outcome::Invalid => ReplyKind::Invalid,
            None => ReplyKind::Unresolvable,
        }
    }

    /// Convert to the wire format (frame number, or a negative sentinel)
    pub fn to_output(&self) -> i32 {
        self.to_reply_kind().to_code()
    }
}

/// Per-process counters. Bookkeeping only, resolution never reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub hits: u64,
    pub faults: u64,
    pub evictions: u64,
    pub invalid_refs: u64,
    pub unresolvable: u64,
    pub completions: u64,
}

impl ProcessStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Invalid => self.invalid_refs += 1,
            Outcome::Hit(_) => self.hits += 1,
            Outcome::Allocated(_) => self.faults += 1,
            Outcome::Evicted { .. } => {
                self.faults += 1;
                self.evictions += 1;
            }
            Outcome::Unresolvable => self.unresolvable += 1,
        }
    }
}

/// What the MMU sends back for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Goes to the requesting actor
    pub reply: Reply,
    /// Goes to the scheduler, if anything worth telling it happened
    pub notification: Option<Notification>,
}

/// Demand-paging MMU: page tables, free frames, local LRU replacement.
///
/// Every mutation goes through `&mut self`, so whoever owns the `Mmu` is the
/// single writer of both the page tables and the pool.
#[derive(Debug, Clone)]
pub struct Mmu {
    store: PageTableStore,
    pool: FreeFramePool,
    clock: GlobalClock,
    stats: Vec<ProcessStats>,
    completed: usize,
}

impl Mmu {
    pub fn new(processes: usize, pages_per_process: usize, frames: usize) -> Result<Self> {
        let store = PageTableStore::new(processes, pages_per_process)?;
        let pool = FreeFramePool::new(frames)?;
        info!(
            "MMU started: processes={} pages_per_process={} frames={}",
            processes, pages_per_process, frames
        );
        Ok(Mmu {
            store,
            pool,
            clock: GlobalClock::new(),
            stats: vec![ProcessStats::default(); processes],
            completed: 0,
        })
    }

    /// Resolve one reference of `pid` to `page`, legal only below `bound`.
    ///
    /// Returns the outcome and whether a fault was handled. Invalid references
    /// leave the clock and every table untouched.
    pub fn resolve(&mut self, pid: Pid, page: i32, bound: i32) -> Result<(Outcome, bool)> {
        // Step 1: legality. The table width caps the bound.
        self.store.table(pid)?;
        let legal = PageTableStore::is_legal(page.into(), bound.into())
            && (page as usize) < self.store.pages_per_process();
        if !legal {
            debug!("pid={} illegal page={} (bound={})", pid, page, bound);
            return Ok(self.finish(pid, Outcome::Invalid));
        }
        let page = page as PageNo;

        // Step 2: hit
        if let Some(frame) = self.store.entry(pid, page)?.resident_frame() {
            let ts = self.clock.tick();
            self.store.touch(pid, page, ts)?;
            debug!("pid={} hit page={} -> frame={} (ts={})", pid, page, frame, ts);
            return Ok(self.finish(pid, Outcome::Hit(frame)));
        }

        // Step 3: fault, take a free frame
        match self.pool.alloc() {
            Ok(frame) => {
                let ts = self.clock.tick();
                self.store.set_mapping(pid, page, frame, ts)?;
                debug!("pid={} fault page={} allocated frame={} (ts={})", pid, page, frame, ts);
                return Ok(self.finish(pid, Outcome::Allocated(frame)));
            }
            Err(MemoryError::PoolEmpty) => {}
            Err(e) => return Err(e),
        }

        // Step 4: fault, pool empty, steal the frame of our own LRU page.
        // The frame moves straight to the new mapping, never through the pool.
        let Some(victim) = select_local_victim(&self.store, pid)? else {
            warn!(
                "pid={} cannot handle fault on page={}: no free frame and no resident page to evict",
                pid, page
            );
            return Ok(self.finish(pid, Outcome::Unresolvable));
        };
        let frame = self
            .store
            .entry(pid, victim)?
            .resident_frame()
            .ok_or(MemoryError::NotMapped { pid, page: victim })?;
        self.store.invalidate(pid, victim)?;
        let ts = self.clock.tick();
        self.store.set_mapping(pid, page, frame, ts)?;
        debug!(
            "pid={} fault page={} evicted page={} -> frame={} (ts={})",
            pid, page, victim, frame, ts
        );
        Ok(self.finish(pid, Outcome::Evicted { victim, frame }))
    }

    fn finish(&mut self, pid: Pid, outcome: Outcome) -> (Outcome, bool) {
        self.stats[pid].record(&outcome);
        (outcome, outcome.fault_handled())
    }

    /// Serve one request, end-of-stream markers included
    pub fn handle(&mut self, request: &Request) -> Result<Response> {
        let pid = request.pid;
        match request.page_ref() {
            PageRef::EndOfStream => {
                self.complete(pid)?;
                Ok(Response {
                    reply: Reply::new(pid, ReplyKind::EndOfStream),
                    notification: Some(Notification::completion(pid)),
                })
            }
            PageRef::Page(page) => {
                let (outcome, fault_handled) = self.resolve(pid, page, request.bound)?;
                Ok(Response {
                    reply: Reply::new(pid, outcome.to_reply_kind()),
                    notification: fault_handled.then(|| Notification::fault(pid)),
                })
            }
        }
    }

    /// Record an end-of-stream from `pid`. Touches no page table entry and not the clock.
    fn complete(&mut self, pid: Pid) -> Result<()> {
        let processes = self.store.processes();
        let stats = self
            .stats
            .get_mut(pid)
            .ok_or(MemoryError::ProcessOutOfRange { pid, processes })?;
        stats.completions += 1;
        if stats.completions == 1 {
            self.completed += 1;
            info!("pid={} end-of-ref ({}/{} finished)", pid, self.completed, processes);
        } else {
            warn!("pid={} sent end-of-ref {} times", pid, stats.completions);
        }
        Ok(())
    }

    /// Number of distinct processes that have signaled end of stream
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Every process has finished
    pub fn is_finished(&self) -> bool {
        self.completed >= self.store.processes()
    }

    pub fn store(&self) -> &PageTableStore {
        &self.store
    }

    pub fn pool(&self) -> &FreeFramePool {
        &self.pool
    }

    pub fn clock(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn stats(&self) -> &[ProcessStats] {
        &self.stats
    }

    /// Check the frame accounting: every frame is either free or held by exactly
    /// one valid entry, never both, and free + resident == frames.
    pub fn check_invariants(&self) -> Result<()> {
        let frames = self.pool.capacity();
        let mut owner: Vec<Option<&'static str>> = vec![None; frames];

        for frame in self.pool.iter() {
            let slot = owner.get_mut(frame).ok_or(MemoryError::FrameOutOfRange { frame, frames })?;
            if slot.is_some() {
                return Err(MemoryError::InvariantViolated(format!(
                    "frame {} appears twice in the free pool",
                    frame
                )));
            }
            *slot = Some("pool");
        }

        for (pid, page, entry) in self.store.iter() {
            if !entry.valid {
                continue;
            }
            let frame = entry.frame.ok_or_else(|| {
                MemoryError::InvariantViolated(format!("pid={} page={} is valid without a frame", pid, page))
            })?;
            let slot = owner.get_mut(frame).ok_or(MemoryError::FrameOutOfRange { frame, frames })?;
            if let Some(holder) = *slot {
                return Err(MemoryError::InvariantViolated(format!(
                    "frame {} mapped by pid={} page={} is also held by the {}",
                    frame, pid, page, holder
                )));
            }
            *slot = Some("page tables");
        }

        let resident = self.store.resident_count();
        if self.pool.count() + resident != frames {
            return Err(MemoryError::InvariantViolated(format!(
                "free={} + resident={} != frames={}",
                self.pool.count(),
                resident,
                frames
            )));
        }
        Ok(())
    }
}
