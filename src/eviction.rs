//! Local LRU victim selection.
//!
//! Replacement only ever looks at the faulting process's own table. Other
//! processes' frames are never candidates.

use crate::constants::{PageNo, Pid, Timestamp};
use crate::error::Result;
use crate::memory::PageTableStore;

/// Least recently used valid page of `pid`, or `None` when the process has no resident pages.
///
/// Ties go to the lowest page number: the running minimum is only replaced on a
/// strictly smaller timestamp.
pub fn select_local_victim(store: &PageTableStore, pid: Pid) -> Result<Option<PageNo>> {
    let table = store.table(pid)?;
    let mut victim: Option<(PageNo, Timestamp)> = None;

    for (page, entry) in table.entries().iter().enumerate() {
        if !entry.valid {
            continue;
        }
        match victim {
            Some((_, oldest)) if entry.last_used >= oldest => {}
            _ => victim = Some((page, entry.last_used)),
        }
    }

    Ok(victim.map(|(page, _)| page))
}
