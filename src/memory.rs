use crate::constants::*;
use crate::error::{MemoryError, Result};

/// One slot of a process page table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageTableEntry {
    pub frame: Option<FrameId>,
    pub valid: bool,
    pub last_used: Timestamp,
}

impl PageTableEntry {
    /// Frame held by this entry, only if the entry is valid
    #[inline]
    pub fn resident_frame(&self) -> Option<FrameId> {
        if self.valid { self.frame } else { None }
    }
}

/// Page table of a single process: `pages_per_process` entries indexed by page number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    entries: Vec<PageTableEntry>,
}

impl PageTable {
    fn new(pages: usize) -> Self {
        PageTable {
            entries: vec![PageTableEntry::default(); pages],
        }
    }

    pub fn entries(&self) -> &[PageTableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries currently holding a frame
    pub fn resident_count(&self) -> usize {
        self.entries.iter().filter(|e| e.valid).count()
    }
}

/// All process page tables, allocated up front and owned by the MMU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTableStore {
    tables: Vec<PageTable>,
    pages_per_process: usize,
}

impl PageTableStore {
    /// Allocate `processes` tables of `pages_per_process` invalid entries each
    pub fn new(processes: usize, pages_per_process: usize) -> Result<Self> {
        if processes == 0 || pages_per_process == 0 {
            return Err(MemoryError::InvalidDimensions(format!(
                "processes={} pages_per_process={} (both must be > 0)",
                processes, pages_per_process
            )));
        }
        if processes > MAX_PROCESSES || pages_per_process > MAX_PAGES_PER_PROCESS {
            return Err(MemoryError::InvalidDimensions(format!(
                "processes={} pages_per_process={} exceeds cap {}x{}",
                processes, pages_per_process, MAX_PROCESSES, MAX_PAGES_PER_PROCESS
            )));
        }

        let tables = (0..processes).map(|_| PageTable::new(pages_per_process)).collect();
        Ok(PageTableStore { tables, pages_per_process })
    }

    #[inline]
    pub fn processes(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub fn pages_per_process(&self) -> usize {
        self.pages_per_process
    }

    /// Page table of `pid`
    pub fn table(&self, pid: Pid) -> Result<&PageTable> {
        self.tables.get(pid).ok_or(MemoryError::ProcessOutOfRange {
            pid,
            processes: self.tables.len(),
        })
    }

    /// Read a Page Table entry
    pub fn entry(&self, pid: Pid, page: PageNo) -> Result<&PageTableEntry> {
        let pages = self.pages_per_process;
        self.table(pid)?
            .entries
            .get(page)
            .ok_or(MemoryError::PageOutOfRange { page, pages })
    }

    fn entry_mut(&mut self, pid: Pid, page: PageNo) -> Result<&mut PageTableEntry> {
        let pages = self.pages_per_process;
        let processes = self.tables.len();
        self.tables
            .get_mut(pid)
            .ok_or(MemoryError::ProcessOutOfRange { pid, processes })?
            .entries
            .get_mut(page)
            .ok_or(MemoryError::PageOutOfRange { page, pages })
    }

    /// Map `page` of `pid` to `frame`, stamped with `ts`.
    ///
    /// Frame ownership is not checked here: the caller must hand over a frame
    /// it just took from the pool or just unmapped.
    pub fn set_mapping(&mut self, pid: Pid, page: PageNo, frame: FrameId, ts: Timestamp) -> Result<()> {
        let entry = self.entry_mut(pid, page)?;
        entry.frame = Some(frame);
        entry.valid = true;
        entry.last_used = ts;
        Ok(())
    }

    /// Unmap `page` of `pid`. The frame is *not* returned to any pool.
    pub fn invalidate(&mut self, pid: Pid, page: PageNo) -> Result<()> {
        let entry = self.entry_mut(pid, page)?;
        entry.frame = None;
        entry.valid = false;
        Ok(())
    }

    /// Record an access to a mapped page
    pub fn touch(&mut self, pid: Pid, page: PageNo, ts: Timestamp) -> Result<()> {
        let entry = self.entry_mut(pid, page)?;
        if !entry.valid {
            return Err(MemoryError::NotMapped { pid, page });
        }
        entry.last_used = ts;
        Ok(())
    }

    /// `0 <= page < bound`. The bound comes with each request, the store keeps none.
    #[inline]
    pub fn is_legal(page: i64, bound: i64) -> bool {
        page >= 0 && page < bound
    }

    /// Every entry in flat `pid * pages_per_process + page` order
    pub fn iter(&self) -> impl Iterator<Item = (Pid, PageNo, &PageTableEntry)> + '_ {
        self.tables.iter().enumerate().flat_map(|(pid, table)| {
            table.entries.iter().enumerate().map(move |(page, entry)| (pid, page, entry))
        })
    }

    /// Number of valid entries across all tables
    pub fn resident_count(&self) -> usize {
        self.tables.iter().map(PageTable::resident_count).sum()
    }
}

/// Free frames kept in a fixed ring buffer, recycled FIFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeFramePool {
    frames: Vec<FrameId>,
    capacity: usize,
    count: usize,
    head: usize,
    tail: usize,
}

impl FreeFramePool {
    /// Pool pre-filled with frames `0..capacity`. A zero-capacity pool is legal and always empty.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity > MAX_FRAMES {
            return Err(MemoryError::InvalidDimensions(format!(
                "frames={} exceeds cap {}",
                capacity, MAX_FRAMES
            )));
        }
        Ok(FreeFramePool {
            frames: (0..capacity).collect(),
            capacity,
            count: capacity,
            head: 0,
            // ring is full, so the next write position wraps back onto head
            tail: 0,
        })
    }

    /// Pop the frame at the head of the ring
    pub fn alloc(&mut self) -> Result<FrameId> {
        if self.count == 0 {
            return Err(MemoryError::PoolEmpty);
        }
        let frame = self.frames[self.head];
        self.head = (self.head + 1) % self.capacity;
        self.count -= 1;
        Ok(frame)
    }

    /// Push `frame` at the tail of the ring
    pub fn free(&mut self, frame: FrameId) -> Result<()> {
        if frame >= self.capacity {
            return Err(MemoryError::FrameOutOfRange {
                frame,
                frames: self.capacity,
            });
        }
        if self.count == self.capacity {
            return Err(MemoryError::PoolFull);
        }
        self.frames[self.tail] = frame;
        self.tail = (self.tail + 1) % self.capacity;
        self.count += 1;
        Ok(())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Free frames in the order `alloc` would hand them out
    pub fn iter(&self) -> impl Iterator<Item = FrameId> + '_ {
        (0..self.count).map(move |i| self.frames[(self.head + i) % self.capacity])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_initialization() {
        let store = PageTableStore::new(3, 8).unwrap();
        assert_eq!(store.processes(), 3);
        assert_eq!(store.pages_per_process(), 8);
        assert_eq!(store.iter().count(), 24);
        for (_, _, entry) in store.iter() {
            assert_eq!(*entry, PageTableEntry { frame: None, valid: false, last_used: 0 });
        }
        assert_eq!(store.resident_count(), 0);
    }

    #[test]
    fn test_store_rejects_zero_dimensions() {
        assert!(matches!(PageTableStore::new(0, 8), Err(MemoryError::InvalidDimensions(_))));
        assert!(matches!(PageTableStore::new(3, 0), Err(MemoryError::InvalidDimensions(_))));
    }

    #[test]
    fn test_set_mapping_and_invalidate() {
        let mut store = PageTableStore::new(3, 8).unwrap();
        store.set_mapping(1, 5, 4, 7).unwrap();

        let entry = store.entry(1, 5).unwrap();
        assert_eq!(entry.frame, Some(4));
        assert!(entry.valid);
        assert_eq!(entry.last_used, 7);
        assert_eq!(entry.resident_frame(), Some(4));
        assert_eq!(store.table(1).unwrap().resident_count(), 1);

        // neighbours untouched
        assert!(!store.entry(1, 4).unwrap().valid);
        assert!(!store.entry(0, 5).unwrap().valid);
        assert!(!store.entry(2, 5).unwrap().valid);

        store.invalidate(1, 5).unwrap();
        let entry = store.entry(1, 5).unwrap();
        assert_eq!(entry.frame, None);
        assert!(!entry.valid);
        assert_eq!(entry.resident_frame(), None);
    }

    #[test]
    fn test_flat_iteration_order() {
        let mut store = PageTableStore::new(2, 4).unwrap();
        store.set_mapping(1, 2, 0, 1).unwrap();
        let flat: Vec<(Pid, PageNo)> = store.iter().map(|(pid, page, _)| (pid, page)).collect();
        assert_eq!(flat[0], (0, 0));
        assert_eq!(flat[4], (1, 0));
        // pid * m + page
        let (pid, page, entry) = store.iter().nth(1 * 4 + 2).unwrap();
        assert_eq!((pid, page), (1, 2));
        assert!(entry.valid);
    }

    #[test]
    fn test_bounds_checked_access() {
        let mut store = PageTableStore::new(2, 4).unwrap();
        assert_eq!(
            store.set_mapping(2, 0, 0, 1),
            Err(MemoryError::ProcessOutOfRange { pid: 2, processes: 2 })
        );
        assert_eq!(
            store.set_mapping(0, 4, 0, 1),
            Err(MemoryError::PageOutOfRange { page: 4, pages: 4 })
        );
        assert!(store.invalidate(5, 0).is_err());
        assert!(store.entry(0, 99).is_err());
    }

    #[test]
    fn test_touch_requires_mapping() {
        let mut store = PageTableStore::new(1, 4).unwrap();
        assert_eq!(store.touch(0, 1, 3), Err(MemoryError::NotMapped { pid: 0, page: 1 }));
        // failed touch leaves the entry alone
        assert_eq!(store.entry(0, 1).unwrap().last_used, 0);

        store.set_mapping(0, 1, 2, 3).unwrap();
        store.touch(0, 1, 9).unwrap();
        assert_eq!(store.entry(0, 1).unwrap().last_used, 9);
        assert_eq!(store.entry(0, 1).unwrap().frame, Some(2));
    }

    #[test]
    fn test_is_legal() {
        assert!(PageTableStore::is_legal(0, 1));
        assert!(PageTableStore::is_legal(7, 8));
        assert!(!PageTableStore::is_legal(8, 8));
        assert!(!PageTableStore::is_legal(-1, 8));
        assert!(!PageTableStore::is_legal(0, 0));
        // bound is per call: same page, different answers
        assert!(!PageTableStore::is_legal(5, 4));
        assert!(PageTableStore::is_legal(5, 6));
    }

    #[test]
    fn test_pool_initialization() {
        let pool = FreeFramePool::new(6).unwrap();
        assert_eq!(pool.capacity(), 6);
        assert_eq!(pool.count(), 6);
        assert_eq!(pool.head(), 0);
        assert_eq!(pool.tail(), 0);
        assert_eq!(pool.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_pool_alloc_until_empty() {
        let mut pool = FreeFramePool::new(3).unwrap();
        assert_eq!(pool.alloc(), Ok(0));
        assert_eq!(pool.alloc(), Ok(1));
        assert_eq!(pool.alloc(), Ok(2));
        assert!(pool.is_empty());
        assert_eq!(pool.alloc(), Err(MemoryError::PoolEmpty));
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_pool_fifo_recycling() {
        let mut pool = FreeFramePool::new(3).unwrap();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.free(b).unwrap();
        pool.free(a).unwrap();
        // 2 was never handed out, then b, then a
        assert_eq!(pool.iter().collect::<Vec<_>>(), vec![2, b, a]);
        assert_eq!(pool.alloc(), Ok(2));
        assert_eq!(pool.alloc(), Ok(b));
        assert_eq!(pool.alloc(), Ok(a));
    }

    #[test]
    fn test_pool_free_rejects_full_and_out_of_range() {
        let mut pool = FreeFramePool::new(2).unwrap();
        assert_eq!(pool.free(0), Err(MemoryError::PoolFull));
        assert_eq!(pool.free(2), Err(MemoryError::FrameOutOfRange { frame: 2, frames: 2 }));
        pool.alloc().unwrap();
        assert_eq!(pool.free(7), Err(MemoryError::FrameOutOfRange { frame: 7, frames: 2 }));
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn test_zero_capacity_pool() {
        let mut pool = FreeFramePool::new(0).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.alloc(), Err(MemoryError::PoolEmpty));
        assert!(pool.free(0).is_err());
        assert_eq!(pool.iter().count(), 0);
    }
}
