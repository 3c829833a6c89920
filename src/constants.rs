// reply/request codes shared by the actors, the MMU and the scheduler.
// Non-negative reply values are frame numbers, so every sentinel is negative
// and no two sentinels overlap.
pub const END_OF_STREAM: i32 = -9;
pub const INVALID_PAGE: i32 = -2;
pub const UNRESOLVABLE_FAULT: i32 = -3;

pub const DEFAULT_PROCESSES: usize = 3;
pub const DEFAULT_PAGES_PER_PROCESS: usize = 8;
pub const DEFAULT_FRAMES: usize = 6;
pub const DEFAULT_REFERENCE_LENGTH: usize = 10;

// sanity caps, mostly so a typo in a config file doesn't allocate gigabytes
pub const MAX_PROCESSES: usize = 256;
pub const MAX_PAGES_PER_PROCESS: usize = 4096;
pub const MAX_FRAMES: usize = 1 << 20;

/// Physical frame identifier, `0..frames`
pub type FrameId = usize;
/// Process index, `0..processes`
pub type Pid = usize;
/// Virtual page number inside one process, `0..pages_per_process`
pub type PageNo = usize;
/// Value of the MMU's global access clock
pub type Timestamp = u64;
