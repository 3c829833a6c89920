pub mod config;
pub mod constants;
pub mod error;
pub mod eviction;
pub mod io;
pub mod memory;
pub mod mmu;
pub mod process;
pub mod protocol;
pub mod scheduler;
pub mod service;
pub mod sim;

// Re-export commonly used items for convenience
pub use constants::*;
pub use error::{MemoryError, SimError};
pub use mmu::{Mmu, Outcome};
pub use sim::{Simulation, SimulationReport};
