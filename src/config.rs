//! Simulation configuration, loaded from TOML and overridable from the CLI.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::SimError;
use crate::io::{ProcessSpec, Workload};

/// Dimensions of the simulated machine plus how to generate reference strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// k: number of processes
    pub processes: usize,
    /// m: virtual pages per process
    pub pages_per_process: usize,
    /// f: physical frames
    pub frames: usize,
    /// references generated per process
    pub reference_length: usize,
    /// RNG seed; unseeded runs draw from entropy
    pub seed: Option<u64>,
    /// draw each process's bound from `1..=m` instead of using `m`
    pub random_bounds: bool,
    /// chance, in percent, that a generated reference lands past the bound
    pub illegal_percent: u8,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            processes: DEFAULT_PROCESSES,
            pages_per_process: DEFAULT_PAGES_PER_PROCESS,
            frames: DEFAULT_FRAMES,
            reference_length: DEFAULT_REFERENCE_LENGTH,
            seed: None,
            random_bounds: false,
            illegal_percent: 0,
        }
    }
}

impl SimConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SimError> {
        let config: SimConfig =
            toml::from_str(content).map_err(|e| SimError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.processes == 0 || self.processes > MAX_PROCESSES {
            return Err(SimError::Config(format!(
                "processes must be in 1..={}, got {}",
                MAX_PROCESSES, self.processes
            )));
        }
        if self.pages_per_process == 0 || self.pages_per_process > MAX_PAGES_PER_PROCESS {
            return Err(SimError::Config(format!(
                "pages_per_process must be in 1..={}, got {}",
                MAX_PAGES_PER_PROCESS, self.pages_per_process
            )));
        }
        if self.frames > MAX_FRAMES {
            return Err(SimError::Config(format!(
                "frames must be at most {}, got {}",
                MAX_FRAMES, self.frames
            )));
        }
        if self.illegal_percent > 100 {
            return Err(SimError::Config(format!(
                "illegal_percent must be at most 100, got {}",
                self.illegal_percent
            )));
        }
        Ok(())
    }

    /// Generate one reference string per process
    pub fn generate_workload(&self) -> Workload {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let m = self.pages_per_process as i32;

        let processes = (0..self.processes)
            .map(|_| {
                let bound = if self.random_bounds { rng.gen_range(1..=m) } else { m };
                let references = (0..self.reference_length)
                    .map(|_| {
                        if rng.gen_range(0..100u8) < self.illegal_percent {
                            rng.gen_range(bound..bound + 2)
                        } else {
                            rng.gen_range(0..m)
                        }
                    })
                    .collect();
                ProcessSpec { bound, references }
            })
            .collect();

        Workload { processes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.processes, 3);
        assert_eq!(config.pages_per_process, 8);
        assert_eq!(config.frames, 6);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_partial_file() {
        let config = SimConfig::parse("processes = 4\nframes = 0\nseed = 7\n").unwrap();
        assert_eq!(config.processes, 4);
        assert_eq!(config.frames, 0);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.pages_per_process, DEFAULT_PAGES_PER_PROCESS);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(matches!(SimConfig::parse("processes = 0"), Err(SimError::Config(_))));
        assert!(matches!(SimConfig::parse("pages_per_process = 0"), Err(SimError::Config(_))));
        assert!(matches!(SimConfig::parse("illegal_percent = 101"), Err(SimError::Config(_))));
        assert!(matches!(SimConfig::parse("frobnicate = 1"), Err(SimError::Config(_))));
        assert!(matches!(SimConfig::parse("processes = \"three\""), Err(SimError::Config(_))));
    }

    #[test]
    fn test_seeded_workload_is_deterministic() {
        let config = SimConfig {
            seed: Some(42),
            random_bounds: true,
            illegal_percent: 20,
            ..SimConfig::default()
        };
        assert_eq!(config.generate_workload(), config.generate_workload());
    }

    #[test]
    fn test_workload_shape() {
        let config = SimConfig {
            processes: 4,
            pages_per_process: 5,
            reference_length: 30,
            seed: Some(1),
            ..SimConfig::default()
        };
        let workload = config.generate_workload();
        assert_eq!(workload.processes.len(), 4);
        for spec in &workload.processes {
            assert_eq!(spec.bound, 5);
            assert_eq!(spec.references.len(), 30);
            assert!(spec.references.iter().all(|&r| (0..5).contains(&r)));
        }
    }

    #[test]
    fn test_illegal_references_exceed_bound() {
        let config = SimConfig {
            processes: 2,
            illegal_percent: 100,
            seed: Some(3),
            ..SimConfig::default()
        };
        for spec in config.generate_workload().processes {
            assert!(spec.references.iter().all(|&r| r >= spec.bound));
        }
    }

    #[test]
    fn test_random_bounds_within_table() {
        let config = SimConfig {
            processes: 50,
            random_bounds: true,
            seed: Some(9),
            ..SimConfig::default()
        };
        for spec in config.generate_workload().processes {
            assert!((1..=8).contains(&spec.bound));
        }
    }
}
