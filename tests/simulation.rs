use std::fs;

use vm_sim::config::SimConfig;
use vm_sim::eviction::select_local_victim;
use vm_sim::io::{write_results, ProcessSpec, Workload};
use vm_sim::memory::{FreeFramePool, PageTableStore};
use vm_sim::process::Termination;
use vm_sim::*;

fn workload(specs: &[(i32, &[i32])]) -> Workload {
    Workload {
        processes: specs
            .iter()
            .map(|(bound, refs)| ProcessSpec {
                bound: *bound,
                references: refs.to_vec(),
            })
            .collect(),
    }
}

fn config(processes: usize, pages: usize, frames: usize) -> SimConfig {
    SimConfig {
        processes,
        pages_per_process: pages,
        frames,
        ..SimConfig::default()
    }
}

#[test]
fn test_lru_victim_scenario() {
    // k=3, m=8, f=6; pid 1 faults in pages 3 and 5, then touches 3
    let mut store = PageTableStore::new(3, 8).unwrap();
    let mut pool = FreeFramePool::new(6).unwrap();
    let mut ts = 0;

    let fr1 = pool.alloc().unwrap();
    let fr2 = pool.alloc().unwrap();
    ts += 1;
    store.set_mapping(1, 3, fr1, ts).unwrap();
    ts += 1;
    store.set_mapping(1, 5, fr2, ts).unwrap();
    ts += 1;
    store.touch(1, 3, ts).unwrap();

    assert_eq!(select_local_victim(&store, 1).unwrap(), Some(5));
    assert_eq!(pool.count() + store.resident_count(), 6);
}

#[test]
fn test_same_scenario_through_the_mmu() {
    let mut mmu = Mmu::new(3, 8, 6).unwrap();
    mmu.resolve(1, 3, 8).unwrap();
    mmu.resolve(1, 5, 8).unwrap();
    mmu.resolve(1, 3, 8).unwrap();
    assert_eq!(select_local_victim(mmu.store(), 1).unwrap(), Some(5));
    mmu.check_invariants().unwrap();
}

#[test]
fn test_zero_frames_is_unresolvable() {
    let report = Simulation::new(config(1, 4, 0), workload(&[(4, &[2, 3])]))
        .unwrap()
        .run()
        .unwrap();

    let process = &report.processes[0];
    assert_eq!(process.results, vec![UNRESOLVABLE_FAULT]);
    assert_eq!(process.termination, Termination::Unresolvable(2));
    assert_eq!(report.mmu.clock(), 0);
    assert_eq!(report.mmu.stats()[0].unresolvable, 1);
    // still completes so the MMU can shut down
    assert_eq!(report.mmu.completed(), 1);
}

#[test]
fn test_illegal_reference_ends_stream() {
    let report = Simulation::new(config(2, 8, 4), workload(&[(4, &[0, 1, 6, 2]), (8, &[6, 7])]))
        .unwrap()
        .run()
        .unwrap();

    // frame numbers depend on who was admitted first
    let results = &report.processes[0].results;
    assert_eq!(results.len(), 3);
    assert!(results[0] >= 0 && results[1] >= 0);
    assert_eq!(results[2], INVALID_PAGE);
    assert_eq!(report.processes[0].termination, Termination::IllegalPage(6));
    assert_eq!(report.processes[1].termination, Termination::Completed);
    assert_eq!(report.processes[1].results.len(), 2);
    assert_eq!(report.mmu.stats()[0].invalid_refs, 1);
    assert_eq!(report.scheduler.completed, 2);
}

#[test]
fn test_every_process_runs_once_fcfs() {
    let config = SimConfig {
        processes: 5,
        pages_per_process: 6,
        frames: 4,
        reference_length: 25,
        seed: Some(11),
        ..SimConfig::default()
    };
    let report = Simulation::from_config(config).unwrap().run().unwrap();

    let mut admitted = report.scheduler.admitted.clone();
    admitted.sort_unstable();
    assert_eq!(admitted, vec![0, 1, 2, 3, 4]);
    assert_eq!(report.scheduler.completed, 5);
    assert_eq!(report.mmu.completed(), 5);
    report.mmu.check_invariants().unwrap();

    for (pid, process) in report.processes.iter().enumerate() {
        assert_eq!(process.pid, pid);
        let stats = report.mmu.stats()[pid];
        // the scheduler saw exactly the faults the MMU handled
        assert_eq!(report.scheduler.faults[pid], stats.faults);
        assert_eq!(stats.completions, 1);
        assert_eq!(process.issued() as u64, stats.hits + stats.faults + stats.invalid_refs + stats.unresolvable);
    }
}

#[test]
fn test_clock_counts_only_legal_accesses() {
    let config = SimConfig {
        processes: 3,
        pages_per_process: 8,
        frames: 5,
        reference_length: 40,
        seed: Some(5),
        random_bounds: true,
        illegal_percent: 10,
    };
    let report = Simulation::from_config(config).unwrap().run().unwrap();
    let legal: u64 = report.mmu.stats().iter().map(|s| s.hits + s.faults).sum();
    assert_eq!(report.mmu.clock(), legal);
}

#[test]
fn test_frames_stay_accounted_under_pressure() {
    // more processes than frames: some processes will hit unresolvable faults
    let config = SimConfig {
        processes: 6,
        pages_per_process: 10,
        frames: 3,
        reference_length: 50,
        seed: Some(23),
        ..SimConfig::default()
    };
    let report = Simulation::from_config(config).unwrap().run().unwrap();
    let mmu = &report.mmu;
    mmu.check_invariants().unwrap();
    assert_eq!(mmu.pool().count() + mmu.store().resident_count(), 3);

    let mut frames: Vec<_> = mmu
        .store()
        .iter()
        .filter_map(|(_, _, e)| e.resident_frame())
        .chain(mmu.pool().iter())
        .collect();
    frames.sort_unstable();
    assert_eq!(frames, vec![0, 1, 2]);
}

#[test]
fn test_config_and_workload_files() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sim.toml");
    let workload_path = dir.path().join("refs.txt");
    let output_path = dir.path().join("out.txt");

    fs::write(&config_path, "processes = 2\npages_per_process = 4\nframes = 3\n").unwrap();
    fs::write(&workload_path, "# two processes\n4: 0 1 0\n2: 1 3\n").unwrap();

    let config = SimConfig::from_file(&config_path).unwrap();
    let workload = Workload::from_file(&workload_path).unwrap();
    let report = Simulation::new(config, workload).unwrap().run().unwrap();
    write_results(&output_path, &report.processes).unwrap();

    let lines: Vec<String> = fs::read_to_string(&output_path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), 2);
    // pid 1 gets a frame for page 1, then asks for page 3 with bound 2
    assert!(lines[1].ends_with(&INVALID_PAGE.to_string()), "{:?}", lines);
    assert_eq!(lines[0].split_whitespace().count(), 3);
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = SimConfig::from_file(dir.path().join("nope.toml"));
    assert!(matches!(result, Err(SimError::Io { .. })));
}
