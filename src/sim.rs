//! Wires the MMU, the scheduler and the process actors together and runs
//! them to completion, one thread each.

use std::thread::{self, JoinHandle};

use crossbeam_channel::unbounded;
use log::{error, info};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::io::Workload;
use crate::mmu::Mmu;
use crate::process::{ActorChannels, ProcessActor, ProcessReport};
use crate::scheduler::{Scheduler, SchedulerReport};
use crate::service::MmuService;

/// Everything a finished run produced
#[derive(Debug)]
pub struct SimulationReport {
    /// Final MMU state, page tables and pool included
    pub mmu: Mmu,
    pub scheduler: SchedulerReport,
    /// Indexed by pid
    pub processes: Vec<ProcessReport>,
}

pub struct Simulation {
    config: SimConfig,
    workload: Workload,
}

impl Simulation {
    /// One process per workload entry; `config.processes` must agree with it
    pub fn new(config: SimConfig, workload: Workload) -> Result<Self, SimError> {
        config.validate()?;
        if workload.len() != config.processes {
            return Err(SimError::Config(format!(
                "workload describes {} processes, config expects {}",
                workload.len(),
                config.processes
            )));
        }
        Ok(Simulation { config, workload })
    }

    /// Generate the workload from the config
    pub fn from_config(config: SimConfig) -> Result<Self, SimError> {
        let workload = config.generate_workload();
        Self::new(config, workload)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn workload(&self) -> &Workload {
        &self.workload
    }

    pub fn run(self) -> Result<SimulationReport, SimError> {
        let config = self.config;
        info!(
            "Starting simulation: processes={} pages_per_process={} frames={}",
            config.processes, config.pages_per_process, config.frames
        );
        let mmu = Mmu::new(config.processes, config.pages_per_process, config.frames)?;

        let (request_tx, request_rx) = unbounded();
        let (note_tx, note_rx) = unbounded();
        let (ready_tx, ready_rx) = unbounded();

        let mut reply_txs = Vec::with_capacity(config.processes);
        let mut admission_txs = Vec::with_capacity(config.processes);
        let mut actors = Vec::with_capacity(config.processes);
        for (pid, spec) in self.workload.processes.into_iter().enumerate() {
            let (reply_tx, reply_rx) = unbounded();
            let (admission_tx, admission_rx) = unbounded();
            reply_txs.push(reply_tx);
            admission_txs.push(admission_tx);

            let channels = ActorChannels {
                ready: ready_tx.clone(),
                admission: admission_rx,
                requests: request_tx.clone(),
                replies: reply_rx,
            };
            let actor = ProcessActor::new(pid, spec.references, spec.bound);
            actors.push(spawn_named(format!("process-{}", pid), move || actor.run(channels))?);
        }
        // only the actors hold these now, so a dead actor set shows up as a disconnect
        drop(ready_tx);
        drop(request_tx);

        let mmu_thread = spawn_named("mmu".to_string(), move || {
            MmuService::new(mmu, request_rx, reply_txs, note_tx).run()
        })?;
        let scheduler_thread = spawn_named("scheduler".to_string(), move || {
            Scheduler::new(ready_rx, admission_txs, note_rx).run()
        })?;

        let mmu = join(mmu_thread);
        let scheduler = join(scheduler_thread);
        let processes: Vec<_> = actors.into_iter().map(join).collect();

        // the MMU failing first is what usually disconnects everyone else
        let mmu = mmu?;
        let scheduler = scheduler?;
        let processes = processes.into_iter().collect::<Result<Vec<_>, _>>()?;

        mmu.check_invariants()?;
        info!("Simulation finished, {} frames free", mmu.pool().count());
        Ok(SimulationReport {
            mmu,
            scheduler,
            processes,
        })
    }
}

fn spawn_named<T, F>(name: String, f: F) -> Result<(String, JoinHandle<Result<T, SimError>>), SimError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SimError> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|source| SimError::Spawn {
            name: name.clone(),
            source,
        })?;
    Ok((name, handle))
}

fn join<T>((name, handle): (String, JoinHandle<Result<T, SimError>>)) -> Result<T, SimError> {
    match handle.join() {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!("{} failed: {}", name, e);
            Err(e)
        }
        Err(_) => Err(SimError::ThreadPanicked(name)),
    }
}
