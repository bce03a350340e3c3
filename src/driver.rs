use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;

use crate::cpuset::{CpuSet, get_affinity, set_affinity};
use crate::error::LoadError;
use crate::process::policy::{SchedPolicy, SchedPolicyError, fifo_priority_range, get_scheduler, set_scheduler};
use crate::timerlat::{DEFAULT_DATA_SOURCE, DEFAULT_TRACING_DIR, open_data_source, open_timerlat_fd};
use crate::utils::ExitFlag;

pub mod prelude {
    pub use super::{
        DEFAULT_LOAD_SIZE,
        LoadConfig,
        LoadResources,
        LoadSummary,
        cpu_index,
        fifo_priority,
        configure_context,
        acquire,
        run_load_loop,
    };
}

/// Bytes read from the data source on every activation.
pub const DEFAULT_LOAD_SIZE: usize = 20 * 1024 * 1024;

#[derive(Debug)]
#[derive(Clone)]
pub struct LoadConfig {
    pub cpu: u32,
    pub priority: Option<i64>,
    pub load_size: usize,
    pub tracing_dir: PathBuf,
    pub data_source: PathBuf,
    pub max_time: Option<u64>,
}

impl LoadConfig {
    pub fn new(cpu: u32) -> Self {
        LoadConfig {
            cpu,
            priority: None,
            load_size: DEFAULT_LOAD_SIZE,
            tracing_dir: PathBuf::from(DEFAULT_TRACING_DIR),
            data_source: PathBuf::from(DEFAULT_DATA_SOURCE),
            max_time: None,
        }
    }
}

/// Checks a CPU index as given on the command line.
pub fn cpu_index(cpu: i64) -> Result<u32, LoadError> {
    u32::try_from(cpu)
        .map_err(|_| LoadError::Affinity(format!("Invalid CPU index {cpu}")))
}

/// Checks a SCHED_FIFO priority as given on the command line.
/// `configure_context` runs it after the affinity change.
pub fn fifo_priority(priority: i64) -> Result<i32, LoadError> {
    let range = fifo_priority_range()?;

    match i32::try_from(priority) {
        Ok(priority) if range.contains(&priority) => Ok(priority),
        _ => Err(SchedPolicyError::PriorityOutOfRange {
            priority: priority.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            range,
        }.into()),
    }
}

/// The two handles the loop runs on. Dropping this closes both.
pub struct LoadResources {
    pub timerlat: File,
    pub data: File,
}

#[derive(Debug)]
#[derive(Clone, Copy)]
#[derive(PartialEq, Eq)]
pub struct LoadSummary {
    pub activations: u64,
    pub bytes_read: u64,
    pub elapsed: Duration,
}

impl std::fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} activations, {} MiB read in {:.2?}",
            self.activations, self.bytes_read / (1024 * 1024), self.elapsed)
    }
}

/// Pins the calling process to `config.cpu` and, if a priority is given,
/// switches it to SCHED_FIFO. Both changes are read back.
pub fn configure_context(config: &LoadConfig) -> Result<(), LoadError> {
    let online = CpuSet::online().map_err(LoadError::Affinity)?;
    if !online.contains(config.cpu) {
        return Err(LoadError::Affinity(format!("CPU {} is not online (online CPUs: {online})", config.cpu)));
    }

    let wanted = CpuSet::single(config.cpu);
    set_affinity(0, &wanted)
        .map_err(|err| LoadError::Affinity(err.to_string()))?;

    let actual = get_affinity(0)
        .map_err(|err| LoadError::Affinity(err.to_string()))?;
    if actual != wanted {
        return Err(LoadError::Affinity(format!("requested {wanted}, but the process runs on {actual}")));
    }

    match config.priority {
        Some(prio) => {
            let wanted = SchedPolicy::FIFO(fifo_priority(prio)?);
            set_scheduler(0, wanted)?;

            let found = get_scheduler(0)?;
            if found != wanted {
                return Err(SchedPolicyError::NotApplied { expected: wanted, found }.into());
            }
        },
        None => match get_scheduler(0) {
            Ok(policy) => log::debug!("No priority given, keeping {policy}"),
            Err(err) => log::debug!("No priority given, cannot read the scheduling policy: {err}"),
        },
    };

    Ok(())
}

pub fn acquire(config: &LoadConfig) -> Result<LoadResources, LoadError> {
    let timerlat = open_timerlat_fd(&config.tracing_dir, config.cpu)?;
    let data = open_data_source(&config.data_source)?;

    Ok(LoadResources { timerlat, data })
}

/// Waits for an activation on `notify`, then reads `load_size` bytes from
/// `data`, until `exit` is raised or `deadline` fires. Either flag is only
/// checked between iterations.
pub fn run_load_loop<N: Read, D: Read>(
    notify: &mut N,
    data: &mut D,
    load_size: usize,
    exit: &ExitFlag,
    deadline: &Receiver<Instant>,
) -> Result<LoadSummary, LoadError> {
    let start = Instant::now();
    let mut buf = vec![0u8; load_size];
    let mut unit = [0u8; 1];
    let mut summary = LoadSummary { activations: 0, bytes_read: 0, elapsed: Duration::ZERO };

    loop {
        if exit.is_exit() || deadline.try_recv().is_ok() {
            break;
        }

        // timerlat_fd reports 0 bytes once the activation happened
        match notify.read(&mut unit) {
            Ok(_) => (),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };

        data.read_exact(&mut buf)?;

        summary.activations += 1;
        summary.bytes_read += load_size as u64;
        log::trace!("activation {} done", summary.activations);
    }

    summary.elapsed = start.elapsed();
    Ok(summary)
}
