use std::ops::RangeInclusive;

use libc::{syscall, pid_t, sched_attr, SYS_sched_setattr, SYS_sched_getattr};

pub mod prelude {
    pub use super::{
        SchedPolicy,
        SchedPolicyError,
        set_scheduler,
        get_scheduler,
        fifo_priority_range,
    };
}

#[derive(Debug)]
#[derive(Clone, Copy)]
#[derive(PartialEq, Eq)]
pub enum SchedPolicy {
    OTHER { nice: i32 },
    BATCH { nice: i32 },
    IDLE,
    FIFO(i32),
    RR(i32),
}

impl std::fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedPolicy::OTHER { nice } => write!(f, "SCHED_OTHER (nice {nice})"),
            SchedPolicy::BATCH { nice } => write!(f, "SCHED_BATCH (nice {nice})"),
            SchedPolicy::IDLE => write!(f, "SCHED_IDLE"),
            SchedPolicy::FIFO(prio) => write!(f, "SCHED_FIFO (priority {prio})"),
            SchedPolicy::RR(prio) => write!(f, "SCHED_RR (priority {prio})"),
        }
    }
}

#[derive(Debug)]
pub enum SchedPolicyError {
    SyscallError(std::io::Error),
    UnknownPolicyError(i32),
    PriorityOutOfRange { priority: i32, range: RangeInclusive<i32> },
    NotApplied { expected: SchedPolicy, found: SchedPolicy },
}

impl std::fmt::Display for SchedPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedPolicyError::SyscallError(error)
                => write!(f, "{error}"),
            SchedPolicyError::UnknownPolicyError(policy)
                => write!(f, "Unknown Policy: {policy}"),
            SchedPolicyError::PriorityOutOfRange { priority, range }
                => write!(f, "Priority {priority} outside of the SCHED_FIFO range {}-{}", range.start(), range.end()),
            SchedPolicyError::NotApplied { expected, found }
                => write!(f, "Requested {expected}, but the task runs with {found}"),
        }
    }
}

impl std::error::Error for SchedPolicyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchedPolicyError::SyscallError(error) => Some(error),
            _ => None,
        }
    }
}

impl TryFrom<sched_attr> for SchedPolicy {
    type Error = SchedPolicyError;

    fn try_from(value: sched_attr) -> Result<Self, Self::Error> {
        let res = match value.sched_policy as i32 {
            libc::SCHED_OTHER => SchedPolicy::OTHER { nice: value.sched_nice },
            libc::SCHED_BATCH => SchedPolicy::BATCH { nice: value.sched_nice },
            libc::SCHED_IDLE => SchedPolicy::IDLE,
            libc::SCHED_FIFO => SchedPolicy::FIFO( value.sched_priority as i32 ),
            libc::SCHED_RR => SchedPolicy::RR( value.sched_priority as i32 ),
            val => { return Err(SchedPolicyError::UnknownPolicyError(val)); }
        };

        Ok(res)
    }
}

impl From<SchedPolicy> for sched_attr {
    fn from(policy: SchedPolicy) -> sched_attr {
        let (sched_policy, sched_nice, sched_priority) = match policy {
            SchedPolicy::OTHER { nice } => (libc::SCHED_OTHER, nice, 0),
            SchedPolicy::BATCH { nice } => (libc::SCHED_BATCH, nice, 0),
            SchedPolicy::IDLE => (libc::SCHED_IDLE, 0, 0),
            SchedPolicy::FIFO(prio) => (libc::SCHED_FIFO, 0, prio),
            SchedPolicy::RR(prio) => (libc::SCHED_RR, 0, prio),
        };

        sched_attr {
            size: std::mem::size_of::<sched_attr>() as u32,
            sched_policy: sched_policy as u32,
            sched_flags: 0,
            sched_nice,
            sched_priority: sched_priority as u32,
            sched_runtime: 0,
            sched_deadline: 0,
            sched_period: 0,
        }
    }
}

/// Priorities accepted by the kernel for SCHED_FIFO, usually 1-99.
pub fn fifo_priority_range() -> Result<RangeInclusive<i32>, SchedPolicyError> {
    let (min, max) = unsafe {
        (libc::sched_get_priority_min(libc::SCHED_FIFO), libc::sched_get_priority_max(libc::SCHED_FIFO))
    };

    if min < 0 || max < 0 {
        Err(SchedPolicyError::SyscallError(std::io::Error::last_os_error()))
    } else {
        Ok(min ..= max)
    }
}

pub fn get_scheduler(pid: u32) -> Result<SchedPolicy, SchedPolicyError> {
    unsafe {
        let mut attr = sched_attr {
            size: 0,
            sched_policy: 0,
            sched_flags: 0,
            sched_nice: 0,
            sched_priority: 0,
            sched_runtime: 0,
            sched_deadline: 0,
            sched_period: 0,
        };

        let res =
            syscall(
                SYS_sched_getattr,
                pid                                 as pid_t,
                &mut attr                           as *mut sched_attr,
                std::mem::size_of::<sched_attr>()   as libc::c_uint,
                0                                   as libc::c_uint,
            );

        if res != 0 {
            Err(SchedPolicyError::SyscallError(std::io::Error::last_os_error()))
        } else {
            attr.try_into()
        }
    }
}

/// Switches `pid` (0 for the caller) to `policy`.
pub fn set_scheduler(pid: u32, policy: SchedPolicy) -> Result<(), SchedPolicyError> {
    if let SchedPolicy::FIFO(priority) = policy {
        let range = fifo_priority_range()?;
        if !range.contains(&priority) {
            return Err(SchedPolicyError::PriorityOutOfRange { priority, range });
        }
    }

    let attr: sched_attr = policy.into();

    let res = unsafe {
        syscall(
            SYS_sched_setattr,
            pid                         as pid_t,
            &attr                       as *const sched_attr,
            0                           as libc::c_uint,
        )
    };

    if res != 0 {
        return Err(SchedPolicyError::SyscallError(std::io::Error::last_os_error()));
    }

    log::debug!("Changed scheduling policy of pid {pid} to {policy}");

    Ok(())
}
