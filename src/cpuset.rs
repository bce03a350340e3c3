use std::str::FromStr;

pub mod prelude {
    pub use super::{
        CpuSet,
        set_affinity,
        get_affinity,
    };
}

const ONLINE_CPUS_PATH: &'static str = "/sys/devices/system/cpu/online";

#[derive(Debug)]
#[derive(Clone)]
#[derive(PartialEq, Eq)]
pub struct CpuSet {
    cpus: Vec<u32>,
}

impl CpuSet {
    pub fn single(cpu: u32) -> CpuSet {
        CpuSet { cpus: vec![cpu] }
    }

    /// CPUs currently online, as reported by sysfs.
    pub fn online() -> Result<CpuSet, String> {
        let online_cpus = std::fs::read_to_string(ONLINE_CPUS_PATH)
            .map_err(|err| format!("Error in reading {ONLINE_CPUS_PATH}: {err}"))?;

        CpuSet::from_str(&online_cpus)
    }

    pub fn contains(&self, cpu: u32) -> bool {
        self.cpus.contains(&cpu)
    }

    pub fn cpus(&self) -> &[u32] {
        &self.cpus
    }
}

impl FromStr for CpuSet {
    type Err = String;

    /// Parses the kernel cpu-list format, e.g. `0-3,5,7-8`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use nom::Parser;
        use nom::bytes::complete::*;
        use nom::branch::*;
        use nom::multi::*;
        use nom::character::complete::*;
        use nom::combinator::*;

        let single_parser = || map_res(digit1::<&str, ()>, |s: &str| s.parse::<u32>());
        let single_parser_pair = map(single_parser(), |cpu| (cpu, cpu));
        let range_parser = map_res(
            (
                single_parser(),
                tag("-"),
                single_parser()
            ),
            |(min, _, max)| {
                if min > max {
                    Err(format!("Range error"))
                } else {
                    Ok((min, max))
                }
            }
        );

        let separator_parser = map((tag(","), multispace0), |_| ());
        let mut parser = all_consuming(map(
            separated_list1(
                separator_parser,
                alt((range_parser, single_parser_pair))
            ),
            |pairs: Vec<(u32, u32)>| {
                let mut out: Vec<u32> = pairs.into_iter()
                    .flat_map(|(min, max)| min ..= max)
                    .collect();
                out.sort_unstable();
                out.dedup();
                out
            }
        ));

        Ok(CpuSet {
            cpus: parser.parse(s.trim()).map_err(|err| format!("Invalid cpu list \"{}\": {err}", s.trim()))?.1,
        })
    }
}

impl std::fmt::Display for CpuSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cpus: Vec<_> = self.cpus.iter().map(|cpu| cpu.to_string()).collect();
        write!(f, "{{{}}}", cpus.join(","))
    }
}

impl From<&CpuSet> for scheduler::CpuSet {
    fn from(cpuset: &CpuSet) -> Self {
        let mut out = scheduler::CpuSet::new(0);
        cpuset.cpus.iter()
            .for_each(|cpu| out.set(*cpu as usize));

        out
    }
}

/// Restricts `pid` (0 for the caller) to the given CPUs.
pub fn set_affinity(pid: u32, cpu_set: &CpuSet) -> Result<(), std::io::Error> {
    scheduler::set_affinity(pid as i32, cpu_set.into())
        .map_err(|_| std::io::Error::last_os_error())?;

    log::debug!("Changed CPU affinity of pid {pid} to {cpu_set}");

    Ok(())
}

pub fn get_affinity(pid: u32) -> Result<CpuSet, std::io::Error> {
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };

    let res = unsafe {
        libc::sched_getaffinity(
            pid                                     as libc::pid_t,
            std::mem::size_of::<libc::cpu_set_t>(),
            &mut set                                as *mut libc::cpu_set_t,
        )
    };

    if res != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let cpus = (0..libc::CPU_SETSIZE as usize)
        .filter(|cpu| unsafe { libc::CPU_ISSET(*cpu, &set) })
        .map(|cpu| cpu as u32)
        .collect();

    Ok(CpuSet { cpus })
}
