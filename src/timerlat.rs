use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

pub mod prelude {
    pub use super::{
        DEFAULT_TRACING_DIR,
        DEFAULT_DATA_SOURCE,
        timerlat_cpu_dir,
        timerlat_fd_path,
        current_tracer,
        open_timerlat_fd,
        open_data_source,
    };
}

pub const DEFAULT_TRACING_DIR: &'static str = "/sys/kernel/tracing";
pub const DEFAULT_DATA_SOURCE: &'static str = "/dev/full";

pub fn timerlat_cpu_dir(tracing_dir: &Path, cpu: u32) -> PathBuf {
    tracing_dir.join("osnoise").join("per_cpu").join(format!("cpu{cpu}"))
}

/// Per-CPU file that `rtla timerlat -U` exposes to user-space workloads. A
/// read blocks until the next timer activation on that CPU.
pub fn timerlat_fd_path(tracing_dir: &Path, cpu: u32) -> PathBuf {
    timerlat_cpu_dir(tracing_dir, cpu).join("timerlat_fd")
}

pub fn current_tracer(tracing_dir: &Path) -> Result<String, std::io::Error> {
    Ok(std::fs::read_to_string(tracing_dir.join("current_tracer"))?.trim().to_owned())
}

pub fn open_timerlat_fd(tracing_dir: &Path, cpu: u32) -> Result<File, LoadError> {
    match current_tracer(tracing_dir) {
        Ok(tracer) if tracer != "timerlat" =>
            log::debug!("Current tracer is {tracer}, not timerlat"),
        Ok(_) => (),
        Err(err) =>
            log::debug!("Cannot read the current tracer under {}: {err}", tracing_dir.display()),
    };

    let path = timerlat_fd_path(tracing_dir, cpu);
    let file = File::open(&path)
        .map_err(|err| match err.kind() {
            ErrorKind::PermissionDenied => LoadError::TimerlatPermission(err),
            _ => LoadError::TimerlatUnavailable(err),
        })?;

    log::debug!("Opened {}", path.display());

    Ok(file)
}

pub fn open_data_source(path: &Path) -> Result<File, LoadError> {
    let file = File::open(path).map_err(LoadError::DataSource)?;

    log::debug!("Opened {}", path.display());

    Ok(file)
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use assert_matches::assert_matches;

    use super::*;

    fn fake_tracefs(cpu: u32) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(timerlat_cpu_dir(root.path(), cpu)).unwrap();
        std::fs::write(timerlat_fd_path(root.path(), cpu), b"\0").unwrap();
        std::fs::write(root.path().join("current_tracer"), "timerlat\n").unwrap();
        root
    }

    #[test]
    fn builds_per_cpu_path() {
        assert_eq!(
            timerlat_fd_path(Path::new(DEFAULT_TRACING_DIR), 3),
            PathBuf::from("/sys/kernel/tracing/osnoise/per_cpu/cpu3/timerlat_fd")
        );
    }

    #[test]
    fn opens_existing_timerlat_fd() {
        let root = fake_tracefs(1);
        assert!(open_timerlat_fd(root.path(), 1).is_ok());
        assert_eq!(current_tracer(root.path()).unwrap(), "timerlat");
    }

    #[test]
    fn missing_timerlat_fd_means_tracer_not_running() {
        let root = fake_tracefs(0);
        let err = open_timerlat_fd(root.path(), 7).unwrap_err();
        assert_matches!(err, LoadError::TimerlatUnavailable(_));
        assert_eq!(err.to_string(), "Error opening timerlat fd, did you run timerlat -U?");
    }

    #[test]
    fn unreadable_timerlat_fd_is_a_permission_error() {
        // root ignores file modes
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let root = fake_tracefs(0);
        let path = timerlat_fd_path(root.path(), 0);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        assert_matches!(open_timerlat_fd(root.path(), 0), Err(LoadError::TimerlatPermission(_)));
    }

    #[test]
    fn missing_data_source_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = open_data_source(&root.path().join("nope")).unwrap_err();
        assert_matches!(err, LoadError::DataSource(_));
        assert!(err.to_string().starts_with("Error opening data fd: "));
    }

    #[test]
    fn dev_full_is_a_data_source() {
        assert!(open_data_source(Path::new(DEFAULT_DATA_SOURCE)).is_ok());
    }
}
