use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender};

pub mod prelude {
    pub use super::{
        init_logging,
        is_env_var_set,
        create_ctrlc_handler,
        max_time_channel,
        ExitFlag,
    };
}

pub fn is_env_var_set(var: &str) -> bool {
    match std::env::var(var) {
        Ok(v) if v != "" => true,
        _ => false,
    }
}

/// Logs to stderr. `RUST_LOG` wins; otherwise `DEBUG=1` turns on debug records.
pub fn init_logging() {
    let default_level =
        if is_env_var_set("DEBUG") {
            "debug"
        } else {
            "info"
        };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_micros()
        .init();
}

#[derive(Clone)]
pub struct ExitFlag {
    ch: Receiver<()>,
}

impl ExitFlag {
    /// A flag raised by sending on the returned channel instead of by Ctrl+C.
    pub fn manual() -> (Sender<()>, ExitFlag) {
        let (send, recv) = crossbeam::channel::bounded(1);
        (send, ExitFlag { ch: recv })
    }

    pub fn is_exit(&self) -> bool {
        use crossbeam::channel::TryRecvError::*;

        match self.ch.try_recv() {
            Ok(()) => true,
            Err(Empty) | Err(Disconnected) => false,
        }
    }
}

pub fn create_ctrlc_handler() -> Result<ExitFlag, ctrlc::Error> {
    let (send, flag) = ExitFlag::manual();

    ctrlc::set_handler(move || {
        // a second Ctrl+C while the first is pending is dropped
        let _ = send.try_send(());
    })?;

    Ok(flag)
}

/// Fires once after `max_time` seconds, or never.
pub fn max_time_channel(max_time: Option<u64>) -> Receiver<Instant> {
    match max_time {
        Some(max_time) => crossbeam::channel::after(Duration::from_secs(max_time)),
        None => crossbeam::channel::never(),
    }
}
