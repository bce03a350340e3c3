use thiserror::Error;

use crate::process::policy::SchedPolicyError;

/// Everything that stops the load driver, other than an interrupt.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Error setting affinity: {0}")]
    Affinity(String),

    #[error("Error setting priority: {0}")]
    Priority(#[from] SchedPolicyError),

    #[error("Permission denied. Please check your access rights.")]
    TimerlatPermission(#[source] std::io::Error),

    #[error("Error opening timerlat fd, did you run timerlat -U?")]
    TimerlatUnavailable(#[source] std::io::Error),

    #[error("Error opening data fd: {0}")]
    DataSource(#[source] std::io::Error),

    #[error("Error installing the interrupt handler: {0}")]
    InterruptHandler(#[from] ctrlc::Error),

    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),
}
