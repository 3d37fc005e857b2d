use thiserror::Error;

use crate::scheduler::types::{TaskId, TaskStatus};

/// Errors returned by scheduler, task, queue and estimator operations.
#[derive(Error, Debug)]
pub enum SliceError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("illegal transition for {task}: cannot {action} while {from:?}")]
    InvalidTransition {
        task: TaskId,
        action: &'static str,
        from: TaskStatus,
    },

    #[error("{0} occupies more than one live scheduler slot")]
    DuplicateTask(TaskId),

    #[error("tick() called from inside a running step")]
    ReentrantTick,
}

/// A failure raised while a step (or a queued item) was running.
///
/// Faults are caught and logged by the scheduler; they never finish or
/// remove the task that raised them.
#[derive(Error, Debug)]
pub enum StepFault {
    #[error("step called after its action sequence was exhausted")]
    Exhausted,

    #[error("step panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl StepFault {
    /// Build a fault from a payload recovered by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        StepFault::Panicked(message)
    }
}

pub type Result<T, E = SliceError> = std::result::Result<T, E>;
