use std::sync::Arc;

use thiserror::Error;

/// Why a store task produced no value.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("Task '{name}' failed: {error}")]
    Failed {
        name: String,
        error: Arc<anyhow::Error>,
    },

    #[error("Task '{name}' was cancelled")]
    Cancelled { name: String },
}

impl TaskError {
    pub fn name(&self) -> &str {
        match self {
            TaskError::Failed { name, .. } | TaskError::Cancelled { name } => name,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_cause() {
        let error = TaskError::Failed {
            name: "load".to_string(),
            error: Arc::new(anyhow::anyhow!("timeout")),
        };
        assert_eq!(error.to_string(), "Task 'load' failed: timeout");
        assert_eq!(error.name(), "load");
        assert!(!error.is_cancelled());
    }
}
