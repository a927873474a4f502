use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;

/// Failures of a single probe-binary invocation.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The probe executable could not be located. Fatal to the whole scan.
    #[error("probe binary `{binary}` not found")]
    BinaryNotFound { binary: String },

    #[error("failed to spawn probe binary `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The run's token fired while the process was running; the process was
    /// killed and its partial output discarded.
    #[error("probe invocation cancelled")]
    Cancelled,

    #[error("probe exited with {}: {}", exit_label(.code), .stderr)]
    Exited { code: Option<i32>, stderr: String },

    #[error("probe IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProbeError::Cancelled)
    }

    pub fn is_binary_missing(&self) -> bool {
        matches!(self, ProbeError::BinaryNotFound { .. })
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_error_mentions_code_and_stderr() {
        let err = ProbeError::Exited {
            code: Some(2),
            stderr: "flag provided but not defined".into(),
        };
        let text = err.to_string();
        assert!(text.contains("status 2"));
        assert!(text.contains("flag provided"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn signal_exit_is_labelled() {
        let err = ProbeError::Exited {
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }
}
