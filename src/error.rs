//! Error taxonomy for the build pipeline.
//!
//! Internal helpers work with `anyhow` and context strings; the pipeline
//! boundary converts them into `BuildError` so `main` can pick an exit code.
use crate::stage::StageKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{0}")]
    Usage(String),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("stage {input} -> {dest}: {source:#}")]
    Staging {
        input: PathBuf,
        dest: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} stage could not be started: {source:#}")]
    Spawn {
        stage: StageKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} stage failed ({})", describe_exit(.exit_code))]
    StageFailed {
        stage: StageKind,
        exit_code: Option<i32>,
    },

    #[error("write report {path}: {source:#}")]
    Report {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl BuildError {
    pub fn config(message: impl Into<String>) -> Self {
        BuildError::Config {
            message: message.into(),
        }
    }

    /// Process exit code for this failure.
    ///
    /// A failing stage hands its own exit code to the caller; everything else
    /// (including a stage killed by a signal) exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::StageFailed {
                exit_code: Some(code),
                ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_propagates_exit_code() {
        let err = BuildError::StageFailed {
            stage: StageKind::Format,
            exit_code: Some(3),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "format stage failed (exit code 3)");
    }

    #[test]
    fn signal_and_other_errors_exit_one() {
        let err = BuildError::StageFailed {
            stage: StageKind::Build,
            exit_code: None,
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("terminated by signal"));
        assert_eq!(BuildError::Usage("usage".into()).exit_code(), 1);
        assert_eq!(BuildError::config("bad").exit_code(), 1);
    }
}
