//! The stage -> format -> build -> status pipeline.
//!
//! Each external stage yields a `StageOutcome` that is inspected before the
//! next one starts. The first failure stops the pipeline unless `keep_going`
//! is set, in which case the remaining stages still run and the first failure
//! is reported at the end.
use serde::Serialize;
use std::path::PathBuf;

use crate::config::{BuildMode, PipelineConfig};
use crate::error::{BuildError, Result};
use crate::stage::{run_stage, StageCommand, StageKind, StageOutcome};
use crate::staging::{project_file_name, stage_project, write_json};
use crate::vcs::show_working_tree_status;

#[derive(Serialize, Debug)]
pub struct PipelineReport {
    pub project_file: PathBuf,
    pub mode: BuildMode,
    pub stages: Vec<StageOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StageOutcome>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<StageKind>,
}

pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport> {
    let project_file =
        stage_project(&config.input, &config.workdir, &config.version).map_err(|source| {
            BuildError::Staging {
                input: config.input.clone(),
                dest: config.workdir.join(project_file_name(&config.version)),
                source,
            }
        })?;
    let project_name = project_file_name(&config.version);

    let mut report = PipelineReport {
        project_file,
        mode: config.mode.clone(),
        stages: Vec::new(),
        status: None,
        success: true,
        failed_stage: None,
    };
    let mut first_failure: Option<BuildError> = None;

    let steps: [(StageKind, &StageCommand, Vec<String>); 2] = [
        (
            StageKind::Format,
            &config.format_command,
            vec![project_name.clone()],
        ),
        (
            StageKind::Build,
            &config.build_command,
            vec![project_name, config.mode.as_str().to_string()],
        ),
    ];
    for (stage, command, extra_args) in steps {
        if first_failure.is_some() && !config.keep_going {
            tracing::info!(%stage, "skipping stage after earlier failure");
            break;
        }
        tracing::info!(%stage, command = %command, "running stage");
        let failure = match run_stage(stage, command, &extra_args, &config.workdir) {
            Ok(outcome) => {
                let failure = (!outcome.success).then_some(BuildError::StageFailed {
                    stage,
                    exit_code: outcome.exit_code,
                });
                report.stages.push(outcome);
                failure
            }
            Err(source) => Some(BuildError::Spawn { stage, source }),
        };
        if let Some(err) = failure {
            tracing::error!("{err}");
            if first_failure.is_none() {
                report.success = false;
                report.failed_stage = Some(stage);
                first_failure = Some(err);
            }
        }
    }

    if config.show_status {
        report.status = show_working_tree_status(&config.status_command, &config.repo);
    }

    if let Some(path) = &config.report {
        if let Err(source) = write_json(path, &report) {
            let err = BuildError::Report {
                path: path.clone(),
                source,
            };
            if first_failure.is_none() {
                return Err(err);
            }
            tracing::error!("{err}");
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(report),
    }
}
