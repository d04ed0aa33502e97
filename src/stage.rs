//! External stage invocation.
//!
//! Stage commands are plain argv lists split with shell-words; no shell is
//! spawned. Every invocation yields a `StageOutcome` so callers decide what a
//! failure means instead of the runner swallowing it.
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::util::truncate_bytes;

pub(crate) const MAX_SNIPPET_LEN: usize = 512;

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Format,
    Build,
    Status,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Format => "format",
            StageKind::Build => "build",
            StageKind::Status => "status",
        };
        f.write_str(name)
    }
}

/// A program plus its fixed leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl StageCommand {
    pub fn parse(text: &str) -> Result<Self> {
        let mut words =
            shell_words::split(text).with_context(|| format!("parse command: {text}"))?;
        if words.is_empty() {
            return Err(anyhow!("command is empty"));
        }
        let program = words.remove(0);
        Ok(StageCommand {
            program,
            args: words,
        })
    }

    /// Full argv with the per-run arguments appended.
    pub fn argv(&self, extra_args: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(1 + self.args.len() + extra_args.len());
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv.extend(extra_args.iter().cloned());
        argv
    }
}

impl fmt::Display for StageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(self.argv(&[])))
    }
}

/// Result of one stage invocation.
#[derive(Serialize, Debug, Clone)]
pub struct StageOutcome {
    pub stage: StageKind,
    pub argv: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub success: bool,
    pub elapsed_ms: u64,
    pub stdout_bytes: u64,
    pub stderr_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_snippet: Option<String>,
}

/// Run one stage to completion in `cwd`.
///
/// Output is captured, relayed to this process's stdout/stderr once the child
/// exits, and kept as a bounded snippet on the outcome. An `Err` means the
/// stage never ran; a non-zero exit is reported through
/// `StageOutcome::success`.
pub fn run_stage(
    stage: StageKind,
    command: &StageCommand,
    extra_args: &[String],
    cwd: &Path,
) -> Result<StageOutcome> {
    let program = resolve_program(&command.program, cwd)?;
    let argv = command.argv(extra_args);
    tracing::debug!(%stage, program = %program.display(), ?argv, cwd = %cwd.display(), "spawn stage");

    let start = Instant::now();
    let output = Command::new(&program)
        .args(&argv[1..])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("spawn {}", program.display()))?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    relay_output(&output.stdout, &output.stderr);

    let outcome = StageOutcome {
        stage,
        argv,
        exit_code: output.status.code(),
        success: output.status.success(),
        elapsed_ms,
        stdout_bytes: output.stdout.len() as u64,
        stderr_bytes: output.stderr.len() as u64,
        stdout_snippet: snippet(&output.stdout),
        stderr_snippet: snippet(&output.stderr),
    };
    tracing::info!(
        %stage,
        exit_code = ?outcome.exit_code,
        elapsed_ms,
        stdout_bytes = outcome.stdout_bytes,
        stderr_bytes = outcome.stderr_bytes,
        "stage complete"
    );
    Ok(outcome)
}

/// Bare names are looked up on PATH; anything with a separator is taken
/// relative to `cwd`.
fn resolve_program(program: &str, cwd: &Path) -> Result<PathBuf> {
    which::which_in(program, std::env::var_os("PATH"), cwd)
        .with_context(|| format!("resolve program {program:?}"))
}

fn relay_output(stdout: &[u8], stderr: &[u8]) {
    // Relaying is best effort; a closed stdout must not turn into a stage failure.
    if !stdout.is_empty() {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(stdout);
        let _ = out.flush();
    }
    if !stderr.is_empty() {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(stderr);
        let _ = err.flush();
    }
}

fn snippet(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(truncate_bytes(bytes, MAX_SNIPPET_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_quoted_arguments() {
        let command = StageCommand::parse("python 'tools/format project.py' --check").unwrap();
        assert_eq!(command.program, "python");
        assert_eq!(command.args, vec!["tools/format project.py", "--check"]);
        assert_eq!(
            command.argv(&["project-v01.json".to_string()]),
            vec!["python", "tools/format project.py", "--check", "project-v01.json"]
        );
    }

    #[test]
    fn rejects_empty_and_unbalanced_commands() {
        assert!(StageCommand::parse("   ").is_err());
        assert!(StageCommand::parse("python 'format.py").is_err());
    }

    #[test]
    fn display_round_trips_through_shell_words() {
        let command = StageCommand::parse("sh 'my script.sh'").unwrap();
        assert_eq!(command.to_string(), "sh 'my script.sh'");
    }

    #[cfg(unix)]
    #[test]
    fn captures_exit_code_and_output() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let command = StageCommand::parse("sh -c 'echo out; echo err >&2; exit 4' stage").unwrap();
        let outcome = run_stage(StageKind::Format, &command, &[], dir.path()).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(4));
        assert_eq!(outcome.stdout_snippet.as_deref(), Some("out\n"));
        assert_eq!(outcome.stderr_snippet.as_deref(), Some("err\n"));
    }

    #[cfg(unix)]
    #[test]
    fn passes_extra_args_and_runs_in_cwd() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let command = StageCommand::parse("sh -c 'pwd; echo \"$1 $2\"' stage").unwrap();
        let extra = vec!["project-v01.json".to_string(), "viewer".to_string()];
        let outcome = run_stage(StageKind::Build, &command, &extra, dir.path()).unwrap();
        assert!(outcome.success);
        let stdout = outcome.stdout_snippet.expect("stdout captured");
        let mut lines = stdout.lines();
        let cwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(cwd, std::fs::canonicalize(dir.path()).unwrap());
        assert_eq!(lines.next(), Some("project-v01.json viewer"));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let command = StageCommand::parse("definitely-not-a-real-program-4711").unwrap();
        assert!(run_stage(StageKind::Build, &command, &[], dir.path()).is_err());
    }
}
