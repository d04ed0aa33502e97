//! Typed pipeline configuration.
//!
//! Values are resolved per field in priority order: CLI flag, config file,
//! environment variable, built-in default. The working directory and the
//! repository are explicit paths rather than ambient process state.
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::BuildArgs;
use crate::error::{BuildError, Result};
use crate::stage::StageCommand;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const CONFIG_FILE_NAME: &str = "cyoa-build.json";

pub const DEFAULT_FORMAT_COMMAND: &str = "python format.py";
pub const DEFAULT_BUILD_COMMAND: &str = "python build.py";
pub const DEFAULT_STATUS_COMMAND: &str = "git status";
pub const DEFAULT_BUILD_MODE: BuildMode = BuildMode::Viewer;

pub const FORMAT_COMMAND_ENV: &str = "CYOA_FORMAT_COMMAND";
pub const BUILD_COMMAND_ENV: &str = "CYOA_BUILD_COMMAND";
pub const STATUS_COMMAND_ENV: &str = "CYOA_STATUS_COMMAND";

/// Artifact type requested from the build stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    Viewer,
    Pdf,
    /// Any other mode, passed through to the build stage unchanged.
    Custom(String),
}

impl BuildMode {
    pub fn parse(value: &str) -> Self {
        match value {
            "viewer" => BuildMode::Viewer,
            "pdf" => BuildMode::Pdf,
            other => BuildMode::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BuildMode::Viewer => "viewer",
            BuildMode::Pdf => "pdf",
            BuildMode::Custom(value) => value,
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BuildMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// On-disk config (`cyoa-build.json`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<String>,
    /// Closed set of modes the build stage supports; empty accepts any mode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepted_modes: Vec<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            schema_version: CONFIG_SCHEMA_VERSION,
            format_command: None,
            build_command: None,
            status_command: None,
            default_mode: None,
            accepted_modes: Vec::new(),
        }
    }
}

/// Load a config file from disk.
pub fn load_config(path: &Path) -> anyhow::Result<ConfigFile> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ConfigFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(config)
}

/// Validate config schema and user-provided values.
pub fn validate_config(config: &ConfigFile) -> anyhow::Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    for (field, value) in [
        ("format_command", &config.format_command),
        ("build_command", &config.build_command),
        ("status_command", &config.status_command),
        ("default_mode", &config.default_mode),
    ] {
        if let Some(value) = value {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must be non-empty"));
            }
        }
    }
    if config.accepted_modes.iter().any(|mode| mode.trim().is_empty()) {
        return Err(anyhow!("accepted_modes must not contain empty entries"));
    }
    if let Some(default_mode) = config.default_mode.as_deref() {
        if !config.accepted_modes.is_empty()
            && !config.accepted_modes.iter().any(|mode| mode == default_mode)
        {
            return Err(anyhow!(
                "default_mode {default_mode:?} is not listed in accepted_modes"
            ));
        }
    }
    Ok(())
}

/// Everything one pipeline run needs, fully resolved.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub version: String,
    pub mode: BuildMode,
    pub workdir: PathBuf,
    pub repo: PathBuf,
    pub format_command: StageCommand,
    pub build_command: StageCommand,
    pub status_command: StageCommand,
    pub keep_going: bool,
    pub show_status: bool,
    pub report: Option<PathBuf>,
}

impl PipelineConfig {
    /// Resolve against the process environment.
    pub fn resolve(args: &BuildArgs) -> Result<Self> {
        Self::resolve_with_env(args, |key| std::env::var(key).ok())
    }

    /// Resolve with an injectable environment lookup.
    ///
    /// Argument-count problems are reported before any path or file is read.
    pub fn resolve_with_env(
        args: &BuildArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let (Some(input), Some(version)) = (args.input.as_ref(), args.version_tag.as_ref()) else {
            return Err(BuildError::Usage(
                "expected at least <INPUT_FILE> and <VERSION>".to_string(),
            ));
        };
        validate_version(version)?;

        // Stages run with the workdir as cwd, so relative program paths must
        // not be resolved against it twice.
        let workdir = match &args.workdir {
            Some(dir) => absolute_dir(dir, "working directory")?,
            None => std::env::current_dir()
                .map_err(|err| BuildError::config(format!("read current directory: {err}")))?,
        };
        if !workdir.is_dir() {
            return Err(BuildError::config(format!(
                "working directory {} does not exist",
                workdir.display()
            )));
        }
        let repo = match &args.repo {
            Some(dir) => absolute_dir(dir, "repository directory")?,
            None => workdir.clone(),
        };

        let file = config_file_for(args.config.as_deref(), &workdir)?;

        let default_mode = DEFAULT_BUILD_MODE;
        let mode_text = args
            .mode
            .as_deref()
            .or(file.default_mode.as_deref())
            .unwrap_or(default_mode.as_str());
        if !file.accepted_modes.is_empty()
            && !file.accepted_modes.iter().any(|mode| mode == mode_text)
        {
            return Err(BuildError::Usage(format!(
                "unsupported build mode {mode_text:?} (accepted: {})",
                file.accepted_modes.join(", ")
            )));
        }
        let mode = BuildMode::parse(mode_text);
        if let BuildMode::Custom(value) = &mode {
            tracing::debug!(mode = %value, "passing custom build mode through");
        }

        let format_command = resolve_command(
            "format",
            args.format_command.as_deref(),
            file.format_command.as_deref(),
            env(FORMAT_COMMAND_ENV),
            DEFAULT_FORMAT_COMMAND,
        )?;
        let build_command = resolve_command(
            "build",
            args.build_command.as_deref(),
            file.build_command.as_deref(),
            env(BUILD_COMMAND_ENV),
            DEFAULT_BUILD_COMMAND,
        )?;
        let status_command = resolve_command(
            "status",
            args.status_command.as_deref(),
            file.status_command.as_deref(),
            env(STATUS_COMMAND_ENV),
            DEFAULT_STATUS_COMMAND,
        )?;

        Ok(PipelineConfig {
            input: input.clone(),
            version: version.clone(),
            mode,
            workdir,
            repo,
            format_command,
            build_command,
            status_command,
            keep_going: args.keep_going,
            show_status: !args.no_status,
            report: args.report.clone(),
        })
    }
}

/// The version tag only names a file, but it must name one inside the
/// working directory.
pub fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(BuildError::Usage("version must be non-empty".to_string()));
    }
    if version.contains(['/', '\\', '\0']) {
        return Err(BuildError::Usage(format!(
            "version {version:?} must not contain path separators or NUL"
        )));
    }
    Ok(())
}

fn absolute_dir(dir: &Path, what: &str) -> Result<PathBuf> {
    std::path::absolute(dir)
        .map_err(|err| BuildError::config(format!("{what} {}: {err}", dir.display())))
}

fn config_file_for(explicit: Option<&Path>, workdir: &Path) -> Result<ConfigFile> {
    let file = match explicit {
        Some(path) => load_config(path).map_err(|err| BuildError::config(format!("{err:#}")))?,
        None => {
            let path = workdir.join(CONFIG_FILE_NAME);
            if !path.is_file() {
                return Ok(ConfigFile::default());
            }
            tracing::debug!(path = %path.display(), "loading config");
            load_config(&path).map_err(|err| BuildError::config(format!("{err:#}")))?
        }
    };
    validate_config(&file).map_err(|err| BuildError::config(format!("{err:#}")))?;
    Ok(file)
}

fn resolve_command(
    name: &str,
    flag: Option<&str>,
    file: Option<&str>,
    env: Option<String>,
    default: &str,
) -> Result<StageCommand> {
    let env = env.filter(|value| !value.trim().is_empty());
    let text = flag.or(file).or(env.as_deref()).unwrap_or(default);
    StageCommand::parse(text)
        .map_err(|err| BuildError::config(format!("{name} command: {err:#}")))
}
