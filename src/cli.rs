//! CLI argument parsing for the build orchestrator and project tools.
//!
//! The default invocation is positional (`<INPUT_FILE> <VERSION> [BUILD_MODE]`);
//! project tooling lives under subcommands that conflict with those positionals.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "cyoa-build",
    version,
    about = "Stage a CYOA project file and run the format and build stages on it",
    after_help = "Examples:\n  cyoa-build story.json v01\n  cyoa-build story.json v02 pdf\n  cyoa-build story.json v03 --workdir build --repo . --no-status\n  cyoa-build merge --project project-v03.json --patch edited.json --write",
    args_conflicts_with_subcommands = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub build: BuildArgs,

    /// Emit debug logging
    #[arg(long, global = true)]
    pub verbose: bool,
}

/// Project tooling commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Merge(MergeArgs),
    Objects(ObjectsArgs),
}

/// Inputs for the stage -> format -> build pipeline.
///
/// The positionals are optional at the clap level so that a short argument
/// list surfaces as a usage error before anything touches the filesystem.
#[derive(Args, Debug, Default, Clone)]
pub struct BuildArgs {
    /// JSON file to stage as the project file
    #[arg(value_name = "INPUT_FILE")]
    pub input: Option<PathBuf>,

    /// Version tag used to name project-<VERSION>.json
    #[arg(value_name = "VERSION")]
    pub version_tag: Option<String>,

    /// Build mode passed to the build stage (default: viewer)
    #[arg(value_name = "BUILD_MODE")]
    pub mode: Option<String>,

    /// Directory the project file is written to and stages run in
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Repository whose working-tree status is shown at the end
    #[arg(long, value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Config file (default: <workdir>/cyoa-build.json when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Command for the format stage
    #[arg(long, value_name = "CMD")]
    pub format_command: Option<String>,

    /// Command for the build stage
    #[arg(long, value_name = "CMD")]
    pub build_command: Option<String>,

    /// Command for the working-tree status diagnostic
    #[arg(long, value_name = "CMD")]
    pub status_command: Option<String>,

    /// Run the build stage even when the format stage fails
    #[arg(long)]
    pub keep_going: bool,

    /// Skip the working-tree status diagnostic
    #[arg(long)]
    pub no_status: bool,

    /// Write a JSON report of the run
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Merge command inputs.
#[derive(Parser, Debug, Clone)]
#[command(about = "Merge the rows of a patch project into a project file")]
pub struct MergeArgs {
    /// Project file to merge into
    #[arg(long = "project", value_name = "FILE")]
    pub project_file: PathBuf,

    /// Project file holding the edited rows
    #[arg(long, value_name = "FILE")]
    pub patch: PathBuf,

    /// Save the merged project (otherwise only report the changes)
    #[arg(long)]
    pub write: bool,

    /// Row ids that must not change
    #[arg(long, value_name = "ID", num_args = 1.., action = clap::ArgAction::Append)]
    pub skip_rows: Vec<String>,

    /// Object ids that must not change
    #[arg(long, value_name = "ID", num_args = 1.., action = clap::ArgAction::Append)]
    pub skip_objs: Vec<String>,

    /// Only these row ids may change
    #[arg(long, value_name = "ID", num_args = 1.., action = clap::ArgAction::Append)]
    pub only_rows: Vec<String>,

    /// Only these object ids may change
    #[arg(long, value_name = "ID", num_args = 1.., action = clap::ArgAction::Append)]
    pub only_objs: Vec<String>,
}

/// Objects command inputs for copying or moving objects between rows.
#[derive(Parser, Debug, Clone)]
#[command(about = "Copy or move objects from one row to another")]
pub struct ObjectsArgs {
    /// Project file to edit
    #[arg(long = "project", value_name = "FILE")]
    pub project_file: PathBuf,

    /// Row the objects are taken from
    #[arg(long, value_name = "ROW_ID")]
    pub from_row: String,

    /// Row the objects are inserted into
    #[arg(long, value_name = "ROW_ID")]
    pub to_row: String,

    /// Object ids to select
    #[arg(long, value_name = "ID", num_args = 1.., action = clap::ArgAction::Append)]
    pub ids: Vec<String>,

    /// Inclusive index ranges to select (e.g. 0-3)
    #[arg(long, value_name = "START-END", num_args = 1.., action = clap::ArgAction::Append)]
    pub ranges: Vec<String>,

    /// Select every object of the source row
    #[arg(long)]
    pub all: bool,

    /// Remove the selected objects from the source row
    #[arg(long = "move")]
    pub move_objects: bool,

    /// Insert after this index in the target row
    #[arg(long, value_name = "INDEX", conflicts_with = "at_object")]
    pub after_index: Option<usize>,

    /// Insert at the position of this object in the target row
    #[arg(long, value_name = "ID")]
    pub at_object: Option<String>,

    /// Save the edited project (otherwise only report the edit)
    #[arg(long)]
    pub write: bool,
}
