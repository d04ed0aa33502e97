use clap::{CommandFactory, Parser};
use std::process::ExitCode;

mod cli;
mod config;
mod error;
mod logging;
mod merge;
mod pipeline;
mod project;
mod stage;
mod staging;
mod util;
mod vcs;

use cli::{BuildArgs, Command, RootArgs};
use config::PipelineConfig;
use error::BuildError;
use pipeline::run_pipeline;
use util::display_path;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    logging::init_logging(args.verbose);

    let result = match &args.command {
        Some(Command::Merge(merge_args)) => merge::run_merge(merge_args),
        Some(Command::Objects(objects_args)) => project::run_objects(objects_args),
        None => return cmd_build(&args.build),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_build(args: &BuildArgs) -> ExitCode {
    let outcome = PipelineConfig::resolve(args).and_then(|config| {
        tracing::debug!(?config, "resolved pipeline config");
        run_pipeline(&config).map(|report| (config, report))
    });
    match outcome {
        Ok((config, report)) => {
            println!(
                "built {} ({})",
                display_path(&report.project_file, Some(&config.workdir)),
                report.mode
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let BuildError::Usage(message) = &err {
                eprintln!("error: {message}");
                eprintln!("{}", RootArgs::command().render_usage());
            } else {
                eprintln!("error: {err}");
            }
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}
