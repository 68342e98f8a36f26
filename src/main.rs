use std::process::ExitCode;
use structopt::StructOpt;

mod app;
mod archive;
mod cli;
mod compact;
mod config;
mod error;
mod mail;
mod session;
mod summary;

fn main() -> ExitCode {
    let cli = cli::Cli::from_args();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match app::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
