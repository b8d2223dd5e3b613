//! BatchScribe CLI entry point

use std::process::ExitCode;

use clap::Parser;

use batch_scribe::cli::{
    app::{cli_config, load_merged_config, run_batch, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    logging,
    presenter::Presenter,
};
use batch_scribe::domain::Duration;
use batch_scribe::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let presenter = Presenter::new();

    match cli.command {
        Commands::Config { action } => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Commands::Run(args) => {
            if let Some(timeout) = &args.timeout {
                if let Err(e) = timeout.parse::<Duration>() {
                    presenter.error(&format!("Invalid timeout: {}", e));
                    return ExitCode::from(EXIT_USAGE_ERROR);
                }
            }

            let config = load_merged_config(cli_config(&args)).await;
            run_batch(args, config).await
        }
    }
}
