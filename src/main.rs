mod cli;
mod commands;
mod errors;
mod installers;
mod libs;
mod logger;
mod schemas;

use clap::Parser;
use cli::cmd_enums::{Cli, Commands};
use commands::setup::SetupOverrides;
use commands::{android_status, check_deps, fetch_docs, flutter_status, fvm, setup, update_script, version};

fn main() {
    let cli = Cli::parse();
    logger::init(cli.debug);
    log_debug!("[Main] Debug mode enabled");

    let result = match cli.command {
        Commands::Setup {
            flutter_version,
            install_method,
            install_type,
            no_parallel,
            platforms,
            no_git_fetch,
            no_docs,
            kdf_docs,
            max_time,
            verbose,
        } => setup::run(SetupOverrides {
            flutter_version,
            install_method,
            install_type,
            no_parallel,
            platforms,
            no_git_fetch,
            no_docs,
            kdf_docs,
            max_time,
            verbose,
        }),
        Commands::FetchDocs {
            target,
            no_agents,
            kdf_docs,
        } => fetch_docs::run(&target, no_agents, kdf_docs),
        Commands::CheckDeps => check_deps::run(),
        Commands::FlutterStatus { version } => flutter_status::run(version),
        Commands::AndroidStatus => android_status::run(),
        Commands::UpdateScript { yes } => update_script::run(yes),
        Commands::FvmList => fvm::list(),
        Commands::FvmInstall { version } => fvm::install(&version),
        Commands::FvmUse { version } => fvm::use_version(&version),
        Commands::FvmReleases => fvm::releases(),
        Commands::Version => {
            version::run();
            Ok(())
        }
    };

    if let Err(e) = result {
        log_error!("{:#}", e);
        std::process::exit(1);
    }
}
