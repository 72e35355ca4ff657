use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::recurrence::MaterializationManager;
use cadence_core::repository::SqliteRepository;
use clap::Parser;
use commands::instance::InstanceAction;
use owo_colors::{OwoColorize, Style};

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool);
    let manager = MaterializationManager::new(config.materialization.clone());

    let result = match cli.command {
        cli::Commands::Add(command) => {
            commands::add::add_task(&repository, &manager, command).await
        }
        cli::Commands::Tasks => commands::list::list_tasks(&repository).await,
        cli::Commands::List(command) => {
            commands::list::list_instances(&repository, command).await
        }
        cli::Commands::Preview(command) => commands::list::preview(&repository, command).await,
        cli::Commands::Status(command) => commands::status::set_status(&repository, command).await,
        cli::Commands::Do(target) => {
            commands::instance::apply_action(&repository, target, InstanceAction::Complete).await
        }
        cli::Commands::Skip(target) => {
            commands::instance::apply_action(&repository, target, InstanceAction::Skip).await
        }
        cli::Commands::Start(target) => {
            commands::instance::apply_action(&repository, target, InstanceAction::Start).await
        }
        cli::Commands::Cancel(target) => {
            commands::instance::apply_action(&repository, target, InstanceAction::Cancel).await
        }
        cli::Commands::Reset(target) => {
            commands::instance::apply_action(&repository, target, InstanceAction::Reset).await
        }
        cli::Commands::Override(command) => {
            commands::instance::override_instance(&repository, command).await
        }
        cli::Commands::Extend(command) => {
            commands::recurrence::extend(&repository, &manager, command).await
        }
        cli::Commands::Pause(target) => {
            commands::recurrence::set_active(&repository, target, false).await
        }
        cli::Commands::Resume(target) => {
            commands::recurrence::set_active(&repository, target, true).await
        }
        cli::Commands::Delete(command) => {
            commands::delete::delete_task(&repository, command).await
        }
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_env("CADENCE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::AmbiguousId(tasks) => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, title) in tasks {
                    eprintln!("  {} ({})", id.yellow(), title);
                }
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::InvalidRule(s) => {
                eprintln!("{} Invalid recurrence: {}", "Error:".style(error_style), s);
            }
            CoreError::InvalidTransition { from, action } => {
                eprintln!(
                    "{} Cannot {} an instance that is already {}",
                    "Error:".style(error_style),
                    action,
                    from.to_string().yellow()
                );
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}
