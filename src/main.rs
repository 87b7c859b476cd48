use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;

use grape_console::api::{encode_package_name, ApiOutcome};
use grape_console::config::{load_config, print_schema};
use grape_console::router::{GuardDecision, NavigationResult};
use grape_console::startup::bootstrap;
use grape_console::state::ConsoleState;
use grape_console::utils::init_logging;

#[derive(Parser)]
#[command(name = "grape-console", version, about = "Administration console for a Grape registry")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short, env = "GRAPE_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the issued token.
    Login {
        username: String,
        /// Prompted for when omitted.
        #[arg(long, env = "GRAPE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// End the registry session and forget the stored token.
    Logout,
    /// Show who the stored session belongs to.
    Whoami,
    /// Run the navigation guard for a console path.
    Navigate { path: String },
    /// List packages known to the registry.
    Packages,
    /// Search packages by name.
    Search { query: String },
    /// Show one package document.
    Package { name: String },
    /// Print the configuration JSON schema.
    Schema,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::Schema = cli.command {
        return match print_schema() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: grape_console::config::ConfigV1) -> Result<ExitCode> {
    let mut state = bootstrap(config).context("failed to start console")?;

    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => rpassword::prompt_password(format!("Password for {}: ", username))
                    .context("failed to read password")?,
            };
            if state.session.login(&state.client, &username, &password).await {
                match state.session.role() {
                    Some(role) => println!("Logged in as {} ({})", username, role),
                    None => println!("Logged in as {}", username),
                }
                Ok(ExitCode::SUCCESS)
            } else {
                println!("Login failed");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Logout => {
            state.session.sign_out(&state.client).await;
            println!("Logged out");
            Ok(ExitCode::SUCCESS)
        }
        Command::Whoami => {
            match state.session.identity() {
                Some(identity) => println!(
                    "{} ({})",
                    identity.username,
                    identity.role.as_deref().unwrap_or("role unknown")
                ),
                None if state.session.is_logged_in() => println!("logged in, identity unknown"),
                None => println!("not logged in"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Navigate { path } => {
            let ConsoleState {
                navigator, session, ..
            } = &mut state;
            match navigator.navigate(session, &path) {
                Some(result) => print_navigation(&result),
                None => println!("navigation superseded"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Packages => {
            let outcome = state
                .client
                .list_packages(state.session.credential())
                .await;
            report(&mut state, outcome, "/packages")
        }
        Command::Search { query } => {
            let outcome = state
                .client
                .search(state.session.credential(), &query)
                .await;
            let path = format!("/packages?q={}", urlencoding::encode(&query));
            report(&mut state, outcome, &path)
        }
        Command::Package { name } => {
            let outcome = state
                .client
                .get_package(state.session.credential(), &name)
                .await;
            let path = format!("/package/{}", encode_package_name(&name));
            report(&mut state, outcome, &path)
        }
        Command::Schema => Ok(ExitCode::SUCCESS),
    }
}

fn print_navigation(result: &NavigationResult) {
    let verdict = match &result.decision {
        GuardDecision::Allow => "allow",
        GuardDecision::RedirectLogin { .. } => "redirect to login",
        GuardDecision::RedirectHome => "redirect to home",
    };
    println!("{}: {} -> {}", verdict, result.destination, result.location);
    println!("title: {}", result.title);
}

/// Prints a successful result, or applies the session's reaction to a 401.
fn report<T: Serialize>(
    state: &mut ConsoleState,
    outcome: ApiOutcome<T>,
    current_path: &str,
) -> Result<ExitCode> {
    if let Some(decision) = state.session.handle_outcome(&outcome, current_path) {
        println!("Session expired, log in again: {}", decision.location(current_path));
        return Ok(ExitCode::FAILURE);
    }
    let value = outcome.into_result()?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(ExitCode::SUCCESS)
}
