mod access;
mod analyzer;
mod api;
mod cli;
mod config;
mod dashboard;
mod events;
mod intake;
mod lead;
mod store;

use crate::analyzer::report;
use crate::cli::prompt::complete_signup_form;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::{Config, StoreKind};
use crate::events::LeadEvents;
use crate::intake::{SignupError, SignupForm};
use crate::store::RemoteStore;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
        Commands::Signup {
            email,
            university,
            plan,
            name,
            phone,
        } => handle_signup(SignupForm {
            email: email.unwrap_or_default(),
            university: university.unwrap_or_default(),
            plan,
            name,
            phone,
        }),
        Commands::Leads => handle_leads(),
        Commands::Stats => handle_stats(),
        Commands::Report { out } => handle_report(out),
        Commands::Config { command } => handle_config_command(command),
        Commands::Doctor => handle_doctor(),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_signup(form: SignupForm) -> Result<()> {
    let config = load_or_default_config()?;
    if config.store == StoreKind::Memory {
        bail!("signup from the CLI needs a persistent store; set `store` to sqlite or remote");
    }

    let store = store::open(&config)?;
    let form = complete_signup_form(form)?;

    match intake::submit(store.as_ref(), &LeadEvents::new(), &form) {
        Ok(outcome) => {
            println!("{}", outcome.confirmation.title);
            println!("- email: {}", outcome.lead.email);
            println!("- plan: {}", outcome.lead.selected_plan);
            println!("- university: {}", outcome.lead.university.label());
            println!("{}", outcome.confirmation.message);
            println!("{}", outcome.confirmation.next_step);
            Ok(())
        }
        Err(SignupError::Store(error)) => {
            Err(anyhow::Error::new(error).context("Something went wrong. Please try again."))
        }
        Err(error) => bail!("{error}"),
    }
}

fn handle_leads() -> Result<()> {
    let config = load_or_default_config()?;
    let store = store::open(&config)?;
    let leads = store.list_all().context("Failed to load leads")?;

    println!("{} lead(s) in {} store", leads.len(), store.backend_name());
    for lead in &leads {
        println!(
            "- {} | {} | {} | {}{}",
            lead.created_at.format("%Y-%m-%d %H:%M"),
            lead.email,
            lead.selected_plan,
            lead.university,
            lead.name
                .as_deref()
                .map(|name| format!(" | {name}"))
                .unwrap_or_default()
        );
    }

    Ok(())
}

fn handle_stats() -> Result<()> {
    let config = load_or_default_config()?;
    let store = store::open(&config)?;
    let report = analyzer::current_report(store.as_ref())?;

    print!("{}", report::render_markdown(&report));
    Ok(())
}

fn handle_report(out: Option<PathBuf>) -> Result<()> {
    let config = load_or_default_config()?;
    let report_dir = out.unwrap_or_else(|| config.report_dir.clone());
    let store = store::open(&config)?;

    let (report, saved) = analyzer::generate_and_store_report(store.as_ref(), &report_dir)?;

    println!("Report generated: {}", report.today);
    println!("- Markdown: {}", saved.markdown_path.display());
    println!("- JSON: {}", saved.json_path.display());

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match config.store {
        StoreKind::Memory => {
            println!("[WARN] memory store selected: leads are lost when the server stops");
            issues.push("volatile store".to_string());
        }
        StoreKind::Sqlite => match store::SqliteStore::open(&config.db_path) {
            Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
            Err(error) => {
                println!("[WARN] SQLite check failed: {error:#}");
                issues.push("db unreachable".to_string());
            }
        },
        StoreKind::Remote => match RemoteStore::from_config(&config) {
            Ok(remote) => println!("[OK] remote store configured: {}", remote.endpoint()),
            Err(error) => {
                println!("[WARN] remote store misconfigured: {error:#}");
                issues.push("remote store misconfigured".to_string());
            }
        },
    }

    if config.report_dir.exists() {
        println!("[OK] report dir exists: {}", config.report_dir.display());
    } else {
        println!("[WARN] report dir missing: {}", config.report_dir.display());
        issues.push("report dir missing".to_string());
    }

    if config.admin_emails.is_empty() {
        println!("[WARN] admin_emails is empty: dashboard endpoints are open");
        issues.push("admin gate open".to_string());
    } else {
        println!(
            "[OK] {} admin(s) allowed via header {}",
            config.admin_emails.len(),
            config.identity_header
        );
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let shared_config = Arc::new(config);

    info!(store = %shared_config.store, "VisaPal service started");

    tokio::select! {
        api_result = api::run_server(Arc::clone(&shared_config)) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_or_default_config() -> Result<Config> {
    let config_path = Config::config_path()?;
    if config_path.exists() {
        return Config::load();
    }

    let config = Config::default();
    config.ensure_bootstrap_files()?;
    config.save()?;
    Ok(config)
}
