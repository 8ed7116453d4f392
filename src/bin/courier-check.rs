//! Outbound client diagnostics CLI.
//!
//! Loads the same environment configuration as the notification service,
//! assembles the outbound client stack, and exercises it from the command
//! line. Useful for verifying `OUTBOUND_CLIENTS` and credential settings
//! against a live identity provider before deploying.
//!
//! ## Usage Examples
//!
//! ```bash
//! # List the configured clients and how they route
//! courier-check list
//!
//! # Exchange credentials for a token and print its expiry
//! courier-check acquire --client param_client
//!
//! # Fetch a template end to end through the named client
//! courier-check template --client param_client --name welcome
//! ```
//!
//! ## Environment Variables
//!
//! Reads the same variables as the service: `OAUTH_CLIENT_ID`,
//! `OAUTH_CLIENT_SECRET`, `OUTBOUND_CLIENTS`, and optionally
//! `SERVICE_REGISTRY`, `TOKEN_SAFETY_MARGIN`, `HTTP_CLIENT_TIMEOUT` and
//! `USER_AGENT`.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Configuration or decoding error
//! - 2: Routing or transport error
//! - 3: Authentication error

use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use courier::client::ClientManager;
use courier::config::Config;
use courier::errors::{ConfigError, ParamError, RequestError, TokenError};
use courier::oauth::{MemoryAuthorizationStore, TokenProvider};
use courier::param::ParamClient;
use courier::routing::{ClientRouter, StaticServiceRegistry};

#[derive(Parser)]
#[command(
    name = "courier-check",
    about = "Diagnostics for courier outbound clients",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured outbound clients
    List,
    /// Acquire a token for one client and print its expiry
    Acquire {
        /// Configured client name
        #[arg(long)]
        client: String,

        /// Principal to act on behalf of (authorization_code clients)
        #[arg(long)]
        principal: Option<String>,
    },
    /// Fetch a template through one client
    Template {
        /// Configured client name
        #[arg(long)]
        client: String,

        /// Template name to look up
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error(transparent)]
    Setup(#[from] anyhow::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Param(#[from] ParamError),
}

impl CheckError {
    fn exit_code(&self) -> i32 {
        match self {
            CheckError::Setup(_) | CheckError::Config(_) => 1,
            CheckError::Token(_) => 3,
            CheckError::Request(request) => request_exit_code(request),
            CheckError::Param(ParamError::Request(request)) => request_exit_code(request),
            CheckError::Param(_) => 1,
        }
    }
}

fn request_exit_code(error: &RequestError) -> i32 {
    match error {
        RequestError::Authentication(_) => 3,
        RequestError::Routing(_) | RequestError::Transport(_) => 2,
    }
}

struct Stack {
    manager: ClientManager,
}

fn build_stack() -> Result<Stack, CheckError> {
    let config = Config::new()?;

    let http_client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(*config.http_client_timeout.as_ref())
        .build()
        .map_err(anyhow::Error::from)?;

    let registry = Arc::new(StaticServiceRegistry::from_seed(&config.service_registry));
    let router = Arc::new(ClientRouter::new(registry));
    let tokens = Arc::new(
        TokenProvider::new(
            http_client.clone(),
            Arc::new(MemoryAuthorizationStore::new()),
        )
        .with_safety_margin(*config.token_safety_margin.as_ref()),
    );
    let manager = ClientManager::new(&config, tokens, router, http_client)?;

    Ok(Stack { manager })
}

fn list_clients(stack: &Stack) -> Result<(), CheckError> {
    for name in stack.manager.client_names() {
        let handle = stack.manager.get_client(&name)?;
        println!(
            "{}: destination={} grant_type={} routing={} filters={}",
            handle.name(),
            handle.destination(),
            handle.grant_type(),
            handle.routing_mode(),
            handle.filter_mode(),
        );
    }
    Ok(())
}

async fn acquire_token(
    stack: &Stack,
    client: &str,
    principal: Option<&str>,
) -> Result<(), CheckError> {
    let handle = stack.manager.get_client(client)?;
    let token = handle.acquire_token(principal).await?;
    println!(
        "token acquired for {}: token_type={} expires_at={} scope={}",
        client,
        token.token_type,
        token.expires_at,
        token.scope.as_deref().unwrap_or("-"),
    );
    Ok(())
}

async fn fetch_template(stack: &Stack, client: &str, name: &str) -> Result<(), CheckError> {
    let handle = stack.manager.get_client(client)?;
    let param_client = ParamClient::new(handle);
    match param_client.get_template(name).await? {
        Some(template) => {
            println!(
                "template '{}' (author={}, active={}):",
                template.name,
                template.author.as_deref().unwrap_or("-"),
                template.active,
            );
            println!("{}", template.content);
        }
        None => println!("no template named '{}'", name),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CheckError> {
    let stack = build_stack()?;
    match cli.command.unwrap_or(Commands::List) {
        Commands::List => list_clients(&stack),
        Commands::Acquire { client, principal } => {
            acquire_token(&stack, &client, principal.as_deref()).await
        }
        Commands::Template { client, name } => fetch_template(&stack, &client, &name).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "courier=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => process::exit(0),
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(err.exit_code());
        }
    }
}
