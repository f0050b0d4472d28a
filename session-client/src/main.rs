use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use session_client::{
    ApiRequest, ClientConfig, FileStorage, RouteAccess, RouteTable, SessionClient,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Session-aware client for the learning platform API", long_about = None)]
struct Options {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the access token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Print the claims of the stored token
    Whoami,
    /// Run the route guard for a view path
    Check { path: String },
    /// Authenticated GET against the API
    Get { path: String },
    /// Force one refresh of the access token
    Refresh,
    /// Sign out and drop the stored token
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Options::parse();
    let config = ClientConfig::from_env()?;
    let storage = Arc::new(FileStorage::new(&config.storage_dir));
    let session = SessionClient::builder(config.session)
        .storage(storage)
        .request_timeout(config.request_timeout)
        .build()
        .context("failed to start session client")?;

    match opts.command {
        Command::Login { email, password } => {
            let payload = session.login(&email, &password).await?;
            println!(
                "signed in as {} ({})",
                payload.email.as_deref().unwrap_or("unknown"),
                payload.role.as_deref().unwrap_or("no role")
            );
        }
        Command::Whoami => match session.current_user() {
            Some(payload) => println!("{}", serde_json::to_string_pretty(&payload.raw)?),
            None => println!("not signed in"),
        },
        Command::Check { path } => match RouteTable::application().resolve(&path) {
            RouteAccess::Public => println!("{path}: public"),
            RouteAccess::NotFound => println!("{path}: no such route"),
            RouteAccess::Redirect(target) => println!("{path}: redirects to {target}"),
            RouteAccess::Protected(allowed) => {
                let mut guard = session.guard(allowed);
                let state = guard.evaluate().await;
                println!(
                    "{path}: {state:?} -> {:?}",
                    state.render(session.config())
                );
            }
        },
        Command::Get { path } => {
            let response = session.api().send(&ApiRequest::get(path)).await?;
            println!("{}", response.text());
        }
        Command::Refresh => {
            session.refresh().await?;
            println!("access token refreshed");
        }
        Command::Logout => {
            session.logout().await;
            println!("signed out");
        }
    }

    Ok(())
}
