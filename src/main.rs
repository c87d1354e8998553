#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod bot;
mod cli;
mod config;
mod db;
mod line;
mod utils;
mod web;

use cli::{Cli, Commands};
use config::Config;
use utils::formatting::format_checkin_time;
use web::WebServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let config = Arc::new(Config::load_from_file(&args.config)?);
    utils::logging::init_tracing(&config.logging);

    match args.command {
        Some(Commands::ValidateConfig) => {
            println!("configuration ok: {}", args.config.display());
            Ok(())
        }
        Some(Commands::ListUsers) => list_users(&config).await,
        None => run(config).await,
    }
}

async fn run(config: Arc<Config>) -> Result<()> {
    info!("line check-in bot starting up");

    let db_manager = Arc::new(db::DatabaseManager::new(&config.database).await?);
    db_manager.migrate().await?;

    let line_client = Arc::new(line::LineClient::new(config.clone())?);
    let dispatcher = Arc::new(bot::Dispatcher::new(
        db_manager.clone(),
        line_client.clone(),
        line_client.clone(),
    ));

    let web_server = WebServer::new(config, db_manager, dispatcher, line_client);

    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start().await {
            error!("web server error: {}", e);
        }
    });

    tokio::pin!(web_handle);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, beginning shutdown");
        },
        _ = &mut web_handle => {
            info!("web server task exited, beginning shutdown");
        },
    }

    web_handle.abort();
    info!("line check-in bot shutting down");
    Ok(())
}

async fn list_users(config: &Config) -> Result<()> {
    let db_manager = db::DatabaseManager::new(&config.database).await?;
    db_manager.migrate().await?;

    let users = db_manager.user_store().list_users().await?;
    if users.is_empty() {
        println!("no registered users");
        return Ok(());
    }

    for user in users {
        println!(
            "{}\t{}\t{}\t{}",
            user.user_id,
            user.line_user_id,
            user.name,
            format_checkin_time(&user.created_at),
        );
    }
    Ok(())
}
