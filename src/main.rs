mod app;
mod commands;
mod config;
mod error;
mod handlers;
mod moderation;
mod platform;
mod relay;
mod requests;
mod state;
mod store;
mod utils;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}
