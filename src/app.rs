use crate::{config::Config, handlers, moderation, platform::TelegramMessenger, state::AppState};
use anyhow::Result;
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use teloxide::{dptree, prelude::*};

pub async fn run() -> Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    let bot = Bot::from_env();
    // Polling only.
    bot.delete_webhook().await.ok();

    let cfg = Config::from_env();
    let state = Arc::new(AppState::open(cfg)?);
    let messenger = Arc::new(TelegramMessenger::connect(bot.clone()).await?);

    info!(
        "Starting request-tracker: {} pairing(s), {} pending request(s), state in {}",
        state.pairings.all().len(),
        state.requests.pending_count(),
        state.cfg.state_dir.display()
    );

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::on_message))
        .branch(Update::filter_callback_query().endpoint(moderation::on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, messenger])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
