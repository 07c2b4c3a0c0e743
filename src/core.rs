use std::sync::Arc;

use teloxide::Bot;
use tokio::sync::Mutex;
use tracing::info;

use crate::channels::{self, TelegramChannel};
use crate::config::AppConfig;
use crate::gate::GateState;
use crate::store::EventStore;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. Event store
    let store = Arc::new(Mutex::new(EventStore::load(&config.data_file)));
    {
        let guard = store.lock().await;
        info!(
            file = %config.data_file,
            events = guard.events().len(),
            "Event store loaded"
        );
    }

    // 2. Drunk-mode gate (in-memory only, lost on restart)
    let gate = Arc::new(Mutex::new(GateState::new()));

    // 3. Telegram channel
    let bot = Bot::new(&config.bot_token);
    let channel = Arc::new(TelegramChannel::new(
        bot.clone(),
        Arc::clone(&store),
        gate,
    ));

    // 4. Reminder job — wired only when enabled by config
    if config.reminders_enabled {
        channels::spawn_reminder_job(bot, Arc::clone(&store));
    } else {
        info!("Reminder job disabled (set REMINDERS_ENABLED=true to activate)");
    }

    info!("Bot started");
    channel.start_with_retry().await;
    Ok(())
}
