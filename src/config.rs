use chrono_tz::Tz;

/// Time zone used for all date math (list annotations, reminder sweep).
pub const TZ: Tz = chrono_tz::Europe::Paris;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Telegram bot token, from `BOT_TOKEN`.
    pub bot_token: String,
    /// Path of the JSON backing file, from `DATA_FILE`.
    pub data_file: String,
    /// Whether the daily reminder sweep is scheduled, from
    /// `REMINDERS_ENABLED`. Off by default: the job is wired but inert.
    pub reminders_enabled: bool,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN")
            .map_err(|_| anyhow::anyhow!("BOT_TOKEN is not set in the environment"))?;
        let data_file = std::env::var("DATA_FILE").unwrap_or_else(|_| default_data_file());
        let reminders_enabled = std::env::var("REMINDERS_ENABLED")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(Self {
            bot_token,
            data_file,
            reminders_enabled,
        })
    }
}

fn default_data_file() -> String {
    "bot_data.json".to_string()
}
