mod telegram;

pub use telegram::{spawn_reminder_job, TelegramChannel};
