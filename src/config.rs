//! Runtime configuration read from the environment

use crate::runtime::DEFAULT_LANE_IDLE;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_SHOP_URL: &str = "https://sticker-dude.fun";
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_WELCOME_DELAY: Duration = Duration::from_millis(4000);
const DEFAULT_CONVERT_DELAY: Duration = Duration::from_millis(2500);

pub const STICKER_PACK_NAME: &str = "StickerDude";

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub bridge_url: String,
    pub bridge_token: Option<String>,
    /// Upper bound on every call to the chat transport
    pub call_timeout: Duration,
    /// Idle time after which a contact's lane is retired
    pub lane_idle: Duration,
    pub files_dir: PathBuf,
    pub script: Script,
}

impl BotConfig {
    pub fn from_env() -> Self {
        let db_path = std::env::var("STICKERBOT_DB_PATH").map_or_else(
            |_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(format!("{home}/.stickerbot/stickerbot.db"))
            },
            PathBuf::from,
        );

        let port = env_parse("STICKERBOT_PORT").unwrap_or(DEFAULT_PORT);
        let bridge_url = std::env::var("STICKERBOT_BRIDGE_URL")
            .unwrap_or_else(|_| DEFAULT_BRIDGE_URL.to_string());
        let bridge_token = std::env::var("STICKERBOT_BRIDGE_TOKEN").ok();
        let call_timeout = env_parse("STICKERBOT_CALL_TIMEOUT_SECS")
            .map_or(DEFAULT_CALL_TIMEOUT, Duration::from_secs);
        let lane_idle = env_parse("STICKERBOT_LANE_IDLE_SECS")
            .map_or(DEFAULT_LANE_IDLE, Duration::from_secs);
        let files_dir = std::env::var("STICKERBOT_FILES_DIR")
            .map_or_else(|_| PathBuf::from("public/files"), PathBuf::from);

        let shop_url =
            std::env::var("STICKERBOT_SHOP_URL").unwrap_or_else(|_| DEFAULT_SHOP_URL.to_string());
        let mut script = Script::new(shop_url);
        if let Some(ms) = env_parse("STICKERBOT_WELCOME_DELAY_MS") {
            script.welcome_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("STICKERBOT_CONVERT_DELAY_MS") {
            script.convert_delay = Duration::from_millis(ms);
        }

        Self {
            db_path,
            port,
            bridge_url,
            bridge_token,
            call_timeout,
            lane_idle,
            files_dir,
            script,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Reply copy and cadence for the scripted flows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub shop_url: String,
    /// Typing hold before each WELCOMING send
    pub welcome_delay: Duration,
    /// Typing hold around the sticker send in CONVERTING
    pub convert_delay: Duration,
}

impl Script {
    pub fn new(shop_url: impl Into<String>) -> Self {
        Self {
            shop_url: shop_url.into(),
            welcome_delay: DEFAULT_WELCOME_DELAY,
            convert_delay: DEFAULT_CONVERT_DELAY,
        }
    }

    /// Same copy with no typing holds (tests)
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            welcome_delay: Duration::ZERO,
            convert_delay: Duration::ZERO,
            ..Self::new(DEFAULT_SHOP_URL)
        }
    }

    pub fn intro(name: &str, grant: i64) -> String {
        format!(
            "Que hacés {name}! Cuchá, la cosa es simple:\n\
             Vos me mandás *imágenes, gifs o videos cortos* y yo te devuelvo un sticker.\n\
             Cada sticker sale 1 token. Te regalo {grant} token, probá y si te sirve hablamos"
        )
    }

    pub fn credited(grant: i64) -> String {
        format!("Se te acreditaron: *{grant} tokens*")
    }

    pub fn out_of_tokens(&self) -> String {
        format!(
            "*Se acabó lo que se daba.*\n\
             Ya no tenés tokens disponibles. Tirame unos pesitos acá {}\n\n\
             Un token = un flynn paff",
            self.shop_url
        )
    }

    pub fn exhausted(&self) -> String {
        format!(
            "Te quedaste sin tokens pa. Tirame unos pesitos, dale.\n{}",
            self.shop_url
        )
    }

    pub fn remaining(count: i64) -> String {
        format!("Te quedan {count} tokens")
    }

    pub fn sticker_options(&self) -> crate::transport::StickerOptions {
        crate::transport::StickerOptions {
            author: self.shop_url.clone(),
            name: STICKER_PACK_NAME.to_string(),
            categories: vec![STICKER_PACK_NAME.to_string()],
        }
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new(DEFAULT_SHOP_URL)
    }
}
