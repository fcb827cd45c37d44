//! Application configuration.
//!
//! Settings live in a pretty-printed `config.json` inside the platform data
//! directory resolved by [`DataStorage`]. A missing file means defaults, so
//! the CLI works out of the box against the local SQLite backend.
//!
//! ## Layout
//!
//! ```json
//! {
//!   "user_id": "local",
//!   "sync": { "persist_timeout_ms": 8000, "reorder_debounce_ms": 100, "just_changed_ms": 1500, "retry_once": true, "poll_interval_ms": 5000 },
//!   "drag": { "activation_delay_ms": 250, "tolerance_px": 5.0 },
//!   "remote": { "api_url": "https://example.supabase.co", "api_key": "...", "table": "tasks" },
//!   "display": { "order": ["big_three", "urgent"], "hidden": ["completed"] }
//! }
//! ```
//!
//! `remote` and `display` are optional. Every other section falls back to its
//! defaults when omitted.

use super::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::libs::section::SectionId;
use crate::msg_print;
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Menu entry in the setup wizard.
#[derive(Debug, Clone)]
pub struct ConfigModule {
    pub key: String,
    pub name: String,
}

/// Timing of persistence and reconciliation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// A remote write slower than this counts as failed.
    pub persist_timeout_ms: u64,
    /// Window in which drag reorders are coalesced into one write.
    pub reorder_debounce_ms: u64,
    /// How long a task is flagged as just changed after a local edit.
    pub just_changed_ms: u64,
    /// Retry a failed write once before rolling back.
    pub retry_once: bool,
    /// Poll interval for backends without push notifications.
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            persist_timeout_ms: 8000,
            reorder_debounce_ms: 100,
            just_changed_ms: 1500,
            retry_once: true,
            poll_interval_ms: 5000,
        }
    }
}

impl SyncConfig {
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }

    pub fn reorder_debounce(&self) -> Duration {
        Duration::from_millis(self.reorder_debounce_ms)
    }

    pub fn just_changed(&self) -> Duration {
        Duration::from_millis(self.just_changed_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Press-and-hold activation of drag gestures.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DragConfig {
    pub activation_delay_ms: u64,
    pub tolerance_px: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        DragConfig {
            activation_delay_ms: 250,
            tolerance_px: 5.0,
        }
    }
}

/// Hosted PostgREST-style endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RemoteConfig {
    pub api_url: String,
    pub api_key: String,
    #[serde(default = "RemoteConfig::default_table")]
    pub table: String,
}

impl RemoteConfig {
    fn default_table() -> String {
        "tasks".to_string()
    }
}

/// Section visibility and display order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DisplayConfig {
    #[serde(default)]
    pub order: Vec<SectionId>,
    #[serde(default)]
    pub hidden: Vec<SectionId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default = "Config::default_user_id")]
    pub user_id: String,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub drag: DragConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            user_id: Self::default_user_id(),
            sync: SyncConfig::default(),
            drag: DragConfig::default(),
            remote: None,
            display: None,
        }
    }
}

impl Config {
    fn default_user_id() -> String {
        "local".to_string()
    }

    pub fn read() -> Result<Config> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if !config_file_path.exists() {
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(config_file_path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    /// Removes the config file. Returns false if there was none.
    pub fn delete() -> Result<bool> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if !config_file_path.exists() {
            return Ok(false);
        }
        fs::remove_file(config_file_path)?;
        Ok(true)
    }

    /// Interactive setup wizard. Existing values are offered as defaults.
    pub fn init() -> Result<Self> {
        let mut config = Self::read().unwrap_or_default();

        config.user_id = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptUserId.to_string())
            .default(config.user_id.clone())
            .interact_text()?;

        let modules = vec![
            ConfigModule {
                key: "sync".to_string(),
                name: "Sync".to_string(),
            },
            ConfigModule {
                key: "drag".to_string(),
                name: "Drag".to_string(),
            },
            ConfigModule {
                key: "remote".to_string(),
                name: "Remote".to_string(),
            },
            ConfigModule {
                key: "display".to_string(),
                name: "Display".to_string(),
            },
        ];

        let selected = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptSelectModules.to_string())
            .items(&modules.iter().map(|module| &module.name).collect::<Vec<_>>())
            .interact()?;

        for &selection in &selected {
            match modules[selection].key.as_str() {
                "sync" => config.sync = Self::init_sync(&config.sync)?,
                "drag" => config.drag = Self::init_drag(&config.drag)?,
                "remote" => config.remote = Self::init_remote(&config.remote)?,
                "display" => config.display = Some(Self::init_display(&config.display)?),
                _ => {}
            }
        }

        Ok(config)
    }

    fn init_sync(current: &SyncConfig) -> Result<SyncConfig> {
        msg_print!(Message::ConfigModuleSync);
        let theme = ColorfulTheme::default();
        Ok(SyncConfig {
            persist_timeout_ms: Input::with_theme(&theme)
                .with_prompt(Message::PromptPersistTimeout.to_string())
                .default(current.persist_timeout_ms)
                .interact_text()?,
            reorder_debounce_ms: Input::with_theme(&theme)
                .with_prompt(Message::PromptReorderDebounce.to_string())
                .default(current.reorder_debounce_ms)
                .interact_text()?,
            just_changed_ms: Input::with_theme(&theme)
                .with_prompt(Message::PromptJustChanged.to_string())
                .default(current.just_changed_ms)
                .interact_text()?,
            retry_once: Confirm::with_theme(&theme)
                .with_prompt(Message::PromptRetryOnce.to_string())
                .default(current.retry_once)
                .interact()?,
            poll_interval_ms: Input::with_theme(&theme)
                .with_prompt(Message::PromptPollInterval.to_string())
                .default(current.poll_interval_ms)
                .interact_text()?,
        })
    }

    fn init_drag(current: &DragConfig) -> Result<DragConfig> {
        msg_print!(Message::ConfigModuleDrag);
        let theme = ColorfulTheme::default();
        Ok(DragConfig {
            activation_delay_ms: Input::with_theme(&theme)
                .with_prompt(Message::PromptActivationDelay.to_string())
                .default(current.activation_delay_ms)
                .interact_text()?,
            tolerance_px: Input::with_theme(&theme)
                .with_prompt(Message::PromptDragTolerance.to_string())
                .default(current.tolerance_px)
                .interact_text()?,
        })
    }

    /// An empty URL switches back to the local database.
    fn init_remote(current: &Option<RemoteConfig>) -> Result<Option<RemoteConfig>> {
        msg_print!(Message::ConfigModuleRemote);
        let theme = ColorfulTheme::default();
        let default = current.clone().unwrap_or(RemoteConfig {
            api_url: String::new(),
            api_key: String::new(),
            table: RemoteConfig::default_table(),
        });

        let api_url: String = Input::with_theme(&theme)
            .with_prompt(Message::PromptApiUrl.to_string())
            .default(default.api_url)
            .allow_empty(true)
            .interact_text()?;
        if api_url.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(RemoteConfig {
            api_url,
            api_key: Input::with_theme(&theme)
                .with_prompt(Message::PromptApiKey.to_string())
                .default(default.api_key)
                .interact_text()?,
            table: Input::with_theme(&theme)
                .with_prompt(Message::PromptTable.to_string())
                .default(default.table)
                .interact_text()?,
        }))
    }

    fn init_display(current: &Option<DisplayConfig>) -> Result<DisplayConfig> {
        msg_print!(Message::ConfigModuleDisplay);
        let current = current.clone().unwrap_or_default();
        let sections: Vec<SectionId> = SectionId::FIXED.iter().cloned().chain([SectionId::Weekly, SectionId::Inbox]).collect();
        let defaults: Vec<bool> = sections.iter().map(|s| !current.hidden.contains(s)).collect();

        let visible = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptVisibleSections.to_string())
            .items(&sections.iter().map(|s| s.title()).collect::<Vec<_>>())
            .defaults(&defaults)
            .interact()?;

        let hidden = sections.iter().enumerate().filter(|(i, _)| !visible.contains(i)).map(|(_, s)| s.clone()).collect();
        Ok(DisplayConfig { order: current.order, hidden })
    }
}
