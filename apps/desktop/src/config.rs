use std::{fs, path::PathBuf, time::Duration};

use anyhow::Context;
use control_core::ControllerSettings;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ws_url: String,
    pub config_dir: PathBuf,
    pub log_filter: String,
    pub group_queue_interval_ms: u64,
    pub group_queue_batch: usize,
    pub ui_channel_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let engine = ControllerSettings::default();
        Self {
            ws_url: "wss://interactive.local/gameClient".into(),
            config_dir: PathBuf::from("./data"),
            log_filter: "info".into(),
            group_queue_interval_ms: engine.group_queue_interval.as_millis() as u64,
            group_queue_batch: engine.group_queue_batch,
            ui_channel_capacity: engine.ui_channel_capacity,
        }
    }
}

impl Settings {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            group_queue_interval: Duration::from_millis(self.group_queue_interval_ms.max(1)),
            group_queue_batch: self.group_queue_batch,
            ui_channel_capacity: self.ui_channel_capacity,
        }
    }
}

/// Every key is optional; missing keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    ws_url: Option<String>,
    config_dir: Option<PathBuf>,
    log_filter: Option<String>,
    group_queue_interval_ms: Option<u64>,
    group_queue_batch: Option<usize>,
    ui_channel_capacity: Option<usize>,
}

/// Defaults, then the settings file if it exists, then environment.
pub fn load_settings(path: &std::path::Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file.ws_url {
        settings.ws_url = v;
    }
    if let Some(v) = file.config_dir {
        settings.config_dir = v;
    }
    if let Some(v) = file.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file.group_queue_interval_ms {
        settings.group_queue_interval_ms = v;
    }
    if let Some(v) = file.group_queue_batch {
        settings.group_queue_batch = v;
    }
    if let Some(v) = file.ui_channel_capacity {
        settings.ui_channel_capacity = v;
    }
    Ok(())
}

/// `APP__*` wins over the plain name when both are set.
fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("INTERACTIVE_WS_URL") {
        settings.ws_url = v;
    }
    if let Some(v) = var("APP__WS_URL") {
        settings.ws_url = v;
    }

    if let Some(v) = var("INTERACTIVE_CONFIG_DIR") {
        settings.config_dir = PathBuf::from(v);
    }
    if let Some(v) = var("APP__CONFIG_DIR") {
        settings.config_dir = PathBuf::from(v);
    }

    if let Some(v) = var("INTERACTIVE_LOG") {
        settings.log_filter = v;
    }
}
