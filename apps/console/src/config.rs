use std::{collections::HashMap, fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub session_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".into(),
            session_dir: PathBuf::from("./data"),
        }
    }
}

/// Defaults, overridden by `console.toml` when present, overridden in
/// turn by environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("console.toml") {
        apply_file(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("ADMIN_API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("ADMIN_SESSION_DIR") {
        settings.session_dir = PathBuf::from(v);
    }

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("api_url") {
            settings.api_url = v.clone();
        }
        if let Some(v) = file_cfg.get("session_dir") {
            settings.session_dir = PathBuf::from(v);
        }
    }
}
