//! Configuration management for amend
//!
//! Stores settings in ~/.config/amend/config.json. A project may override
//! any subset of fields with an `amend.toml` at its root.

use crate::keyring;
use crate::llm::ModelChoice;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Project-local override file, looked up at the project root
pub const PROJECT_CONFIG_FILE: &str = "amend.toml";

const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Checkout of Specimin (the directory holding `gradlew`)
    pub specimin_dir: PathBuf,
    /// Checker Framework `checker.jar`
    pub checker_jar: PathBuf,
    /// Classpath handed to the checker (`checker-qual.jar` at minimum)
    pub checker_classpath: String,
    /// Comma-separated annotation processors
    pub checker_processors: String,
    /// OpenAI-compatible chat completions endpoint
    pub api_url: String,
    pub model_id: String,
    pub model: ModelChoice,
    pub system_message: String,
    /// Text between the declaring type and the diagnostics
    pub prompt_prefix: String,
    /// Text after the diagnostics
    pub prompt_suffix: String,
    pub heartbeat_secs: u64,
    pub response_timeout_secs: u64,
    pub max_iterations: usize,
    pub minimizer_timeout_secs: u64,
    pub verifier_timeout_secs: u64,
    /// Canned model response used by `--model mock`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_response_path: Option<PathBuf>,
    /// Treat a crashed or timed-out checker as a clean result
    pub tool_error_is_clean: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            specimin_dir: PathBuf::from("specimin"),
            checker_jar: PathBuf::from("checker-framework/checker/dist/checker.jar"),
            checker_classpath: "checker-framework/checker/dist/checker-qual.jar".to_string(),
            checker_processors: "org.checkerframework.checker.resourceleak.ResourceLeakChecker"
                .to_string(),
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model_id: "gpt-4".to_string(),
            model: ModelChoice::default(),
            system_message: "You are a Java expert. You fix Checker Framework errors \
                             without changing a method's signature."
                .to_string(),
            prompt_prefix: "The Checker Framework reports the following errors for the code above:"
                .to_string(),
            prompt_suffix: "Rewrite the offending method so these errors go away. Keep its \
                            name, return type and parameter types. Reply with the complete \
                            method in a single ```java code block."
                .to_string(),
            heartbeat_secs: 10,
            response_timeout_secs: 60,
            max_iterations: 5,
            minimizer_timeout_secs: 600,
            verifier_timeout_secs: 300,
            mock_response_path: None,
            tool_error_is_clean: false,
        }
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("amend"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    fn load_from(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(err) => {
                    preserve_corrupt_config(path, &content);
                    eprintln!(
                        "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                        err
                    );
                }
            }
        }
        Self::default()
    }

    /// Apply `amend.toml` from `project_root`, if present.
    ///
    /// Keys absent from the file keep their current value. Unknown keys are
    /// reported and ignored.
    pub fn with_project_overrides(self, project_root: &Path) -> Result<Self, String> {
        let path = project_root.join(PROJECT_CONFIG_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Ok(self),
        };
        self.merge_toml(&content)
            .map_err(|e| format!("Invalid {}: {}", path.display(), e))
    }

    fn merge_toml(self, content: &str) -> Result<Self, String> {
        let overrides: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
        let mut merged = match toml::Value::try_from(&self).map_err(|e| e.to_string())? {
            toml::Value::Table(table) => table,
            _ => return Err("config did not serialize to a table".to_string()),
        };

        let known = merged.keys().cloned().collect::<Vec<_>>();
        for (key, value) in overrides {
            if !known.contains(&key) && key != "mock_response_path" {
                tracing::warn!(key = %key, "ignoring unknown key in {}", PROJECT_CONFIG_FILE);
                continue;
            }
            merged.insert(key, value);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| e.to_string())
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)) {
                eprintln!("  Warning: Failed to set config directory permissions: {}", e);
            }
        }

        self.save_to(&dir.join("config.json"))
    }

    fn save_to(&self, path: &Path) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Get the API key (from environment or keychain)
    pub fn api_key(&self) -> Option<String> {
        // Environment variable takes precedence
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key.trim().to_string());
            }
        }

        match keyring::get_api_key() {
            Ok(key) => key,
            Err(err) => {
                keyring::warn_keychain_error_once("API key", &err);
                None
            }
        }
    }

    /// Validate API key format (should start with sk-)
    pub fn validate_api_key_format(key: &str) -> bool {
        key.starts_with("sk-")
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/amend/config.json".to_string())
    }
}

/// Interactive prompt to set up API key
pub fn setup_api_key_interactive() -> Result<String, String> {
    use std::io::{self, Write};

    println!();
    println!("  ┌─────────────────────────────────────────────────────────┐");
    println!("  │  OPENAI SETUP                                           │");
    println!("  └─────────────────────────────────────────────────────────┘");
    println!();
    println!("  amend asks an OpenAI-compatible model to rewrite failing methods.");
    println!();
    println!("  1. Create an API key at: https://platform.openai.com/api-keys");
    println!("  2. Paste it below (saved in your system keychain)");
    println!();
    print!("  API Key: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim().to_string();

    if key.is_empty() {
        return Err("No API key provided".to_string());
    }

    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like an OpenAI key (should start with sk-)");
        println!("     Saving anyway...");
    }

    keyring::set_api_key(&key).map_err(|e| {
        format!(
            "Failed to store API key in system keychain: {}. \
             You can set the {} environment variable instead.",
            e, API_KEY_ENV
        )
    })?;

    // Write defaults on first setup so users have a file to edit
    let path_exists = Config::config_path().map(|p| p.exists()).unwrap_or(false);
    if !path_exists {
        Config::default().save()?;
    }

    println!();
    println!("  + API key saved to system keychain");
    println!("  + Settings live in {}", Config::config_location());
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        eprintln!("  Warning: Failed to set temp config file permissions: {}", e);
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}
