use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub audit: AuditConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub rest_api: RestApiConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Project directory every audit command runs in
    pub working_dir: String,
    /// Maximum seconds a single command may run before it is killed (default: 60)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Seconds to keep reading output after a command exits, for pipes held
    /// open by background children (default: 5)
    #[serde(default = "default_output_grace")]
    pub output_grace_secs: u64,
    /// Directory scanned for form inputs during the dev server step
    #[serde(default = "default_client_src")]
    pub client_src: String,
    /// Root searched for readonly/disabled attributes
    #[serde(default = "default_scan_root")]
    pub scan_root: String,
    /// Directories whose `*.log` files are checked for console errors
    #[serde(default = "default_log_dirs")]
    pub log_dirs: Vec<String>,
    /// Capacity of the event channel feeding push listeners
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_command_timeout() -> u64 {
    60
}

fn default_output_grace() -> u64 {
    5
}

fn default_client_src() -> String {
    "client/src".to_string()
}

fn default_scan_root() -> String {
    ".".to_string()
}

fn default_log_dirs() -> Vec<String> {
    vec!["server/logs".to_string(), "client/logs".to_string()]
}

fn default_event_buffer() -> usize {
    256
}

/// Argument vectors for the external commands behind each step.
///
/// The first element is the program, the rest are its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_install")]
    pub install: Vec<String>,
    #[serde(default = "default_dev_server")]
    pub dev_server: Vec<String>,
    #[serde(default = "default_lint")]
    pub lint: Vec<String>,
    #[serde(default = "default_build")]
    pub build: Vec<String>,
    #[serde(default = "default_serve")]
    pub serve: Vec<String>,
    #[serde(default = "default_search")]
    pub search: String,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_string()).collect()
}

fn default_install() -> Vec<String> {
    argv(&["npm", "install"])
}

fn default_dev_server() -> Vec<String> {
    argv(&["timeout", "10s", "npm", "run", "dev"])
}

fn default_lint() -> Vec<String> {
    argv(&["npx", "tsc", "--noEmit"])
}

fn default_build() -> Vec<String> {
    argv(&["npm", "run", "build"])
}

fn default_serve() -> Vec<String> {
    argv(&["timeout", "10s", "npm", "start"])
}

fn default_search() -> String {
    "grep".to_string()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            install: default_install(),
            dev_server: default_dev_server(),
            lint: default_lint(),
            build: default_build(),
            serve: default_serve(),
            search: default_search(),
        }
    }
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestApiConfig {
    /// Port the API and WebSocket feed listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    7010
}

impl Default for RestApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub state: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether the server writes logs to a file instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Path to the project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".auditor/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so auditor works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // User config in ~/.config/auditor/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("auditor").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with AUDITOR_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("AUDITOR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .auditor/config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = Self::local_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create auditor config directory")?;
        }

        let toml_str = self.to_toml()?;
        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.audit.command_timeout_secs)
    }

    pub fn output_grace(&self) -> Duration {
        Duration::from_secs(self.audit.output_grace_secs)
    }

    /// Get absolute path to the audited project
    pub fn working_dir(&self) -> PathBuf {
        absolute(&self.audit.working_dir)
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        absolute(&self.paths.state)
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

fn absolute(path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audit: AuditConfig {
                working_dir: ".".to_string(),
                command_timeout_secs: default_command_timeout(),
                output_grace_secs: default_output_grace(),
                client_src: default_client_src(),
                scan_root: default_scan_root(),
                log_dirs: default_log_dirs(),
                event_buffer: default_event_buffer(),
            },
            commands: CommandsConfig::default(),
            rest_api: RestApiConfig::default(),
            paths: PathsConfig {
                state: ".auditor".to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }
}
