use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub frontend: FrontendConfig,
    pub preflight: PreflightConfig,
    pub install: InstallConfig,
    pub readiness: ReadinessConfig,
    pub shutdown: ShutdownConfig,
    /// Candidate `.env` locations, checked in order, relative to the project root
    pub env_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub dir: PathBuf,
    /// Run under `sh -c` with `HOST` set to `bind` and `PORT` set to `port`
    pub command: String,
    /// Address the backend listens on
    pub bind: String,
    /// Address the readiness probe and banner connect to
    pub host: String,
    pub port: u16,
    pub health_path: String,
    pub docs_path: String,
    /// Files that must exist inside `dir` before anything is started
    pub required_files: Vec<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backend"),
            command: "python3 -m uvicorn backend_adapter:app --host \"$HOST\" --port \"$PORT\"".to_string(),
            bind: "0.0.0.0".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            health_path: "/health".to_string(),
            docs_path: "/docs".to_string(),
            required_files: vec![PathBuf::from("requirements.txt"), PathBuf::from("backend_adapter.py")],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Directories tried in order; the first one holding `marker_file` wins
    pub candidates: Vec<PathBuf>,
    pub marker_file: String,
    pub command: String,
    pub port: u16,
    pub analysis_path: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                PathBuf::from("frontend"),
                PathBuf::from("university-frontend"),
                PathBuf::from("client"),
            ],
            marker_file: "package.json".to_string(),
            command: "npm run dev".to_string(),
            port: 3000,
            analysis_path: "/analysis".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    pub required_tools: Vec<String>,
    /// Only required when a frontend directory is discovered
    pub frontend_tools: Vec<String>,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            required_tools: vec!["python3".to_string(), "pip3".to_string()],
            frontend_tools: vec!["node".to_string(), "npm".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    pub enabled: bool,
    pub backend_command: String,
    pub frontend_command: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend_command: "pip3 install -r requirements.txt".to_string(),
            frontend_command: "npm install".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
    pub max_attempts: u32,
    pub attempt_timeout_ms: u64,
    pub deadline_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            interval_ms: 250,
            max_interval_ms: 2000,
            multiplier: 2.0,
            max_attempts: 30,
            attempt_timeout_ms: 2000,
            deadline_ms: 30000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub grace_period_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_period_ms: 5000 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            frontend: FrontendConfig::default(),
            preflight: PreflightConfig::default(),
            install: InstallConfig::default(),
            readiness: ReadinessConfig::default(),
            shutdown: ShutdownConfig::default(),
            env_files: vec![PathBuf::from("backend/.env"), PathBuf::from(".env")],
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// URL the readiness probe polls
    pub fn health_url(&self) -> String {
        format!("{}{}", self.backend_url(), self.backend.health_path)
    }

    pub fn backend_url(&self) -> String {
        format!("http://{}:{}", self.backend.host, self.backend.port)
    }

    pub fn docs_url(&self) -> String {
        format!("{}{}", self.backend_url(), self.backend.docs_path)
    }

    pub fn frontend_url(&self) -> String {
        format!("http://localhost:{}", self.frontend.port)
    }

    pub fn analysis_url(&self) -> String {
        format!("{}{}", self.frontend_url(), self.frontend.analysis_path)
    }
}
