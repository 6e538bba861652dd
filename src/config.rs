use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use hydramap_core::Auth;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// How the token is presented to the Data API
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    Bearer,
    Jwt,
}

impl AuthScheme {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Some(AuthScheme::Bearer),
            "jwt" => Some(AuthScheme::Jwt),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthScheme::Bearer => write!(f, "bearer"),
            AuthScheme::Jwt => write!(f, "jwt"),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Base URL of the Data API
    pub api_url: ConfigValue<String>,
    /// Entity declarations file (YAML or JSON)
    pub declarations: ConfigValue<PathBuf>,
    /// Access token, never printed
    #[serde(skip_serializing)]
    pub token: Option<ConfigValue<String>>,
    pub auth_scheme: ConfigValue<AuthScheme>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    api_url: Option<String>,
    declarations: Option<PathBuf>,
    token: Option<String>,
    auth_scheme: Option<AuthScheme>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut api_url = ConfigValue::new(
            "http://localhost:8000".to_string(),
            ConfigSource::Default,
        );
        let mut declarations = ConfigValue::new(
            Self::default_config_dir().join("entities.yaml"),
            ConfigSource::Default,
        );
        let mut token = None;
        let mut auth_scheme = ConfigValue::new(AuthScheme::default(), ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(url) = file_config.api_url {
                api_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(decl_path) = file_config.declarations {
                // Resolve relative paths against config file's directory
                let resolved_path = if decl_path.is_relative() {
                    path.parent().map(|p| p.join(&decl_path)).unwrap_or(decl_path)
                } else {
                    decl_path
                };
                declarations = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(t) = file_config.token {
                token = Some(ConfigValue::new(t, ConfigSource::File));
            }
            if let Some(scheme) = file_config.auth_scheme {
                auth_scheme = ConfigValue::new(scheme, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Ok(url) = std::env::var("HYDRAMAP_API_URL") {
            api_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(decl_path) = std::env::var("HYDRAMAP_DECLARATIONS") {
            declarations = ConfigValue::new(PathBuf::from(decl_path), ConfigSource::Environment);
        }
        if let Ok(t) = std::env::var("HYDRAMAP_TOKEN") {
            token = Some(ConfigValue::new(t, ConfigSource::Environment));
        }
        if let Ok(scheme) = std::env::var("HYDRAMAP_AUTH_SCHEME") {
            let parsed = AuthScheme::parse(&scheme).ok_or(ConfigError::InvalidValue {
                name: "HYDRAMAP_AUTH_SCHEME",
                value: scheme,
            })?;
            auth_scheme = ConfigValue::new(parsed, ConfigSource::Environment);
        }

        Ok(Self {
            api_url,
            declarations,
            token,
            auth_scheme,
            config_file,
        })
    }

    /// Credentials for the transport, if a token is configured.
    pub fn auth(&self) -> Option<Auth> {
        let token = self.token.as_ref()?.value.clone();
        Some(match self.auth_scheme.value {
            AuthScheme::Bearer => Auth::Bearer(token),
            AuthScheme::Jwt => Auth::Jwt(token),
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/hydramap/
    /// - macOS: ~/Library/Application Support/hydramap/
    /// - Windows: %APPDATA%/hydramap/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hydramap")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue { name: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue { name, value } => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.api_url.value, "http://localhost:8000");
        assert_eq!(config.api_url.source, ConfigSource::Default);
        assert!(config
            .declarations
            .value
            .to_string_lossy()
            .contains("entities.yaml"));
        assert_eq!(config.auth_scheme.value, AuthScheme::Bearer);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "api_url: https://data.example.com").unwrap();
        writeln!(file, "declarations: /etc/hydramap/entities.yaml").unwrap();
        writeln!(file, "token: secret").unwrap();
        writeln!(file, "auth_scheme: jwt").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.api_url.value, "https://data.example.com");
        assert_eq!(config.api_url.source, ConfigSource::File);
        assert_eq!(
            config.declarations.value,
            PathBuf::from("/etc/hydramap/entities.yaml")
        );
        assert_eq!(config.auth(), Some(Auth::Jwt("secret".to_string())));
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_declarations_resolved_against_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "declarations: entities.json").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(
            config.declarations.value,
            temp_dir.path().join("entities.json")
        );
        assert_eq!(config.declarations.source, ConfigSource::File);
        assert!(config.auth().is_none());
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "api_url: https://fromfile.example.com").unwrap();

        std::env::set_var("HYDRAMAP_API_URL", "https://fromenv.example.com");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.api_url.value, "https://fromenv.example.com");
        assert_eq!(config.api_url.source, ConfigSource::Environment);

        std::env::remove_var("HYDRAMAP_API_URL");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_token_is_not_serialized() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "token: secret").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
