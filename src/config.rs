use serde::Deserialize;
use std::env;
use std::path::Path;
use url::Url;
use crate::error::{Result, SandboxError};

pub const DEFAULT_CONFIG_FILE: &str = "cuckoo-submit.toml";
pub const DEFAULT_TOR_PROXY: &str = "http://localhost:8118";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.1; Trident/4.0; InfoPath.2; .NET CLR 2.0.50727; WOW64)";
pub const DEFAULT_WILDFIRE_URL: &str = "https://wildfire.paloaltonetworks.com";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(default)]
    pub wildfire: Option<WildFireConfig>,
}

/// Where the sandbox lives and how to reach it.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SandboxConfig {
    /// Web root of the sandbox, e.g. `https://cuckoo.example.net`. The API is expected under `<root>/api`.
    pub root: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_tls: bool,
    pub proxy: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            username: None,
            password: None,
            verify_tls: true,
            proxy: None,
        }
    }
}

/// Privoxy (or similar) endpoint in front of Tor, used to fetch samples anonymously.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TorConfig {
    pub proxy: String,
    pub user_agent: String,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            proxy: DEFAULT_TOR_PROXY.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct WildFireConfig {
    pub api_key: String,
    #[serde(default = "default_wildfire_url")]
    pub base_url: String,
}

fn default_wildfire_url() -> String {
    DEFAULT_WILDFIRE_URL.to_owned()
}

impl Config {
    /// Reads `path` if given (or the default file when it exists), then lets the environment override it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("ignoring unreadable .env file: {e}");
            }
        }

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SandboxError::Config(format!("cannot read {}: {e}", path.display())))?;

        toml::from_str(&contents)
            .map_err(|e| SandboxError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("CUCKOO_ROOT") {
            self.sandbox.root = root;
        }
        if let Some(username) = lookup("CUCKOO_USERNAME") {
            self.sandbox.username = Some(username);
        }
        if let Some(password) = lookup("CUCKOO_PASSWORD") {
            self.sandbox.password = Some(password);
        }
        if let Some(verify) = lookup("CUCKOO_VERIFY_TLS") {
            self.sandbox.verify_tls = !matches!(verify.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
        if let Some(proxy) = lookup("CUCKOO_PROXY") {
            self.sandbox.proxy = Some(proxy);
        }
        if let Some(proxy) = lookup("TOR_PROXY") {
            self.tor.proxy = proxy;
        }
        if let Some(api_key) = lookup("WILDFIRE_API_KEY") {
            self.wildfire
                .get_or_insert_with(|| WildFireConfig { api_key: String::new(), base_url: default_wildfire_url() })
                .api_key = api_key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sandbox.root.is_empty() {
            return Err(SandboxError::Config("sandbox root URL is not set (CUCKOO_ROOT or [sandbox].root)".to_owned()));
        }
        Url::parse(&self.sandbox.root)
            .map_err(|e| SandboxError::Config(format!("invalid sandbox root {}: {e}", self.sandbox.root)))?;

        Ok(())
    }
}
