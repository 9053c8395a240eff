//! Gateway configuration.
//!
//! Loaded from a JSON file, then overlaid with environment variables:
//!
//! ```json
//! {
//!   "public_base_url": "https://identity.example.com",
//!   "data_dir": "/var/lib/igw",
//!   "kdf": { "m_cost": 65536, "t_cost": 3, "p_cost": 4 }
//! }
//! ```
//!
//! | Variable              | Field             |
//! |-----------------------|-------------------|
//! | `IGW_PUBLIC_BASE_URL` | `public_base_url` |
//! | `IGW_DATA_DIR`        | `data_dir`        |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::KdfParams;
use crate::error::{GatewayError, Result};
use crate::pattern::normalize_identity;

pub const ENV_PUBLIC_BASE_URL: &str = "IGW_PUBLIC_BASE_URL";
pub const ENV_DATA_DIR: &str = "IGW_DATA_DIR";

const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:5678";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Prefix of every local identity URL.
    pub public_base_url: String,
    /// Directory of the file backend. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Argon2id parameters used for new key pairs.
    pub kdf: KdfParams,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            data_dir: None,
            kdf: KdfParams::default(),
        }
    }
}

impl GatewayConfig {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            ..Self::default()
        }
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            GatewayError::InvalidFileFormat(format!("config {}: {e}", path.display()))
        })
    }

    /// Overlay `IGW_PUBLIC_BASE_URL` and `IGW_DATA_DIR` when set and non-empty.
    pub fn apply_env(mut self) -> Self {
        if let Some(url) = env_var(ENV_PUBLIC_BASE_URL) {
            self.public_base_url = url;
        }
        if let Some(dir) = env_var(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// `{public_base_url}/{user_name}`
    pub fn identity_url(&self, user_name: &str) -> String {
        identity_url(&self.public_base_url, user_name)
    }

    /// Inverse of [`identity_url`](Self::identity_url); `None` for foreign URLs.
    pub fn user_name_from_identity_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        user_name_from_identity_url(&self.public_base_url, url)
    }
}

pub fn identity_url(base_url: &str, user_name: &str) -> String {
    format!("{}/{}", normalize_identity(base_url), user_name)
}

pub fn user_name_from_identity_url<'a>(base_url: &str, url: &'a str) -> Option<&'a str> {
    let base = normalize_identity(base_url);
    let name = normalize_identity(url).strip_prefix(base)?.strip_prefix('/')?;
    if name.is_empty() || name.contains('/') {
        None
    } else {
        Some(name)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
