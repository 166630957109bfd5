//! Server configuration loaded from TOML.
//!
//! A context name resolves to `/etc/esurat/<name>.toml`; anything
//! containing `/` or `.` is treated as a literal path.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Full server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub jwt: JwtConfig,

    /// Office identity used in outgoing mail numbers.
    #[serde(default)]
    pub office: OfficeConfig,

    /// Superadmin credential written by `esurat context create`. When
    /// absent the directory's seeded default password stays active.
    #[serde(default)]
    pub superadmin: Option<SuperadminConfig>,

    /// Remote mirror target. When absent mirroring is disabled.
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding all durable state for this deployment.
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_expire_secs")]
    pub expire_secs: i64,
}

fn default_expire_secs() -> i64 {
    86400
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfficeConfig {
    #[serde(default = "default_office_code")]
    pub code: String,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            code: default_office_code(),
        }
    }
}

fn default_office_code() -> String {
    "W3-A7".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuperadminConfig {
    /// PHC-formatted argon2id hash.
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Base URL of the remote REST store.
    pub url: String,
    pub api_key: String,
}

impl ServerConfig {
    /// Resolve a context name or path to a config file path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from("/etc/esurat").join(format!("{}.toml", name_or_path))
        }
    }

    /// Load configuration from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Refuse to start with a configuration that cannot work.
    pub fn verify(&self) -> anyhow::Result<()> {
        if self.jwt.secret.is_empty() {
            anyhow::bail!(
                "JWT secret is empty in configuration.\n\
                 Run `esurat context create <name>` to set up the server first."
            );
        }
        if self.storage.data_dir.is_empty() {
            anyhow::bail!("Storage data_dir is empty in configuration.");
        }
        if let Some(sa) = &self.superadmin {
            if sa.password_hash.is_empty() {
                anyhow::bail!(
                    "superadmin.password_hash is empty; remove the [superadmin] \
                     section to keep the seeded default."
                );
            }
        }
        if let Some(mirror) = &self.mirror {
            if mirror.url.is_empty() {
                anyhow::bail!(
                    "mirror.url is empty; remove the [mirror] section to disable mirroring."
                );
            }
        }
        Ok(())
    }
}
