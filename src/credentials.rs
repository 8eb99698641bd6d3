//! Application credentials loaded from a `.env` file and the process
//! environment.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// Environment key for the numeric application id.
pub const API_ID_KEY: &str = "API_ID";

/// Environment key for the application secret.
pub const API_HASH_KEY: &str = "API_HASH";

/// Environment key for the account phone number.
pub const PHONE_NUMBER_KEY: &str = "PHONE_NUMBER";

/// Raw key-value credentials.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a credential value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Returns a required, non-blank credential or an error when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is absent or its value is blank.
    pub fn require(&self, key: &str) -> anyhow::Result<String> {
        self.vars
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.trim().to_owned())
            .ok_or_else(|| anyhow::anyhow!("missing required credential: {key}"))
    }

    /// Overlay values from the process environment for the given keys.
    pub fn overlay_env(&mut self, keys: &[&str]) {
        for key in keys {
            if let Ok(value) = std::env::var(key) {
                self.vars.insert((*key).to_owned(), value);
            }
        }
    }
}

/// Typed application identity and account phone number.
#[derive(Clone)]
pub struct AppCredentials {
    /// Numeric application id.
    pub api_id: i64,
    /// Application secret.
    pub api_hash: String,
    /// Account phone number in E.164 form.
    pub phone_number: String,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"[REDACTED]")
            .field("phone_number", &"[REDACTED]")
            .finish()
    }
}

impl AppCredentials {
    /// Extract the typed credentials.
    ///
    /// # Errors
    ///
    /// Returns an error when a key is missing or `API_ID` is not an integer.
    pub fn from_credentials(credentials: &Credentials) -> anyhow::Result<Self> {
        let raw_id = credentials.require(API_ID_KEY)?;
        let api_id = raw_id
            .parse::<i64>()
            .with_context(|| format!("{API_ID_KEY} must be an integer, got {raw_id:?}"))?;

        Ok(Self {
            api_id,
            api_hash: credentials.require(API_HASH_KEY)?,
            phone_number: credentials.require(PHONE_NUMBER_KEY)?,
        })
    }
}

/// Load credentials from a `.env` path.
///
/// A missing file yields empty credentials so the process environment alone
/// can supply them.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be parsed.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        debug!(path = %path.display(), "no .env file, relying on process environment");
        return Ok(Credentials::default());
    }

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    Ok(Credentials { vars })
}

/// Load credentials from `path`, let the process environment override them,
/// and extract the typed application credentials.
///
/// # Errors
///
/// Returns an error if the file is malformed or a required key is missing.
pub fn load_app_credentials(path: &Path) -> anyhow::Result<AppCredentials> {
    let mut credentials = load_credentials(path)?;
    credentials.overlay_env(&[API_ID_KEY, API_HASH_KEY, PHONE_NUMBER_KEY]);
    AppCredentials::from_credentials(&credentials)
}

/// Restrict a file to owner read/write when supported.
///
/// # Errors
///
/// Returns an error if permissions cannot be updated.
pub fn enforce_private_file_permissions(path: &Path) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
