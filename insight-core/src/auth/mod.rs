//! Authentication module for insight-core.
//!
//! Provides:
//! - Service tokens (callers → insight-server)
//! - Per-user repository-access credentials forwarded to upstream services

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::SystemTime;

use crate::error::{Error, Result};

/// Service token guarding the insight-server API
#[derive(Debug, Clone)]
pub struct ServiceToken {
    /// Random 256-bit token
    pub token: [u8; 32],
    /// Creation timestamp (for rotation)
    pub created_at: SystemTime,
    /// Token ID for logging
    pub token_id: uuid::Uuid,
}

impl ServiceToken {
    /// Generate a new service token
    pub fn generate() -> Self {
        let mut token = [0u8; 32];
        for byte in &mut token {
            *byte = rand::random();
        }

        Self {
            token,
            created_at: SystemTime::now(),
            token_id: uuid::Uuid::new_v4(),
        }
    }

    /// Base64 form sent by callers in `Authorization: Bearer`
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.token)
    }

    /// Write token to file with restricted permissions (0600)
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.encoded())?;
        fs::set_permissions(path, Permissions::from_mode(0o600))?;
        Ok(())
    }

    /// Read token from file
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let encoded = fs::read_to_string(path)?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Auth(format!("Invalid token encoding: {}", e)))?;

        if decoded.len() != 32 {
            return Err(Error::Auth("Invalid token length".into()));
        }

        let mut token = [0u8; 32];
        token.copy_from_slice(&decoded);

        Ok(Self {
            token,
            created_at: SystemTime::now(),
            token_id: uuid::Uuid::new_v4(),
        })
    }

    /// Read the token at `path`, generating and persisting one if absent
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::read_from_file(path);
        }
        let token = Self::generate();
        token.write_to_file(path)?;
        Ok(token)
    }

    /// Verify a token matches
    pub fn verify(&self, candidate: &[u8]) -> bool {
        // Length is fixed, so compare every byte regardless of early mismatch
        candidate.len() == self.token.len()
            && candidate
                .iter()
                .zip(self.token.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

/// Per-user repository-access credential, forwarded on every upstream call.
#[derive(Clone, PartialEq, Eq)]
pub struct UserCredentials {
    github_token: String,
}

impl UserCredentials {
    pub fn new(github_token: impl Into<String>) -> Self {
        Self {
            github_token: github_token.into().trim().to_string(),
        }
    }

    /// Build from an optional raw value, failing with `Auth` when absent or blank
    pub fn require(github_token: Option<&str>) -> Result<Self> {
        let creds = Self::new(github_token.unwrap_or_default());
        creds.ensure_present()?;
        Ok(creds)
    }

    pub fn github_token(&self) -> &str {
        &self.github_token
    }

    /// Fail before any network I/O when the credential is blank
    pub fn ensure_present(&self) -> Result<()> {
        if self.github_token.is_empty() {
            return Err(Error::Auth("missing repository access token".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("github_token", &"<redacted>")
            .finish()
    }
}
