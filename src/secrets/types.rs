//! Secret variants and the views handed back to callers.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use zeroize::Zeroizing;

/// A string that never shows up in `Debug`/`Display` output and is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Serializes the real value: views are serialized only to hand them to the script.
impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

/// Tag shared by a stored secret and its view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    Text,
    Ssh,
    UserPass,
}

impl SecretKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Ssh => "ssh",
            Self::UserPass => "userpass",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored secret. Replaced wholesale when its id is added again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    Text {
        text: SecretString,
    },
    /// Key material stays in memory until a read asks for a file.
    SshPrivateKey {
        user: String,
        private_key: SecretString,
        passphrase: SecretString,
    },
    UserPassword {
        user: String,
        password: SecretString,
    },
}

impl Secret {
    pub fn kind(&self) -> SecretKind {
        match self {
            Self::Text { .. } => SecretKind::Text,
            Self::SshPrivateKey { .. } => SecretKind::Ssh,
            Self::UserPassword { .. } => SecretKind::UserPass,
        }
    }
}

/// What a read returns. For SSH keys this carries the materialized file path,
/// never the key bytes.
///
/// Serialized form is what the script sees, e.g.
/// `{"type":"ssh","user":"git","privateKeyFile":"/..","passphrase":""}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SecretView {
    #[serde(rename = "text")]
    Text { text: SecretString },

    #[serde(rename = "ssh", rename_all = "camelCase")]
    SshPrivateKey {
        user: String,
        private_key_file: PathBuf,
        passphrase: SecretString,
    },

    #[serde(rename = "userpass")]
    UserPassword { user: String, password: SecretString },
}

impl SecretView {
    pub fn kind(&self) -> SecretKind {
        match self {
            Self::Text { .. } => SecretKind::Text,
            Self::SshPrivateKey { .. } => SecretKind::Ssh,
            Self::UserPassword { .. } => SecretKind::UserPass,
        }
    }

    /// User name for credential variants.
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::SshPrivateKey { user, .. } | Self::UserPassword { user, .. } => Some(user),
        }
    }

    /// Path of the materialized key, for the SSH variant only.
    pub fn private_key_file(&self) -> Option<&Path> {
        match self {
            Self::SshPrivateKey {
                private_key_file, ..
            } => Some(private_key_file),
            _ => None,
        }
    }

    /// Render the view as the JSON object exposed to scripts.
    ///
    /// Fails only if the key file path is not valid UTF-8.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
