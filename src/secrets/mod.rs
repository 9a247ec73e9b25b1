//! Secrets management module.
//!
//! Holds credentials for the lifetime of one session so scripts can refer to
//! them by id instead of embedding them in source.
//!
//! ## Variants
//!
//! | kind       | stored                           | returned by `get`                 |
//! |------------|----------------------------------|-----------------------------------|
//! | `text`     | text                             | text                              |
//! | `ssh`      | user, private key, passphrase    | user, key **file path**, passphrase |
//! | `userpass` | user, password                   | user, password                    |
//!
//! SSH keys are only written to disk when read:
//!
//! ```text
//! <session-root>/secrets/
//! └── <id>        # private key, mode 0600, rewritten on every get
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let secrets = session.secrets();
//! secrets.add_ssh_private_key("deploy", "git", key_pem, "").await?;
//!
//! let view = secrets.get("deploy").await?;
//! let key_file = view.private_key_file().unwrap();
//! ```

mod registry;
pub mod types;

use thiserror::Error;

pub use registry::{material_file_name, SecretRegistry};
pub use types::*;

#[derive(Debug, Error)]
pub enum SecretError {
    /// Also returned when an SSH key could not be written, so callers never
    /// see details about where secret material lives.
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Session is closed")]
    SessionClosed,
}
