//! # runvault
//!
//! Session-scoped secret registry and content stash for embedded automation
//! scripts.
//!
//! This library provides:
//! - A secret registry (text, SSH private key, user/password) that scripts
//!   reference by id; SSH keys are written to disk only when read
//! - A content stash that captures a file or directory under a fresh handle
//!   and returns the bytes later in the same run
//! - A session that owns the temporary tree and always removes it
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │          scripting host          │
//!        │  (raises host::ScriptError)      │
//!        └────────────────┬─────────────────┘
//!                         │
//!                         ▼
//!                ┌─────────────────┐
//!                │     Session     │  <root>/{stash,secrets}
//!                └───┬─────────┬───┘
//!                    │         │
//!                    ▼         ▼
//!        ┌────────────────┐ ┌──────────────┐
//!        │ SecretRegistry │ │ ContentStash │
//!        └───────┬────────┘ └──────┬───────┘
//!                └──────┬──────────┘
//!                       ▼
//!                    fsutil
//! ```
//!
//! ## Modules
//! - `session`: directory lifecycle and state machine
//! - `secrets`: secret variants and the registry
//! - `stash`: content capture and replay
//! - `host`: error translation for the scripting host

pub mod config;
pub mod error;
pub mod fsutil;
pub mod host;
pub mod secrets;
pub mod session;
pub mod stash;

pub use config::Config;
pub use error::Error;
pub use secrets::{Secret, SecretKind, SecretRegistry, SecretString, SecretView};
pub use session::{Session, SessionState};
pub use stash::{ContentStash, StashHandle, StashRecord};
