//! Boundary with the scripting host.
//!
//! The host calls into the session and turns any failure into something it
//! can throw into the script. This module builds that value; throwing it is
//! the host's job.

use serde::Serialize;
use tracing::error;

use crate::error::Error;
use crate::secrets::SecretView;
use crate::session::Session;

/// Error payload raised into the script environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Log `err` and build the script-visible error.
///
/// With a context the message reads `"<context> <error>"`.
pub fn raise(err: impl Into<Error>, context: Option<&str>) -> ScriptError {
    let err = err.into();
    let message = match context {
        Some(context) => format!("{} {}", context, err),
        None => err.to_string(),
    };
    error!(code = err.code(), "{}", message);
    ScriptError {
        code: err.code().to_string(),
        message,
    }
}

/// Script-facing secret lookup: the view as a JSON object.
pub async fn secret_json(session: &Session, id: &str) -> Result<serde_json::Value, ScriptError> {
    let view: SecretView = session
        .get_secret(id)
        .await
        .map_err(|e| raise(e, Some("getSecret")))?;
    view.to_json().map_err(|e| raise(e, Some("getSecret")))
}

/// Script-facing stash save: the handle as a string.
pub async fn stash_save(session: &Session, path: &str) -> Result<String, ScriptError> {
    session
        .save(path)
        .await
        .map(|handle| handle.to_string())
        .map_err(|e| raise(e, Some("save")))
}

/// Script-facing stash load.
pub async fn stash_load(session: &Session, handle: &str) -> Result<Vec<u8>, ScriptError> {
    session
        .load(handle)
        .await
        .map_err(|e| raise(e, Some("load")))
}
