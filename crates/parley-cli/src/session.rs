//! Local session store.
//!
//! The web login flow leaves a small JSON document behind:
//!
//! ```json
//! { "userId": 7, "username": "sam" }
//! ```
//!
//! The terminal client reads it to learn who is signed in. Command-line
//! flags override the file.

use std::{fs, io, path::Path};

use parley_client::Identity;
use parley_proto::UserId;
use serde::Deserialize;
use thiserror::Error;

/// Session loading errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// File could not be read.
    #[error("cannot read session file: {0}")]
    Io(#[from] io::Error),

    /// File is not a session document.
    #[error("invalid session file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Neither the file nor the flags name a user.
    #[error("no signed-in user, pass --session or --user-id and --username")]
    Missing,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    #[serde(alias = "id")]
    user_id: UserId,
    username: String,
}

/// Parse a session document.
///
/// # Errors
///
/// - `SessionError::Parse` if `text` is not a session document
pub fn parse(text: &str) -> Result<Identity, SessionError> {
    let file: SessionFile = serde_json::from_str(text)?;
    Ok(Identity::new(file.user_id, file.username))
}

/// Read the session document at `path`.
///
/// # Errors
///
/// - `SessionError::Io` if the file cannot be read
/// - `SessionError::Parse` if it is not a session document
pub fn load(path: &Path) -> Result<Identity, SessionError> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}

/// Combine the session file with command-line overrides.
///
/// # Errors
///
/// - `SessionError::Missing` if no user id or name is known
/// - Any error from [`load`]
pub fn resolve(
    path: Option<&Path>,
    user_id: Option<UserId>,
    username: Option<String>,
) -> Result<Identity, SessionError> {
    let stored = path.map(load).transpose()?;

    let user_id = user_id.or(stored.as_ref().map(|s| s.user_id));
    let username = username.or(stored.map(|s| s.username));
    match (user_id, username) {
        (Some(id), Some(name)) => Ok(Identity::new(id, name)),
        _ => Err(SessionError::Missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_document() {
        let identity = parse(r#"{"userId": 7, "username": "sam", "token": "ignored"}"#).unwrap();
        assert_eq!(identity, Identity::new(7, "sam"));
    }

    #[test]
    fn accepts_id_alias() {
        let identity = parse(r#"{"id": 3, "username": "kim"}"#).unwrap();
        assert_eq!(identity.user_id, 3);
    }

    #[test]
    fn rejects_missing_username() {
        assert!(matches!(parse(r#"{"userId": 7}"#), Err(SessionError::Parse(_))));
    }

    #[test]
    fn flags_alone_are_enough() {
        let identity = resolve(None, Some(1), Some("alice".into())).unwrap();
        assert_eq!(identity, Identity::new(1, "alice"));
    }

    #[test]
    fn partial_flags_without_file_fail() {
        assert!(matches!(resolve(None, Some(1), None), Err(SessionError::Missing)));
    }

    #[test]
    fn unreadable_file_is_reported() {
        let result = resolve(Some(Path::new("/nonexistent/parley-session.json")), None, None);
        assert!(matches!(result, Err(SessionError::Io(_))));
    }
}
