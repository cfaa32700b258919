//! Write credential and session scope.
//!
//! A `Session` holds at most one credential for its lifetime. It starts
//! anonymous or authenticated, may be authenticated once, and is never
//! de-authenticated; dropping the session is the only way to discard the
//! token. Nothing here touches durable storage.

use thiserror::Error;

/// Opaque bearer token attached to write and delete requests
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for an empty or whitespace-only token
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Credential(trimmed.to_string()))
        }
    }

    /// Raw token, for building the backend's authorization header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session already holds a credential")]
    AlreadyAuthenticated,
    #[error("credential is empty")]
    EmptyCredential,
}

/// Session-scoped credential holder
#[derive(Debug, Clone, Default)]
pub struct Session {
    credential: Option<Credential>,
}

impl Session {
    /// Read-only session
    pub fn anonymous() -> Self {
        Session { credential: None }
    }

    pub fn authenticated(credential: Credential) -> Self {
        Session {
            credential: Some(credential),
        }
    }

    /// Move from anonymous to authenticated. Only allowed once.
    pub fn authenticate(&mut self, token: impl Into<String>) -> Result<(), SessionError> {
        if self.credential.is_some() {
            return Err(SessionError::AlreadyAuthenticated);
        }
        let credential = Credential::new(token).ok_or(SessionError::EmptyCredential)?;
        self.credential = Some(credential);
        Ok(())
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejects_blank() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new(" tok ").unwrap().expose(), "tok");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("ghp_secret").unwrap();
        let shown = format!("{:?}", cred);
        assert!(!shown.contains("ghp_secret"));
        let session = Session::authenticated(cred);
        assert!(!format!("{:?}", session).contains("ghp_secret"));
    }

    #[test]
    fn test_session_authenticates_once() {
        let mut session = Session::anonymous();
        assert!(!session.is_authenticated());

        session.authenticate("first").unwrap();
        assert!(session.is_authenticated());

        assert_eq!(
            session.authenticate("second"),
            Err(SessionError::AlreadyAuthenticated)
        );
        assert_eq!(session.credential().unwrap().expose(), "first");
    }

    #[test]
    fn test_session_rejects_empty_token() {
        let mut session = Session::anonymous();
        assert_eq!(session.authenticate(""), Err(SessionError::EmptyCredential));
        assert!(!session.is_authenticated());
    }
}
