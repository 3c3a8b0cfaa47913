//! Where authentication secrets come from.
//!
//! The session never talks to a terminal itself; it asks a
//! [`CredentialSource`], which may be interactive, pre-supplied or absent.

use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

pub type Secret = Zeroizing<String>;

#[derive(Clone)]
pub enum Credential {
    /// Try the `none` method, which succeeds only on open servers.
    None,
    Password(Secret),
    IdentityFile(PathBuf),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::None => f.write_str("None"),
            Credential::Password(_) => f.write_str("Password(***)"),
            Credential::IdentityFile(p) => f.debug_tuple("IdentityFile").field(p).finish(),
        }
    }
}

pub trait CredentialSource: Send {
    /// Secret known before the first attempt.
    fn preset(&self) -> Option<Secret> {
        None
    }

    /// Asks for a replacement after `user@host` rejected the last credential.
    /// `None` means there is nobody to ask.
    fn prompt(&mut self, user: &str, host: &str) -> Option<Secret>;
}

/// Headless mode without any secret.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialSource for NoCredentials {
    fn prompt(&mut self, _user: &str, _host: &str) -> Option<Secret> {
        None
    }
}

/// A password handed over by configuration; never re-prompts.
pub struct StaticPassword(Secret);

impl StaticPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }
}

impl CredentialSource for StaticPassword {
    fn preset(&self) -> Option<Secret> {
        Some(self.0.clone())
    }

    fn prompt(&mut self, _user: &str, _host: &str) -> Option<Secret> {
        None
    }
}
