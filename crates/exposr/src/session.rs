use tracing::info;

use crate::error::SessionError;

pub const DEMO_EMAIL: &str = "demo@exposr.com";
pub const DEMO_PASSWORD: &str = "demo123";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub email: String,
}

/// Authenticated identity for the lifetime of the process.
///
/// Mutated only by [`Session::login`] and [`Session::logout`]; the flag and the
/// user are always set and cleared together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    is_authenticated: bool,
    user: Option<User>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Name shown in the greeting; "User" when nobody is signed in.
    pub fn display_name(&self) -> &str {
        self.user.as_ref().map_or("User", |u| u.name.as_str())
    }

    /// Demo-mode login: any non-blank email/password pair is accepted.
    pub fn login(&mut self, email: &str, password: &str) -> Result<&User, SessionError> {
        let email = email.trim();
        if email.is_empty() || password.trim().is_empty() {
            return Err(SessionError::EmptyCredential);
        }

        let name = email.split('@').next().unwrap_or(email).to_string();
        info!("Signed in as {name}");
        self.is_authenticated = true;
        Ok(&*self.user.insert(User {
            name,
            email: email.to_string(),
        }))
    }

    pub fn demo_login(&mut self) -> Result<&User, SessionError> {
        self.login(DEMO_EMAIL, DEMO_PASSWORD)
    }

    pub fn logout(&mut self) {
        if self.is_authenticated {
            info!("Signed out");
        }
        self.is_authenticated = false;
        self.user = None;
    }
}
