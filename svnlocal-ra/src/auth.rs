//! Credential callbacks
//!
//! Local access has no password exchange: the session only needs to know
//! who is acting, for commit authorship.

use crate::error::{RaError, Result};

/// Supplies the username a session acts as
pub trait AuthProvider: Send + Sync {
    fn username(&self) -> Result<String>;
}

/// Always answers with a fixed username
#[derive(Debug, Clone)]
pub struct StaticAuth {
    username: String,
}

impl StaticAuth {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl AuthProvider for StaticAuth {
    fn username(&self) -> Result<String> {
        if self.username.trim().is_empty() {
            return Err(RaError::AuthFailure("empty username".to_string()));
        }
        Ok(self.username.clone())
    }
}

/// Takes the username from the process environment
#[derive(Debug, Clone, Default)]
pub struct SystemAuth;

impl SystemAuth {
    /// Variables consulted, in order
    pub const VARIABLES: [&'static str; 3] = ["SVNLOCAL_USER", "USER", "LOGNAME"];

    fn lookup(get: impl Fn(&str) -> Option<String>) -> Result<String> {
        Self::VARIABLES
            .iter()
            .filter_map(|name| get(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .ok_or_else(|| {
                RaError::AuthFailure(format!(
                    "unable to determine username (tried {})",
                    Self::VARIABLES.join(", ")
                ))
            })
    }
}

impl AuthProvider for SystemAuth {
    fn username(&self) -> Result<String> {
        Self::lookup(|name| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_static_auth() {
        assert_eq!(StaticAuth::new("alice").username().unwrap(), "alice");
        assert!(matches!(StaticAuth::new(" ").username(), Err(RaError::AuthFailure(_))));
    }

    #[test]
    fn test_system_auth_precedence() {
        let found = SystemAuth::lookup(env(&[("USER", "bob"), ("SVNLOCAL_USER", "carol")])).unwrap();
        assert_eq!(found, "carol");
        let found = SystemAuth::lookup(env(&[("SVNLOCAL_USER", ""), ("LOGNAME", "dave")])).unwrap();
        assert_eq!(found, "dave");
    }

    #[test]
    fn test_system_auth_failure() {
        assert!(matches!(SystemAuth::lookup(env(&[])), Err(RaError::AuthFailure(_))));
    }
}
