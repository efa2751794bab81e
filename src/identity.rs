//! Identity collaborator.
//!
//! Sign-in, sign-up, and session management belong to an external
//! identity provider. The checker only needs to turn a bearer token
//! into a [`Principal`], which [`IdentityProvider::resolve`] does.
//! [`ConfiguredIdentities`] is the static, config-backed implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use dapa_checker_core::models::Identity;

use crate::config::AuthConfig;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub identity: Identity,
    pub email: String,
    pub is_admin: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when the token is not recognized.
    async fn resolve(&self, token: &str) -> Option<Principal>;
}

/// Tokens listed under `[[auth.users]]`.
#[derive(Debug, Default)]
pub struct ConfiguredIdentities {
    by_token: HashMap<String, Principal>,
}

impl ConfiguredIdentities {
    pub fn from_config(auth: &AuthConfig) -> Self {
        let by_token = auth
            .users
            .iter()
            .map(|u| {
                (
                    u.token.clone(),
                    Principal {
                        identity: Identity::new(u.identity.clone()),
                        email: u.email.clone(),
                        is_admin: u.admin,
                    },
                )
            })
            .collect();
        Self { by_token }
    }
}

#[async_trait]
impl IdentityProvider for ConfiguredIdentities {
    async fn resolve(&self, token: &str) -> Option<Principal> {
        self.by_token.get(token).cloned()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
