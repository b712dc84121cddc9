//! Admin credentials check and in-memory bearer sessions.

use crate::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
}

/// Issued admin tokens. Process-wide; cleared on restart.
#[derive(Debug, Default)]
pub struct SessionStore {
    tokens: RwLock<HashSet<String>>,
}

impl SessionStore {
    pub fn issue(&self) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.insert(token.clone());
        token
    }

    pub fn is_valid(&self, token: &str) -> bool {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        tokens.contains(token)
    }

    /// Returns whether the token was live.
    pub fn revoke(&self, token: &str) -> bool {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.remove(token)
    }
}

/// False when no admin password is configured.
pub fn verify_credentials(config: &AppConfig, username: &str, password: &str) -> bool {
    let Some(expected) = config.admin_password.as_deref() else {
        tracing::warn!("admin login attempted but ADMIN_PASSWORD is not set");
        return false;
    };
    // Both comparisons always run.
    let user_ok = constant_time_eq(username.as_bytes(), config.admin_username.as_bytes());
    let pass_ok = constant_time_eq(password.as_bytes(), expected.as_bytes());
    user_ok & pass_ok
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
