//! Identity types shared by the provider client and the session manager.
//!
//! The provider speaks two field conventions (camelCase for sign-in and
//! sign-up, snake_case for refresh); both are normalized into these types
//! before they reach the session manager.

use serde::{Deserialize, Serialize};

/// Denormalized identity snapshot stored alongside the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub local_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

impl User {
    /// Name to greet the user with: display name when set, email otherwise.
    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// A freshly minted token pair and its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in_secs: i64,
}

/// Result of a password sign-in or account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountGrant {
    pub tokens: TokenGrant,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_json_uses_camel_case() {
        let user = User {
            local_id: "uid-1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: None,
            email_verified: false,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, r#"{"localId":"uid-1","email":"ada@example.com","emailVerified":false}"#);

        let parsed: User = serde_json::from_str(r#"{"localId":"uid-1","email":"ada@example.com"}"#).unwrap();
        assert_eq!(parsed, user);
    }

    #[test]
    fn test_display_label() {
        let mut user = User {
            local_id: "uid-1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: Some("Ada".to_string()),
            email_verified: true,
        };
        assert_eq!(user.display_label(), "Ada");
        user.display_name = Some("  ".to_string());
        assert_eq!(user.display_label(), "ada@example.com");
    }
}
