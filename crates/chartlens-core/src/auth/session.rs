use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{AccountGrant, TokenGrant, User};
use crate::storage::{KeyValueStore, StorageError};

/// Storage key for the bearer id token
pub const ID_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the JSON user snapshot
pub const USER_DATA_KEY: &str = "user_data";
/// Storage key for the expiry instant (epoch milliseconds)
pub const TOKEN_EXPIRY_KEY: &str = "token_expiry";

/// Every key the session owns. All four present means signed in.
pub const SESSION_KEYS: [&str; 4] = [ID_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_DATA_KEY, TOKEN_EXPIRY_KEY];

/// Buffer before expiry where the token is considered due for refresh (5 minutes)
pub const REFRESH_BUFFER_SECS: i64 = 5 * 60;

/// The persisted session: tokens, their expiry and who they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionTokenSet {
    pub id_token: String,
    pub refresh_token: String,
    /// Absolute expiry of `id_token` in epoch milliseconds
    pub expiry_timestamp: i64,
    pub user: User,
}

impl SessionTokenSet {
    /// Build the token set for a grant issued at `now_ms`.
    pub fn issue(grant: AccountGrant, now_ms: i64) -> Self {
        Self {
            expiry_timestamp: expiry_timestamp(now_ms, grant.tokens.expires_in_secs),
            id_token: grant.tokens.id_token,
            refresh_token: grant.tokens.refresh_token,
            user: grant.user,
        }
    }

    /// True once the token is inside the refresh buffer (or past expiry).
    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        now_ms >= self.expiry_timestamp - REFRESH_BUFFER_SECS * 1000
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expiry_timestamp
    }

    /// Whole seconds of life left, never negative
    pub fn seconds_until_expiry(&self, now_ms: i64) -> i64 {
        ((self.expiry_timestamp - now_ms) / 1000).max(0)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now_ms: i64) -> i64 {
        self.seconds_until_expiry(now_ms) / 60
    }

    /// Read the token set. Any missing key means there is no session.
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>, StorageError> {
        let Some(id_token) = store.get(ID_TOKEN_KEY)? else {
            return Ok(None);
        };
        let Some(refresh_token) = store.get(REFRESH_TOKEN_KEY)? else {
            return Ok(None);
        };
        let Some(user_data) = store.get(USER_DATA_KEY)? else {
            return Ok(None);
        };
        let Some(expiry) = store.get(TOKEN_EXPIRY_KEY)? else {
            return Ok(None);
        };

        let expiry_timestamp = expiry.trim().parse::<i64>().map_err(|e| StorageError::Corrupt {
            key: TOKEN_EXPIRY_KEY.to_string(),
            reason: e.to_string(),
        })?;
        let user = serde_json::from_str::<User>(&user_data).map_err(|e| StorageError::Corrupt {
            key: USER_DATA_KEY.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(Self {
            id_token,
            refresh_token,
            expiry_timestamp,
            user,
        }))
    }

    /// Write all four keys in one `multi_set`.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        let user_data = serde_json::to_string(&self.user)?;
        store.multi_set(&[
            (ID_TOKEN_KEY, self.id_token.clone()),
            (REFRESH_TOKEN_KEY, self.refresh_token.clone()),
            (USER_DATA_KEY, user_data),
            (TOKEN_EXPIRY_KEY, self.expiry_timestamp.to_string()),
        ])
    }

    /// Overwrite the token fields after a refresh, keeping the user snapshot.
    /// Returns the new expiry timestamp.
    pub fn save_refreshed(
        grant: &TokenGrant,
        now_ms: i64,
        store: &dyn KeyValueStore,
    ) -> Result<i64, StorageError> {
        let expiry = expiry_timestamp(now_ms, grant.expires_in_secs);
        store.multi_set(&[
            (ID_TOKEN_KEY, grant.id_token.clone()),
            (REFRESH_TOKEN_KEY, grant.refresh_token.clone()),
            (TOKEN_EXPIRY_KEY, expiry.to_string()),
        ])?;
        Ok(expiry)
    }

    /// Remove every session key. Removing absent keys is not an error.
    pub fn clear(store: &dyn KeyValueStore) -> Result<(), StorageError> {
        store.multi_remove(&SESSION_KEYS)
    }
}

fn expiry_timestamp(now_ms: i64, expires_in_secs: i64) -> i64 {
    now_ms.saturating_add(expires_in_secs.saturating_mul(1000))
}

/// Delay before the refresh timer fires for a token living `expires_in_secs`.
///
/// The timer fires `REFRESH_BUFFER_SECS` before expiry; lifetimes at or under
/// the buffer fire immediately.
pub fn refresh_delay(expires_in_secs: i64) -> Duration {
    let secs = expires_in_secs.saturating_sub(REFRESH_BUFFER_SECS).max(0);
    Duration::from_secs(secs as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const NOW: i64 = 1_700_000_000_000;

    fn grant(expires_in_secs: i64) -> AccountGrant {
        AccountGrant {
            tokens: TokenGrant {
                id_token: "id-1".to_string(),
                refresh_token: "refresh-1".to_string(),
                expires_in_secs,
            },
            user: User {
                local_id: "uid-1".to_string(),
                email: "ada@example.com".to_string(),
                display_name: Some("Ada".to_string()),
                email_verified: true,
            },
        }
    }

    #[test]
    fn test_issue_computes_expiry() {
        let set = SessionTokenSet::issue(grant(3600), NOW);
        assert_eq!(set.expiry_timestamp, NOW + 3_600_000);
        assert_eq!(set.seconds_until_expiry(NOW), 3600);
        assert_eq!(set.minutes_until_expiry(NOW), 60);
    }

    #[test]
    fn test_needs_refresh_at_buffer_boundary() {
        let set = SessionTokenSet::issue(grant(3600), NOW);
        let boundary = set.expiry_timestamp - REFRESH_BUFFER_SECS * 1000;
        assert!(!set.needs_refresh(boundary - 1));
        assert!(set.needs_refresh(boundary));
        assert!(!set.is_expired(boundary));
        assert!(set.is_expired(set.expiry_timestamp));
        assert_eq!(set.seconds_until_expiry(set.expiry_timestamp + 5000), 0);
    }

    #[test]
    fn test_refresh_delay() {
        assert_eq!(refresh_delay(3600), Duration::from_millis(3_300_000));
        assert_eq!(refresh_delay(301), Duration::from_millis(1000));
        assert_eq!(refresh_delay(300), Duration::ZERO);
        assert_eq!(refresh_delay(200), Duration::ZERO);
        assert_eq!(refresh_delay(-10), Duration::ZERO);
        assert_eq!(refresh_delay(i64::MIN), Duration::ZERO);
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        assert_eq!(
            refresh_delay(i64::MAX),
            Duration::from_secs((i64::MAX - REFRESH_BUFFER_SECS) as u64)
        );

        let set = SessionTokenSet::issue(grant(i64::MAX), NOW);
        assert_eq!(set.expiry_timestamp, i64::MAX);
        assert!(!set.needs_refresh(NOW));
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::new();
        let set = SessionTokenSet::issue(grant(3600), NOW);
        set.save(&store).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(SessionTokenSet::load(&store).unwrap(), Some(set));
    }

    #[test]
    fn test_missing_key_means_no_session() {
        let store = MemoryStore::new();
        SessionTokenSet::issue(grant(3600), NOW).save(&store).unwrap();

        for key in SESSION_KEYS {
            let partial = MemoryStore::new();
            for other in SESSION_KEYS.iter().filter(|k| **k != key) {
                let value = store.get(other).unwrap().unwrap();
                partial.set(other, &value).unwrap();
            }
            assert_eq!(SessionTokenSet::load(&partial).unwrap(), None, "missing {key}");
        }
    }

    #[test]
    fn test_save_refreshed_keeps_user() {
        let store = MemoryStore::new();
        let set = SessionTokenSet::issue(grant(3600), NOW);
        set.save(&store).unwrap();

        let refreshed = TokenGrant {
            id_token: "id-2".to_string(),
            refresh_token: "refresh-2".to_string(),
            expires_in_secs: 1800,
        };
        let expiry = SessionTokenSet::save_refreshed(&refreshed, NOW + 10_000, &store).unwrap();
        assert_eq!(expiry, NOW + 10_000 + 1_800_000);

        let loaded = SessionTokenSet::load(&store).unwrap().unwrap();
        assert_eq!(loaded.id_token, "id-2");
        assert_eq!(loaded.refresh_token, "refresh-2");
        assert_eq!(loaded.expiry_timestamp, expiry);
        assert_eq!(loaded.user, set.user);
    }

    #[test]
    fn test_corrupt_expiry_is_reported() {
        let store = MemoryStore::new();
        SessionTokenSet::issue(grant(3600), NOW).save(&store).unwrap();
        store.set(TOKEN_EXPIRY_KEY, "tomorrow").unwrap();

        match SessionTokenSet::load(&store) {
            Err(StorageError::Corrupt { key, .. }) => assert_eq!(key, TOKEN_EXPIRY_KEY),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = MemoryStore::new();
        SessionTokenSet::issue(grant(3600), NOW).save(&store).unwrap();
        SessionTokenSet::clear(&store).unwrap();
        SessionTokenSet::clear(&store).unwrap();
        assert!(store.is_empty());
    }
}
