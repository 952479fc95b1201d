//! Session diagnostics that never reveal full tokens.

use std::fmt;

use serde::Serialize;
use sessionward_protocol::Session;
use sessionward_store::StorageKeys;

/// Characters of a token shown in diagnostics.
const PREFIX_LEN: usize = 8;

/// Overall state of the stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Neither storage location holds a record.
    Missing,
    /// A record exists but is not a well-formed session.
    Corrupt,
    /// A well-formed session whose access token has expired.
    Expired,
    /// A well-formed session whose access token is still valid.
    Active,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Corrupt => "corrupt",
            Self::Expired => "expired",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of what storage holds, safe to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub status: SessionStatus,
    /// The canonical key name.
    pub storage_key: String,
    pub canonical_present: bool,
    pub legacy_present: bool,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub access_token_prefix: Option<String>,
    pub refresh_token_prefix: Option<String>,
    /// Unix seconds.
    pub expires_at: Option<i64>,
    /// Negative once expired.
    pub expires_in_secs: Option<i64>,
    pub user_id: Option<String>,
    /// `false` only when both locations hold records that differ.
    pub consistent: bool,
}

impl SessionInfo {
    /// Builds the snapshot from raw storage contents at `now` (Unix seconds).
    ///
    /// The canonical record is described when present, otherwise the legacy
    /// one.
    pub fn inspect(
        keys: &StorageKeys,
        canonical: Option<&str>,
        legacy: Option<&str>,
        now: i64,
    ) -> Self {
        let consistent = match (canonical, legacy) {
            (Some(a), Some(b)) => a.as_bytes() == b.as_bytes(),
            _ => true,
        };

        let mut info = Self {
            status: SessionStatus::Missing,
            storage_key: keys.canonical.clone(),
            canonical_present: canonical.is_some(),
            legacy_present: legacy.is_some(),
            has_access_token: false,
            has_refresh_token: false,
            access_token_prefix: None,
            refresh_token_prefix: None,
            expires_at: None,
            expires_in_secs: None,
            user_id: None,
            consistent,
        };

        let Some(record) = canonical.or(legacy) else {
            return info;
        };

        let session = match Session::from_record(record) {
            Ok(session) => session,
            Err(_) => {
                info.status = SessionStatus::Corrupt;
                return info;
            }
        };

        info.has_access_token = !session.access_token.is_empty();
        info.has_refresh_token = !session.refresh_token.is_empty();
        info.access_token_prefix = token_prefix(&session.access_token);
        info.refresh_token_prefix = token_prefix(&session.refresh_token);
        info.expires_at = session.expiry();
        info.expires_in_secs = info.expires_at.map(|exp| exp - now);
        info.user_id = session.derive_user().map(|u| u.id);

        info.status = if !session.has_tokens() {
            SessionStatus::Corrupt
        } else if info.expires_at.is_some_and(|exp| exp > now) {
            SessionStatus::Active
        } else {
            SessionStatus::Expired
        };
        info
    }
}

/// A truncated, `...`-terminated view of `token`, or `None` when it is
/// empty.
///
/// Shows at most [`PREFIX_LEN`] characters and never more than half the
/// token, so short tokens are not revealed in full.
pub fn token_prefix(token: &str) -> Option<String> {
    if token.is_empty() {
        return None;
    }
    let shown = PREFIX_LEN.min(token.chars().count() / 2);
    let prefix: String = token.chars().take(shown).collect();
    Some(format!("{prefix}..."))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use sessionward_protocol::encode_unsigned;

    const NOW: i64 = 1_700_000_000;

    fn record(exp: i64) -> String {
        let access = encode_unsigned(&json!({ "sub": "user-1", "exp": exp }));
        json!({ "access_token": access, "refresh_token": "refresh-token-value" }).to_string()
    }

    #[test]
    fn test_inspect_empty_storage_is_missing() {
        let info = SessionInfo::inspect(&StorageKeys::default(), None, None, NOW);
        assert_eq!(info.status, SessionStatus::Missing);
        assert!(!info.canonical_present);
        assert!(!info.legacy_present);
        assert!(info.consistent);
        assert_eq!(info.storage_key, StorageKeys::CANONICAL);
    }

    #[test]
    fn test_inspect_active_record_shows_only_prefixes() {
        let text = record(NOW + 60);
        let info = SessionInfo::inspect(&StorageKeys::default(), Some(&text), None, NOW);

        assert_eq!(info.status, SessionStatus::Active);
        assert_eq!(info.refresh_token_prefix.as_deref(), Some("refresh-..."));
        assert_eq!(info.access_token_prefix.as_ref().map(String::len), Some(11));
        assert_eq!(info.expires_in_secs, Some(60));
        assert_eq!(info.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_inspect_expiry_equal_to_now_is_expired() {
        let text = record(NOW);
        let info = SessionInfo::inspect(&StorageKeys::default(), Some(&text), None, NOW);
        assert_eq!(info.status, SessionStatus::Expired);
    }

    #[test]
    fn test_inspect_garbage_is_corrupt() {
        let info = SessionInfo::inspect(&StorageKeys::default(), Some("{oops"), None, NOW);
        assert_eq!(info.status, SessionStatus::Corrupt);
        assert!(info.canonical_present);
    }

    #[test]
    fn test_inspect_differing_copies_are_inconsistent() {
        let a = record(NOW + 60);
        let b = record(NOW + 120);
        let info = SessionInfo::inspect(&StorageKeys::default(), Some(&a), Some(&b), NOW);
        assert!(!info.consistent);
        assert_eq!(info.expires_in_secs, Some(60));
    }

    #[test]
    fn test_token_prefix_handles_short_and_empty_tokens() {
        assert_eq!(token_prefix(""), None);
        assert_eq!(token_prefix("0123456789").as_deref(), Some("01234..."));
        assert_eq!(
            token_prefix("0123456789abcdefghij").as_deref(),
            Some("01234567...")
        );
    }

    #[test]
    fn test_token_prefix_short_token_never_shown_in_full() {
        for token in ["r", "r1", "abc", "a.b.c", "12345678"] {
            let prefix = token_prefix(token).unwrap();
            let shown = prefix.trim_end_matches("...");
            assert!(shown.len() < token.len(), "{token:?} exposed as {prefix:?}");
        }
        assert_eq!(token_prefix("r1").as_deref(), Some("r..."));
    }

    #[test]
    fn test_inspect_short_tokens_are_not_exposed() {
        let text = json!({ "access_token": "a.b.c", "refresh_token": "r1" }).to_string();
        let info = SessionInfo::inspect(&StorageKeys::default(), Some(&text), None, NOW);

        assert_eq!(info.access_token_prefix.as_deref(), Some("a...."));
        assert_eq!(info.refresh_token_prefix.as_deref(), Some("r..."));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let text = serde_json::to_string(&SessionStatus::Missing).unwrap();
        assert_eq!(text, r#""missing""#);
    }
}
