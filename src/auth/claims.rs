use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Access tokens authenticate API calls; refresh tokens only mint new pairs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload of every foodgram token. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    #[serde(rename = "token_use")]
    pub kind: TokenKind,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        kind: TokenKind,
        issued_at: OffsetDateTime,
        ttl: Duration,
        issuer: &str,
        audience: &str,
    ) -> Self {
        let iat = issued_at.unix_timestamp();
        Self {
            sub: user_id,
            iat,
            exp: iat.saturating_add(ttl.as_secs().min(i64::MAX as u64) as i64),
            iss: issuer.to_owned(),
            aud: audience.to_owned(),
            kind,
        }
    }

    /// A refresh token presented as an access token (or the reverse) is refused.
    pub fn expect_kind(self, expected: TokenKind) -> anyhow::Result<Self> {
        if self.kind != expected {
            anyhow::bail!("expected {:?} token, got {:?}", expected, self.kind);
        }
        Ok(self)
    }
}
