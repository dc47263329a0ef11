// Bearer-token cache for the upstream OAuth2 client-credentials flow
use parking_lot::Mutex;
use serde::Deserialize;
use std::time::{Duration, Instant};

// Tokens are treated as expired this long before the server says so
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
// Longer lifetimes from the server are capped to this
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn issued(token: String, expires_in: Duration, issued_at: Instant) -> Self {
        let lifetime = expires_in.min(MAX_TOKEN_LIFETIME);
        Self {
            token,
            // An unrepresentable expiry counts as already expired
            expires_at: issued_at.checked_add(lifetime).unwrap_or(issued_at),
        }
    }

    fn is_usable(&self, now: Instant, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

#[derive(Debug)]
pub struct TokenCache {
    current: Mutex<Option<AccessToken>>,
    margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(TOKEN_EXPIRY_MARGIN)
    }
}

impl TokenCache {
    pub fn new(margin: Duration) -> Self {
        Self {
            current: Mutex::new(None),
            margin,
        }
    }

    // Cached token if it is still valid at `now`
    pub fn get(&self, now: Instant) -> Option<String> {
        self.current
            .lock()
            .as_ref()
            .filter(|token| token.is_usable(now, self.margin))
            .map(|token| token.token.clone())
    }

    pub fn store(&self, response: TokenResponse, issued_at: Instant) -> String {
        let token = AccessToken::issued(
            response.access_token,
            Duration::from_secs(response.expires_in),
            issued_at,
        );
        let value = token.token.clone();
        *self.current.lock() = Some(token);
        value
    }

    pub fn clear(&self) {
        self.current.lock().take();
    }
}
