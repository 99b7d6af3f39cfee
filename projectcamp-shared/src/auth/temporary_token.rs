/// One-time tokens for email verification and password reset
///
/// A temporary token is 20 random bytes, hex-encoded. The unhashed value travels
/// to the user inside an email link; only its SHA-256 digest and an expiry
/// 20 minutes out are stored. Presenting the unhashed value later is checked by
/// hashing it again and looking the digest up together with `expiry > now`.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use projectcamp_shared::auth::temporary_token::{hash_token, TemporaryToken};
///
/// let issued = TemporaryToken::generate(Utc::now());
/// assert_eq!(issued.unhashed.len(), 40);
/// assert_eq!(hash_token(&issued.unhashed), issued.hashed.hash);
/// ```

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of random bytes in a temporary token
const TOKEN_BYTES: usize = 20;

/// Lifetime of a temporary token in minutes
pub const TOKEN_EXPIRY_MINUTES: i64 = 20;

/// Persisted half of a temporary token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedToken {
    /// Hex SHA-256 of the unhashed value
    pub hash: String,

    /// Instant after which the token no longer matches
    pub expires_at: DateTime<Utc>,
}

impl HashedToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Newly issued token: the secret for the user plus what to store
#[derive(Debug, Clone)]
pub struct TemporaryToken {
    /// Value sent to the user; never persisted or logged
    pub unhashed: String,

    pub hashed: HashedToken,
}

impl TemporaryToken {
    /// Generates a token valid for [`TOKEN_EXPIRY_MINUTES`] after `now`
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let unhashed = hex::encode(bytes);

        let hashed = HashedToken {
            hash: hash_token(&unhashed),
            expires_at: now + Duration::minutes(TOKEN_EXPIRY_MINUTES),
        };

        Self { unhashed, hashed }
    }
}

/// Hashes a presented token for lookup
///
/// Pure: no I/O, so the decode step of verify/reset flows can be tested alone.
pub fn hash_token(unhashed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(unhashed.as_bytes());
    format!("{:x}", hasher.finalize())
}
