use crate::domain::model::{Credentials, UserProfile};
use crate::domain::ports::{BookingApi, SessionStore};
use crate::utils::error::{BookingError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SESSION_VERSION_V1: &str = "v1";
const MAX_SEALED_LEN: usize = 16 * 1024;
const MIN_SECRET_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const KEY_CONTEXT: &[u8] = b"appointment-desk/session-key/v1";

/// 登入後的 session：bearer token 加上快取的使用者資料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub profile: UserProfile,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn bearer(&self) -> &str {
        &self.access_token
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// 以 XChaCha20-Poly1305 加密 session，格式為 `v1.<nonce>.<ciphertext>`
///
/// 金鑰由設定的 secret 經 HMAC-SHA256 導出；版本字串作為附加驗證資料。
#[derive(Clone)]
pub struct SessionSealer {
    key: Key,
}

impl SessionSealer {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(BookingError::InvalidConfigValueError {
                field: "session.secret".to_string(),
                value: "<redacted>".to_string(),
                reason: format!("Secret must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).map_err(|e| BookingError::Session {
            message: e.to_string(),
        })?;
        mac.update(KEY_CONTEXT);
        let key = Key::clone_from_slice(&mac.finalize().into_bytes());
        Ok(Self { key })
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(&self.key)
    }

    pub fn seal(&self, session: &Session) -> Result<String> {
        let payload = serde_json::to_vec(session)?;
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()
            .encrypt(
                &nonce,
                Payload {
                    msg: &payload,
                    aad: SESSION_VERSION_V1.as_bytes(),
                },
            )
            .map_err(|_| session_error("session could not be encrypted"))?;

        Ok(format!(
            "{}.{}.{}",
            SESSION_VERSION_V1,
            URL_SAFE_NO_PAD.encode(nonce),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    pub fn open(&self, sealed: &str, now: DateTime<Utc>) -> Result<Session> {
        if sealed.len() > MAX_SEALED_LEN {
            return Err(session_error("sealed session exceeds max length"));
        }

        let mut parts = sealed.trim().split('.');
        let (Some(version), Some(nonce_part), Some(ciphertext_part), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(session_error("sealed session has an invalid format"));
        };

        if version != SESSION_VERSION_V1 {
            return Err(session_error("sealed session version unsupported"));
        }

        let nonce = URL_SAFE_NO_PAD
            .decode(nonce_part)
            .map_err(|e| session_error(&format!("invalid nonce encoding: {}", e)))?;
        if nonce.len() != NONCE_LEN {
            return Err(session_error("sealed session nonce has the wrong length"));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_part)
            .map_err(|e| session_error(&format!("invalid ciphertext encoding: {}", e)))?;

        let payload = self
            .cipher()
            .decrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: SESSION_VERSION_V1.as_bytes(),
                },
            )
            .map_err(|_| session_error("session could not be decrypted"))?;
        let session: Session = serde_json::from_slice(&payload)?;

        if session.is_expired(now) {
            return Err(BookingError::Unauthorized);
        }
        Ok(session)
    }
}

impl std::fmt::Debug for SessionSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSealer").finish_non_exhaustive()
    }
}

fn session_error(message: &str) -> BookingError {
    BookingError::Session {
        message: message.to_string(),
    }
}

/// 管理登入、讀取與登出
pub struct SessionManager<S: SessionStore> {
    store: S,
    sealer: SessionSealer,
    ttl: Option<Duration>,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S, sealer: SessionSealer) -> Self {
        Self {
            store,
            sealer,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// 取得 token、以新 token 讀取使用者資料，再封裝存檔
    pub async fn login<A: BookingApi + ?Sized>(
        &self,
        api: &A,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        tracing::info!("🔑 logging in as {}", credentials.username);
        let token = api.login(credentials).await?;
        let profile = api.current_user(&token.access_token).await?;

        let session = Session {
            access_token: token.access_token,
            token_type: token.token_type,
            profile,
            issued_at: now,
            expires_at: self.ttl.map(|ttl| now + ttl),
        };

        let sealed = self.sealer.seal(&session)?;
        self.store.save(&sealed).await?;
        tracing::info!(
            "✅ session stored for user {} (office {:?})",
            session.profile.user_id,
            session.profile.office_id
        );
        Ok(session)
    }

    /// 目前有效的 session；檔案遭竄改或過期時回傳錯誤
    pub async fn current(&self, now: DateTime<Utc>) -> Result<Option<Session>> {
        match self.store.load().await? {
            Some(sealed) => self.sealer.open(&sealed, now).map(Some),
            None => Ok(None),
        }
    }

    pub async fn require(&self, now: DateTime<Utc>) -> Result<Session> {
        self.current(now).await?.ok_or(BookingError::Unauthorized)
    }

    pub async fn logout(&self) -> Result<()> {
        self.store.clear().await?;
        tracing::info!("👋 session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Role;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn session(expires_at: Option<DateTime<Utc>>) -> Session {
        Session {
            access_token: "token-abc".to_string(),
            token_type: "bearer".to_string(),
            profile: UserProfile {
                user_id: 9,
                email: "desk@example.org".to_string(),
                first_name: Some("Kofi".to_string()),
                last_name: None,
                roles: vec![Role::Receptionist],
                office_id: Some(3),
            },
            issued_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn test_seal_and_open() {
        let sealer = SessionSealer::new(SECRET).unwrap();
        let original = session(None);

        let sealed = sealer.seal(&original).unwrap();
        assert!(sealed.starts_with("v1."));

        // 沒有金鑰時，解開 base64 也看不到 token
        for part in sealed.split('.').skip(1) {
            let raw = URL_SAFE_NO_PAD.decode(part).unwrap();
            assert!(!String::from_utf8_lossy(&raw).contains("token-abc"));
        }

        // 每次封裝使用新的 nonce
        assert_ne!(sealer.seal(&original).unwrap(), sealed);

        let opened = sealer.open(&sealed, Utc::now()).unwrap();
        assert_eq!(opened, original);
    }

    #[test]
    fn test_tampered_or_foreign_sessions_are_rejected() {
        let sealer = SessionSealer::new(SECRET).unwrap();
        let sealed = sealer.seal(&session(None)).unwrap();

        let other = SessionSealer::new("another-secret-another-secret-xx").unwrap();
        assert!(matches!(
            other.open(&sealed, Utc::now()),
            Err(BookingError::Session { .. })
        ));

        let mut parts: Vec<&str> = sealed.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"access_token":"x"}"#);
        parts[2] = &forged;
        assert!(matches!(
            sealer.open(&parts.join("."), Utc::now()),
            Err(BookingError::Session { .. })
        ));

        let mut flipped: Vec<String> = sealed.split('.').map(str::to_string).collect();
        let mut ciphertext = URL_SAFE_NO_PAD.decode(&flipped[2]).unwrap();
        ciphertext[0] ^= 0x01;
        flipped[2] = URL_SAFE_NO_PAD.encode(ciphertext);
        assert!(sealer.open(&flipped.join("."), Utc::now()).is_err());

        assert!(sealer.open("v2.a.b", Utc::now()).is_err());
        assert!(sealer.open("garbage", Utc::now()).is_err());
    }

    #[test]
    fn test_expired_session_is_unauthorized() {
        let sealer = SessionSealer::new(SECRET).unwrap();
        let expired = session(Some(Utc::now() - Duration::minutes(1)));
        let sealed = sealer.seal(&expired).unwrap();

        assert!(matches!(
            sealer.open(&sealed, Utc::now()),
            Err(BookingError::Unauthorized)
        ));
    }

    #[test]
    fn test_short_secret_is_rejected() {
        assert!(SessionSealer::new("short").is_err());
    }
}
