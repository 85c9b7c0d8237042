//! アカウント（サインアップ・ログイン）
//!
//! パスワードは Argon2id でハッシュ化して保存します。

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{Database, NewUser, StoreError, UserRecord};

const DUPLICATE_ACCOUNT: &str = "Username or email already exists";

/// パスワードハッシュ器
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, StoreError>;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id（既定パラメータ）
#[derive(Debug, Default, Clone)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, StoreError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| StoreError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        // 壊れたハッシュは不一致扱い
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("stored password hash could not be parsed");
            return false;
        };
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// クライアントに返すプロフィール（パスワードは含めない）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountProfile {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<UserRecord> for AccountProfile {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.user_id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        }
    }
}

/// 簡易的なメールアドレス形式チェック（local@domain.tld）
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn validate_signup(request: &SignupRequest) -> Result<(), StoreError> {
    let required = [
        ("first_name", &request.first_name),
        ("last_name", &request.last_name),
        ("username", &request.username),
        ("password", &request.password),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    if !is_valid_email(&request.email) {
        return Err(StoreError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

/// アカウントサービス
#[derive(Clone)]
pub struct AccountService {
    db: Database,
    hasher: Arc<dyn CredentialHasher>,
}

impl AccountService {
    pub fn new(db: Database) -> Self {
        Self::with_hasher(db, Arc::new(Argon2Hasher))
    }

    pub fn with_hasher(db: Database, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { db, hasher }
    }

    /// サインアップ
    ///
    /// 重複チェックはハッシュ計算より前に行う。
    pub async fn signup(&self, request: SignupRequest) -> Result<AccountProfile, StoreError> {
        validate_signup(&request)?;

        if self.db.username_or_email_taken(&request.username, &request.email).await? {
            return Err(StoreError::Conflict(DUPLICATE_ACCOUNT.to_string()));
        }

        let hasher = Arc::clone(&self.hasher);
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| StoreError::Hash(e.to_string()))??;

        let user = self
            .db
            .insert_user(&NewUser {
                username: request.username,
                first_name: request.first_name,
                last_name: request.last_name,
                email: request.email,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = user.user_id, "account created");
        Ok(user.into())
    }

    /// ログイン（ユーザー不在とパスワード不一致は同じエラー）
    pub async fn login(&self, request: LoginRequest) -> Result<AccountProfile, StoreError> {
        let Some(user) = self.db.find_user_by_username(&request.username).await? else {
            return Err(StoreError::InvalidCredentials);
        };

        let hasher = Arc::clone(&self.hasher);
        let stored = user.password.clone();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&request.password, &stored))
            .await
            .map_err(|e| StoreError::Hash(e.to_string()))?;

        if !verified {
            return Err(StoreError::InvalidCredentials);
        }
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 呼び出し回数を数えるだけの平文ハッシュ器
    #[derive(Default)]
    struct CountingHasher {
        hashes: AtomicUsize,
    }

    impl CredentialHasher for CountingHasher {
        fn hash(&self, password: &str) -> Result<String, StoreError> {
            self.hashes.fetch_add(1, Ordering::SeqCst);
            Ok(format!("plain:{password}"))
        }

        fn verify(&self, password: &str, hash: &str) -> bool {
            hash == format!("plain:{password}")
        }
    }

    fn signup_request(username: &str, email: &str) -> SignupRequest {
        SignupRequest {
            first_name: "Alan".into(),
            last_name: "Turing".into(),
            email: email.into(),
            username: username.into(),
            password: "enigma".into(),
        }
    }

    async fn service() -> (AccountService, Arc<CountingHasher>) {
        let db = Database::in_memory().await.unwrap();
        let hasher = Arc::new(CountingHasher::default());
        (AccountService::with_hasher(db, hasher.clone()), hasher)
    }

    #[test]
    fn test_argon2_hash_and_verify() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("s3cret", &hash));
        assert!(!hasher.verify("wrong", &hash));
        assert!(!hasher.verify("s3cret", "not-a-hash"));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("alan@example.com"));
        assert!(!is_valid_email("alan.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alan@example"));
        assert!(!is_valid_email("alan @example.com"));
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let (accounts, _) = service().await;
        let profile = accounts.signup(signup_request("alan", "alan@example.com")).await.unwrap();
        assert_eq!(profile.username, "alan");
        assert_eq!(profile.email, "alan@example.com");

        let logged_in = accounts
            .login(LoginRequest { username: "alan".into(), password: "enigma".into() })
            .await
            .unwrap();
        assert_eq!(logged_in, profile);
    }

    #[tokio::test]
    async fn test_duplicate_signup_skips_hashing() {
        let (accounts, hasher) = service().await;
        accounts.signup(signup_request("alan", "alan@example.com")).await.unwrap();
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), 1);

        let err = accounts.signup(signup_request("other", "alan@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref m) if m == DUPLICATE_ACCOUNT));
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_failures_share_error() {
        let (accounts, _) = service().await;
        accounts.signup(signup_request("alan", "alan@example.com")).await.unwrap();

        let wrong_password = accounts
            .login(LoginRequest { username: "alan".into(), password: "bombe".into() })
            .await
            .unwrap_err();
        let unknown_user = accounts
            .login(LoginRequest { username: "nobody".into(), password: "enigma".into() })
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), "Invalid credentials");
        assert_eq!(unknown_user.to_string(), wrong_password.to_string());
    }

    #[tokio::test]
    async fn test_signup_rejects_invalid_email() {
        let (accounts, hasher) = service().await;
        let err = accounts.signup(signup_request("alan", "not-an-email")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), 0);
    }
}
