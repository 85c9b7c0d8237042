//! ユーザー情報テーブル

use chrono::{DateTime, Utc};

use super::{is_unique_violation, Database, StoreError};

/// ユーザー行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// パスワードハッシュ
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新規ユーザー（パスワードはハッシュ済み）
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

impl Database {
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT * FROM user_information WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    pub async fn find_user_by_id(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM user_information WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    /// ユーザー名またはメールアドレスが既に使われているか
    pub async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_information WHERE username = ? OR email = ?",
        )
        .bind(username)
        .bind(email)
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }

    /// ユーザーを作成（一意制約違反は `Conflict`）
    pub async fn insert_user(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO user_information \
             (username, first_name, last_name, email, password, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("Username or email already exists".to_string())
            } else {
                StoreError::Database(e)
            }
        })?;

        let user_id = result.last_insert_rowid();
        self.find_user_by_id(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let db = Database::in_memory().await.unwrap();
        let user = db.insert_user(&new_user("ada", "ada@example.com")).await.unwrap();

        assert!(user.user_id > 0);
        let found = db.find_user_by_username("ada").await.unwrap().unwrap();
        assert_eq!(found.user_id, user.user_id);
        assert_eq!(found.email, "ada@example.com");
        assert!(db.find_user_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_violation_is_conflict() {
        let db = Database::in_memory().await.unwrap();
        db.insert_user(&new_user("ada", "ada@example.com")).await.unwrap();

        let err = db.insert_user(&new_user("ada", "other@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(db.username_or_email_taken("someone", "ada@example.com").await.unwrap());
        assert!(!db.username_or_email_taken("someone", "else@example.com").await.unwrap());
    }
}
