//! ユーザー設定テーブル

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{is_unique_violation, Database, StoreError};

const SETTINGS_NOT_FOUND: &str = "User settings not found";
const SETTINGS_EXIST: &str = "Settings already exist for this user";

/// ユーザー設定行
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct UserSettings {
    pub id: String,
    pub user_id: i64,
    pub speech_enabled: bool,
    pub webcam_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_webcam_enabled() -> bool {
    true
}

/// 設定の作成リクエスト
#[derive(Debug, Clone, Deserialize)]
pub struct NewSettings {
    pub user_id: i64,
    #[serde(default)]
    pub speech_enabled: bool,
    #[serde(default = "default_webcam_enabled")]
    pub webcam_enabled: bool,
}

/// 設定の更新リクエスト（省略した項目は変更しない）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub speech_enabled: Option<bool>,
    pub webcam_enabled: Option<bool>,
}

impl Database {
    pub async fn get_settings(&self, user_id: i64) -> Result<Option<UserSettings>, StoreError> {
        let settings =
            sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(settings)
    }

    /// 設定を作成（ユーザーが無ければ `NotFound`、既にあれば `Conflict`）
    pub async fn create_settings(&self, new: &NewSettings) -> Result<UserSettings, StoreError> {
        if self.find_user_by_id(new.user_id).await?.is_none() {
            return Err(StoreError::NotFound("User not found".to_string()));
        }
        if self.get_settings(new.user_id).await?.is_some() {
            return Err(StoreError::Conflict(SETTINGS_EXIST.to_string()));
        }

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO user_settings \
             (id, user_id, speech_enabled, webcam_enabled, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(new.user_id)
        .bind(new.speech_enabled)
        .bind(new.webcam_enabled)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            // 事前チェックをすり抜けた同時作成
            if is_unique_violation(&e) {
                StoreError::Conflict(SETTINGS_EXIST.to_string())
            } else {
                StoreError::Database(e)
            }
        })?;

        self.get_settings(new.user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(SETTINGS_NOT_FOUND.to_string()))
    }

    /// 設定を更新（無ければ `NotFound`）
    pub async fn update_settings(
        &self,
        user_id: i64,
        update: &SettingsUpdate,
    ) -> Result<UserSettings, StoreError> {
        let current = self
            .get_settings(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(SETTINGS_NOT_FOUND.to_string()))?;

        sqlx::query(
            "UPDATE user_settings SET speech_enabled = ?, webcam_enabled = ?, updated_at = ? \
             WHERE user_id = ?",
        )
        .bind(update.speech_enabled.unwrap_or(current.speech_enabled))
        .bind(update.webcam_enabled.unwrap_or(current.webcam_enabled))
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool())
        .await?;

        self.get_settings(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(SETTINGS_NOT_FOUND.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;

    async fn db_with_user() -> (Database, i64) {
        let db = Database::in_memory().await.unwrap();
        let user = db
            .insert_user(&NewUser {
                username: "grace".into(),
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email: "grace@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        (db, user.user_id)
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips_flags() {
        let (db, user_id) = db_with_user().await;

        let created = db
            .create_settings(&NewSettings { user_id, speech_enabled: true, webcam_enabled: false })
            .await
            .unwrap();
        let fetched = db.get_settings(user_id).await.unwrap().unwrap();

        assert_eq!(created, fetched);
        assert!(fetched.speech_enabled);
        assert!(!fetched.webcam_enabled);
        assert!(Uuid::parse_str(&fetched.id).is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_user() {
        let (db, user_id) = db_with_user().await;
        let new = NewSettings { user_id, speech_enabled: false, webcam_enabled: true };
        db.create_settings(&new).await.unwrap();

        let err = db.create_settings(&new).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref m) if m == SETTINGS_EXIST));

        let err = db
            .create_settings(&NewSettings { user_id: user_id + 100, ..new })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_flag() {
        let (db, user_id) = db_with_user().await;
        db.create_settings(&NewSettings { user_id, speech_enabled: false, webcam_enabled: true })
            .await
            .unwrap();

        let updated = db
            .update_settings(user_id, &SettingsUpdate { speech_enabled: Some(true), webcam_enabled: None })
            .await
            .unwrap();
        assert!(updated.speech_enabled);
        assert!(updated.webcam_enabled);
        assert!(updated.updated_at >= updated.created_at);

        let err = db.update_settings(user_id + 1, &SettingsUpdate::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref m) if m == SETTINGS_NOT_FOUND));
    }

    #[test]
    fn test_new_settings_defaults() {
        let new: NewSettings = serde_json::from_str(r#"{"user_id": 7}"#).unwrap();
        assert_eq!(new.user_id, 7);
        assert!(!new.speech_enabled);
        assert!(new.webcam_enabled);
    }
}
