/// Admin user accounts
use crate::{
    config::BootstrapAdmin,
    error::{CmsError, CmsResult},
};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Hash a plaintext password using Argon2id with a random salt
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only for a malformed stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

pub struct AdminUsers {
    db: SqlitePool,
}

impl AdminUsers {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, email: &str, password: &str, name: &str) -> CmsResult<AdminUser> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(CmsError::Validation("A valid email is required".to_string()));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(CmsError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }
        let name = match name.trim() {
            "" => "Admin".to_string(),
            n => n.to_string(),
        };

        let exists = sqlx::query("SELECT 1 FROM admin_users WHERE email = ?1")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?
            .is_some();
        if exists {
            return Err(CmsError::Conflict(format!("Admin {} already exists", email)));
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| CmsError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| CmsError::Internal(format!("Password hashing failed: {}", e)))?;

        let user = AdminUser {
            id: Uuid::new_v4(),
            email,
            name,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO admin_users (id, email, password_hash, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&password_hash)
        .bind(&user.name)
        .bind(user.created_at)
        .execute(&self.db)
        .await?;

        info!("Created admin user {}", user.email);
        Ok(user)
    }

    /// Seed the configured admin when no admin exists yet
    pub async fn bootstrap(&self, admin: &BootstrapAdmin) -> CmsResult<Option<AdminUser>> {
        if self.count().await? > 0 {
            return Ok(None);
        }
        let user = self.create(&admin.email, &admin.password, &admin.name).await?;
        info!("Bootstrapped admin user {}", user.email);
        Ok(Some(user))
    }

    /// Check credentials. Unknown email and wrong password fail the same way.
    pub async fn authenticate(&self, email: &str, password: &str) -> CmsResult<AdminUser> {
        let email = email.trim().to_lowercase();
        let row = sqlx::query("SELECT * FROM admin_users WHERE email = ?1")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            warn!("Login attempt for unknown admin {}", email);
            return Err(invalid_credentials());
        };

        let stored_hash: String = row.try_get("password_hash")?;
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| CmsError::Internal(format!("Password verification task failed: {}", e)))?
            .map_err(|e| CmsError::Internal(format!("Stored password hash is invalid: {}", e)))?;

        if !matches {
            warn!("Failed login for admin {}", email);
            return Err(invalid_credentials());
        }
        row_to_admin(&row)
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<AdminUser> {
        let row = sqlx::query("SELECT * FROM admin_users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::Authentication("Admin account no longer exists".to_string()))?;
        row_to_admin(&row)
    }

    pub async fn count(&self) -> CmsResult<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM admin_users")
            .fetch_one(&self.db)
            .await?
            .try_get("n")?)
    }
}

fn invalid_credentials() -> CmsError {
    CmsError::Authentication("Invalid email or password".to_string())
}

fn row_to_admin(row: &SqliteRow) -> CmsResult<AdminUser> {
    Ok(AdminUser {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_only_when_empty() {
        let users = AdminUsers::new(db::test_pool().await);
        let admin = BootstrapAdmin {
            email: "Owner@Example.com".into(),
            password: "pool-party-2024".into(),
            name: "".into(),
        };

        let created = users.bootstrap(&admin).await.unwrap().unwrap();
        assert_eq!(created.email, "owner@example.com");
        assert_eq!(created.name, "Admin");
        assert!(users.bootstrap(&admin).await.unwrap().is_none());
        assert_eq!(users.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let users = AdminUsers::new(db::test_pool().await);
        let admin = users
            .create("staff@example.com", "pool-party-2024", "Staff")
            .await
            .unwrap();

        let found = users.authenticate(" STAFF@example.com", "pool-party-2024").await.unwrap();
        assert_eq!(found.id, admin.id);

        assert!(matches!(
            users.authenticate("staff@example.com", "nope").await,
            Err(CmsError::Authentication(_))
        ));
        assert!(matches!(
            users.authenticate("ghost@example.com", "pool-party-2024").await,
            Err(CmsError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rules() {
        let users = AdminUsers::new(db::test_pool().await);
        assert!(matches!(
            users.create("staff@example.com", "short", "").await,
            Err(CmsError::Validation(_))
        ));
        users.create("staff@example.com", "long-enough", "").await.unwrap();
        assert!(matches!(
            users.create("Staff@Example.com", "long-enough", "").await,
            Err(CmsError::Conflict(_))
        ));
    }
}
