mod repo;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record. The password hash is write-only: it never serializes into a
/// response body.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub confirmed: bool,
    pub role_id: i32,
    pub about_me: Option<String>,
    pub member_since: OffsetDateTime,
    pub last_seen: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_never_serializes() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            username: "a".into(),
            password_hash: "$argon2id$secret".into(),
            confirmed: false,
            role_id: 1,
            about_me: None,
            member_since: OffsetDateTime::now_utc(),
            last_seen: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("a@example.com"));
    }
}
