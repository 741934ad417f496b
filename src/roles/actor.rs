use sqlx::PgPool;
use uuid::Uuid;

use crate::users::User;

use super::{Permission, Role};

/// The identity a capability check runs against. Anonymous callers satisfy
/// the same contract as authenticated ones and simply hold no permissions, so
/// call sites never branch on "is there a user at all".
#[derive(Debug, Clone)]
pub enum Actor {
    Authenticated { user: User, role: Role },
    Anonymous,
}

impl Actor {
    /// Resolves a session's user id into an actor. A missing user (deleted
    /// account, stale token) degrades to `Anonymous` rather than erroring.
    pub async fn load(db: &PgPool, user_id: Uuid) -> anyhow::Result<Actor> {
        let Some(user) = User::find_by_id(db, user_id).await? else {
            return Ok(Actor::Anonymous);
        };
        let role = Role::find_by_id(db, user.role_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} references missing role {}", user.id, user.role_id))?;
        Ok(Actor::Authenticated { user, role })
    }

    /// True iff the actor's role grants every bit in `permission`.
    /// Pure function of role state; anonymous actors can do nothing.
    pub fn can(&self, permission: i32) -> bool {
        match self {
            Actor::Authenticated { role, .. } => role.grants(permission),
            Actor::Anonymous => false,
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permission::ADMINISTER)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::Authenticated { user, .. } => Some(user),
            Actor::Anonymous => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.user().map(|u| u.confirmed).unwrap_or(false)
    }
}

/// Gate for privileged endpoints: the actor must be a confirmed account whose
/// role grants `permission`.
pub fn authorize(actor: &Actor, permission: i32) -> Result<(), (axum::http::StatusCode, String)> {
    use axum::http::StatusCode;

    if actor.user().is_none() {
        return Err((StatusCode::UNAUTHORIZED, "Authentication required".into()));
    }
    if !actor.is_confirmed() {
        return Err((StatusCode::FORBIDDEN, "Unconfirmed account".into()));
    }
    if !actor.can(permission) {
        return Err((StatusCode::FORBIDDEN, "Insufficient permissions".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn user_with_role(role: &Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            username: "alice".into(),
            password_hash: "x".into(),
            confirmed: true,
            role_id: role.id,
            about_me: None,
            member_since: OffsetDateTime::now_utc(),
            last_seen: OffsetDateTime::now_utc(),
        }
    }

    fn actor(permissions: i32) -> Actor {
        let role = Role {
            id: 1,
            name: "Test".into(),
            permissions,
            is_default: false,
        };
        let user = user_with_role(&role);
        Actor::Authenticated { user, role }
    }

    #[test]
    fn can_mirrors_role_bitmask_for_every_bit() {
        let masks = [
            0,
            Permission::FOLLOW,
            Permission::FOLLOW | Permission::COMMENT | Permission::WRITE_ARTICLES,
            Permission::FULL,
        ];
        let bits = [
            Permission::FOLLOW,
            Permission::COMMENT,
            Permission::WRITE_ARTICLES,
            Permission::MODERATE_COMMENTS,
            Permission::ADMINISTER,
        ];
        for mask in masks {
            let a = actor(mask);
            for bit in bits {
                assert_eq!(a.can(bit), (mask & bit) == bit, "mask {mask:#x} bit {bit:#x}");
            }
        }
    }

    #[test]
    fn anonymous_can_do_nothing() {
        let a = Actor::Anonymous;
        for bit in [
            Permission::FOLLOW,
            Permission::COMMENT,
            Permission::WRITE_ARTICLES,
            Permission::MODERATE_COMMENTS,
            Permission::ADMINISTER,
        ] {
            assert!(!a.can(bit));
        }
        assert!(!a.is_administrator());
        assert!(!a.is_confirmed());
        assert!(a.user().is_none());
    }

    #[test]
    fn default_role_user_is_not_a_moderator() {
        let a = actor(Permission::FOLLOW | Permission::COMMENT | Permission::WRITE_ARTICLES);
        assert!(!a.can(Permission::MODERATE_COMMENTS));
        assert!(!a.is_administrator());
    }

    #[test]
    fn full_mask_is_administrator() {
        let a = actor(Permission::FULL);
        assert!(a.is_administrator());
        assert!(a.can(Permission::MODERATE_COMMENTS));
    }

    #[test]
    fn authorize_gates_on_identity_confirmation_and_permission() {
        use axum::http::StatusCode;

        assert_eq!(
            authorize(&Actor::Anonymous, Permission::COMMENT).unwrap_err().0,
            StatusCode::UNAUTHORIZED
        );

        let mut confirmed = actor(Permission::COMMENT);
        authorize(&confirmed, Permission::COMMENT).expect("confirmed commenter passes");
        assert_eq!(
            authorize(&confirmed, Permission::MODERATE_COMMENTS).unwrap_err().0,
            StatusCode::FORBIDDEN
        );

        if let Actor::Authenticated { user, .. } = &mut confirmed {
            user.confirmed = false;
        }
        assert_eq!(
            authorize(&confirmed, Permission::COMMENT).unwrap_err().0,
            StatusCode::FORBIDDEN
        );
    }
}
