mod actor;
mod repo;

pub use actor::{authorize, Actor};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ConfigError;

/// Grantable capabilities, one bit each. A role's permission set is the
/// bitwise OR of the capabilities it grants.
pub struct Permission;

impl Permission {
    pub const FOLLOW: i32 = 0x01;
    pub const COMMENT: i32 = 0x02;
    pub const WRITE_ARTICLES: i32 = 0x04;
    pub const MODERATE_COMMENTS: i32 = 0x08;
    pub const ADMINISTER: i32 = 0x80;

    /// Every bit set; the administrator mask.
    pub const FULL: i32 = 0xff;
}

/// Named bundle of permission bits. Exactly one role is flagged `is_default`
/// at any time; it is the one assigned to new users absent other rules.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub permissions: i32,
    pub is_default: bool,
}

impl Role {
    pub fn grants(&self, permission: i32) -> bool {
        (self.permissions & permission) == permission
    }
}

/// Fixed role catalogue applied at startup: name, permission mask, default.
const ROLE_SEED: [(&str, i32, bool); 3] = [
    (
        "User",
        Permission::FOLLOW | Permission::COMMENT | Permission::WRITE_ARTICLES,
        true,
    ),
    (
        "Moderator",
        Permission::FOLLOW
            | Permission::COMMENT
            | Permission::WRITE_ARTICLES
            | Permission::MODERATE_COMMENTS,
        false,
    ),
    ("Administrator", Permission::FULL, false),
];

fn validate_seed(seed: &[(&str, i32, bool)]) -> Result<(), ConfigError> {
    let defaults = seed.iter().filter(|(_, _, is_default)| *is_default).count();
    if defaults != 1 {
        return Err(ConfigError::SeedDefaultRoles(defaults));
    }
    Ok(())
}

/// Upserts the fixed role catalogue by name. Idempotent and safe to re-run on
/// every startup; roles added outside the catalogue are left untouched.
/// Concurrent invocations are last-writer-wins over constant values.
pub async fn seed_roles(db: &sqlx::PgPool) -> anyhow::Result<()> {
    validate_seed(&ROLE_SEED)?;
    for (name, permissions, is_default) in ROLE_SEED {
        let existed = Role::find_by_name(db, name).await?.is_some();
        let role = Role::upsert(db, name, permissions, is_default).await?;
        tracing::debug!(role = %role.name, existed, permissions = role.permissions, "role seeded");
    }
    tracing::info!(roles = ROLE_SEED.len(), "role catalogue seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_bits_are_distinct_powers_of_two() {
        let bits = [
            Permission::FOLLOW,
            Permission::COMMENT,
            Permission::WRITE_ARTICLES,
            Permission::MODERATE_COMMENTS,
            Permission::ADMINISTER,
        ];
        for (i, a) in bits.iter().enumerate() {
            assert_eq!(a.count_ones(), 1, "bit {a:#x} is not a single flag");
            for b in &bits[i + 1..] {
                assert_eq!(a & b, 0, "bits {a:#x} and {b:#x} overlap");
            }
        }
    }

    #[test]
    fn grants_is_bitmask_containment() {
        let role = Role {
            id: 1,
            name: "User".into(),
            permissions: Permission::FOLLOW | Permission::COMMENT | Permission::WRITE_ARTICLES,
            is_default: true,
        };
        for bit in [
            Permission::FOLLOW,
            Permission::COMMENT,
            Permission::WRITE_ARTICLES,
            Permission::MODERATE_COMMENTS,
            Permission::ADMINISTER,
        ] {
            assert_eq!(role.grants(bit), (role.permissions & bit) == bit);
        }
        // A compound mask requires every bit in it.
        assert!(role.grants(Permission::FOLLOW | Permission::COMMENT));
        assert!(!role.grants(Permission::FOLLOW | Permission::ADMINISTER));
    }

    #[test]
    fn administrator_mask_grants_everything() {
        let admin = Role {
            id: 3,
            name: "Administrator".into(),
            permissions: Permission::FULL,
            is_default: false,
        };
        for bit in [
            Permission::FOLLOW,
            Permission::COMMENT,
            Permission::WRITE_ARTICLES,
            Permission::MODERATE_COMMENTS,
            Permission::ADMINISTER,
        ] {
            assert!(admin.grants(bit));
        }
    }

    #[test]
    fn seed_catalogue_has_exactly_one_default() {
        validate_seed(&ROLE_SEED).expect("catalogue is valid");
    }

    #[test]
    fn repeated_seeding_is_idempotent_and_keeps_one_default() {
        use std::collections::BTreeMap;

        // Upsert-by-name semantics: permissions and the default flag are
        // always overwritten with the catalogue values.
        fn apply(catalogue: &mut BTreeMap<&str, (i32, bool)>) {
            for (name, permissions, is_default) in ROLE_SEED {
                catalogue.insert(name, (permissions, is_default));
            }
        }

        // A pre-existing role outside the catalogue survives untouched.
        let mut roles: BTreeMap<&str, (i32, bool)> = BTreeMap::new();
        roles.insert("Legacy", (Permission::FOLLOW, false));

        apply(&mut roles);
        let after_first = roles.clone();
        apply(&mut roles);
        assert_eq!(roles, after_first);

        let defaults = roles.values().filter(|(_, is_default)| *is_default).count();
        assert_eq!(defaults, 1);
        assert_eq!(roles["Administrator"], (Permission::FULL, false));
        assert_eq!(roles["Legacy"], (Permission::FOLLOW, false));
    }

    #[test]
    fn validate_seed_rejects_zero_or_multiple_defaults() {
        let none = [("A", 0x01, false), ("B", 0x02, false)];
        assert!(matches!(
            validate_seed(&none),
            Err(ConfigError::SeedDefaultRoles(0))
        ));

        let two = [("A", 0x01, true), ("B", 0x02, true)];
        assert!(matches!(
            validate_seed(&two),
            Err(ConfigError::SeedDefaultRoles(2))
        ));
    }
}
