//! Capability flags carried by every account.
//!
//! A [`Permissions`] value is a fixed-width bitmask. Bit 0 is the `NONE`
//! sentinel: a set with no capability always holds exactly that bit, so an
//! empty set compares equal no matter how it became empty.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use campusid_core::DomainError;

/// A single named capability.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Student,
    Moderator,
    Developer,
    Maintainer,
    Admin,
}

impl Permission {
    /// Declaration order; also the order used by [`Permissions::render`].
    pub const ALL: [Permission; 5] = [
        Permission::Student,
        Permission::Moderator,
        Permission::Developer,
        Permission::Maintainer,
        Permission::Admin,
    ];

    /// The flag's bit in a [`Permissions`] mask.
    pub const fn bit(self) -> u64 {
        match self {
            Permission::Student => 1 << 1,
            Permission::Moderator => 1 << 2,
            Permission::Developer => 1 << 3,
            Permission::Maintainer => 1 << 4,
            Permission::Admin => 1 << 5,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Permission::Student => "Institutional student",
            Permission::Moderator => "Club moderator",
            Permission::Developer => "Certified developer",
            Permission::Maintainer => "Cloud engineer",
            Permission::Admin => "Account administrator",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Student => "student",
            Permission::Moderator => "moderator",
            Permission::Developer => "developer",
            Permission::Maintainer => "maintainer",
            Permission::Admin => "admin",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown permission: {s}")))
    }
}

/// Set of [`Permission`]s packed into a `u64`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Permissions(u64);

impl Permissions {
    /// The "no permissions" sentinel.
    pub const NONE: Permissions = Permissions(1);

    /// Union of `flags`; [`Permissions::NONE`] when `flags` is empty.
    pub fn new(flags: &[Permission]) -> Self {
        let mut set = Self::NONE;
        for flag in flags {
            set.assign(*flag);
        }
        set
    }

    /// Rebuild a set from its stored integer form. A bare zero (or a value that
    /// only carries the sentinel) becomes [`Permissions::NONE`].
    pub fn from_bits(bits: u64) -> Self {
        let flags = bits & !Self::NONE.0;
        if flags == 0 { Self::NONE } else { Self(flags) }
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn assign(&mut self, flag: Permission) {
        self.0 = (self.0 & !Self::NONE.0) | flag.bit();
    }

    pub fn has(self, flag: Permission) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn revoke(&mut self, flag: Permission) {
        *self = Self::from_bits(self.0 & !flag.bit());
    }

    /// Flags contained in this set, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.has(*p))
    }

    /// Labels of every set flag joined by `|`; empty for [`Permissions::NONE`].
    pub fn render(self) -> String {
        self.iter().map(Permission::label).collect::<Vec<_>>().join("|")
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<u64> for Permissions {
    fn from(bits: u64) -> Self {
        Self::from_bits(bits)
    }
}

impl From<Permissions> for u64 {
    fn from(value: Permissions) -> Self {
        value.0
    }
}

impl core::fmt::Display for Permissions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_new_is_the_sentinel() {
        assert_eq!(Permissions::new(&[]), Permissions::NONE);
        assert_eq!(Permissions::default(), Permissions::NONE);
    }

    #[test]
    fn new_unions_flags() {
        let set = Permissions::new(&[Permission::Developer, Permission::Student]);
        assert!(set.has(Permission::Developer));
        assert!(set.has(Permission::Student));
        assert!(!set.has(Permission::Admin));
        assert!(!set.is_none());
    }

    #[test]
    fn assign_is_idempotent() {
        let mut set = Permissions::NONE;
        set.assign(Permission::Student);
        let once = set;
        set.assign(Permission::Student);
        assert_eq!(set, once);
        assert_eq!(set, Permissions::new(&[Permission::Student]));
    }

    #[test]
    fn assign_b_revoke_a_equals_new_b() {
        let mut set = Permissions::NONE;
        set.assign(Permission::Moderator);
        set.assign(Permission::Maintainer);
        set.revoke(Permission::Moderator);
        assert_eq!(set, Permissions::new(&[Permission::Maintainer]));
    }

    #[test]
    fn revoking_last_flag_restores_sentinel() {
        let mut set = Permissions::new(&[Permission::Student]);
        set.revoke(Permission::Student);
        assert_eq!(set, Permissions::NONE);
    }

    #[test]
    fn revoke_on_empty_set_is_noop() {
        let mut set = Permissions::NONE;
        set.revoke(Permission::Student);
        assert_eq!(set, Permissions::NONE);
    }

    #[test]
    fn revoke_of_absent_flag_keeps_others() {
        let mut set = Permissions::new(&[Permission::Developer]);
        set.revoke(Permission::Student);
        assert_eq!(set, Permissions::new(&[Permission::Developer]));
    }

    #[test]
    fn render_lists_labels() {
        assert_eq!(Permissions::NONE.render(), "");
        assert_eq!(
            Permissions::new(&[Permission::Student]).render(),
            "Institutional student"
        );
        let both = Permissions::new(&[Permission::Maintainer, Permission::Student]).render();
        let mut parts: Vec<_> = both.split('|').collect();
        parts.sort();
        assert_eq!(parts, vec!["Cloud engineer", "Institutional student"]);
    }

    #[test]
    fn zero_bits_decode_to_sentinel() {
        assert_eq!(Permissions::from_bits(0), Permissions::NONE);
        let json = serde_json::to_string(&Permissions::NONE).unwrap();
        assert_eq!(json, "1");
        let decoded: Permissions = serde_json::from_str("0").unwrap();
        assert_eq!(decoded, Permissions::NONE);
    }

    #[test]
    fn permission_names_parse() {
        assert_eq!("admin".parse::<Permission>().unwrap(), Permission::Admin);
        assert!("root".parse::<Permission>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_permission() -> impl Strategy<Value = Permission> {
            prop::sample::select(Permission::ALL.to_vec())
        }

        proptest! {
            /// Property: revoking what was just assigned to a set without it
            /// gives back the original set.
            #[test]
            fn assign_then_revoke_is_inverse(
                flags in prop::collection::vec(any_permission(), 0..5),
                extra in any_permission(),
            ) {
                let original = Permissions::new(&flags);
                prop_assume!(!original.has(extra));

                let mut set = original;
                set.assign(extra);
                set.revoke(extra);
                prop_assert_eq!(set, original);
            }

            /// Property: the sentinel bit is set iff no flag is set.
            #[test]
            fn sentinel_iff_empty(flags in prop::collection::vec(any_permission(), 0..5)) {
                let set = Permissions::new(&flags);
                prop_assert_eq!(set.bits() & 1 == 1, set.iter().next().is_none());
            }

            /// Property: from_bits(bits()) is the identity.
            #[test]
            fn bits_round_trip(flags in prop::collection::vec(any_permission(), 0..5)) {
                let set = Permissions::new(&flags);
                prop_assert_eq!(Permissions::from_bits(set.bits()), set);
            }
        }
    }
}
