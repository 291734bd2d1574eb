//! Permission masks and the request principal.
//!
//! A mask holds three 7-bit classes: guest (bits 0-6), owner (7-13) and group (14-20).
//! Each class carries peek, read, create, update, delete, execute and refer bits.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Peek,
    Read,
    Create,
    Update,
    Delete,
    Execute,
    Refer,
}

impl Access {
    const fn bit(self) -> i64 {
        match self {
            Access::Peek => 1,
            Access::Read => 1 << 1,
            Access::Create => 1 << 2,
            Access::Update => 1 << 3,
            Access::Delete => 1 << 4,
            Access::Execute => 1 << 5,
            Access::Refer => 1 << 6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    Guest,
    Owner,
    Group,
}

impl Class {
    const fn shift(self) -> u32 {
        match self {
            Class::Guest => 0,
            Class::Owner => 7,
            Class::Group => 14,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(pub i64);

impl Permission {
    pub const NONE: Permission = Permission(0);
    /// Every bit in every class.
    pub const ALL: Permission = Permission((1 << 21) - 1);

    pub const fn allows(self, class: Class, access: Access) -> bool {
        self.0 & (access.bit() << class.shift()) != 0
    }

    pub const fn with(self, class: Class, access: Access) -> Permission {
        Permission(self.0 | (access.bit() << class.shift()))
    }
}

impl From<i64> for Permission {
    fn from(v: i64) -> Self {
        Permission(v)
    }
}

/// Who is making the request. Built by the transport from upstream-authenticated headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Actor {
    pub reference_id: Option<String>,
    pub group_ids: Vec<String>,
    pub is_admin: bool,
}

impl Actor {
    pub fn guest() -> Self {
        Actor::default()
    }

    pub fn user(reference_id: &str) -> Self {
        Actor {
            reference_id: Some(reference_id.to_string()),
            ..Default::default()
        }
    }

    /// Principal used for writes issued by the system itself (e.g. exchanges).
    pub fn system() -> Self {
        Actor {
            is_admin: true,
            ..Default::default()
        }
    }

    pub fn is_guest(&self) -> bool {
        self.reference_id.is_none() && !self.is_admin
    }

    /// Class to test for a table-level check: no row owner, so signed-in users use the owner bits.
    pub fn table_class(&self) -> Class {
        if self.reference_id.is_some() {
            Class::Owner
        } else {
            Class::Guest
        }
    }

    /// Class to test against a row owned by `owner` and shared with `groups`.
    pub fn object_class(&self, owner: Option<&str>, groups: &[String]) -> Class {
        match (&self.reference_id, owner) {
            (Some(me), Some(owner)) if me == owner => Class::Owner,
            (Some(_), _) if groups.iter().any(|g| self.group_ids.contains(g)) => Class::Group,
            _ => Class::Guest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_do_not_overlap() {
        let p = Permission::NONE.with(Class::Owner, Access::Read);
        assert!(p.allows(Class::Owner, Access::Read));
        assert!(!p.allows(Class::Guest, Access::Read));
        assert!(!p.allows(Class::Group, Access::Read));
        assert_eq!(p.0, 1 << 8);
    }

    #[test]
    fn all_allows_everything() {
        for class in [Class::Guest, Class::Owner, Class::Group] {
            for access in [Access::Peek, Access::Read, Access::Create, Access::Update, Access::Delete, Access::Execute, Access::Refer] {
                assert!(Permission::ALL.allows(class, access));
            }
        }
    }

    #[test]
    fn object_class_prefers_ownership_then_group() {
        let mut actor = Actor::user("u1");
        actor.group_ids = vec!["g1".into()];
        assert_eq!(actor.object_class(Some("u1"), &[]), Class::Owner);
        assert_eq!(actor.object_class(Some("u2"), &["g1".into()]), Class::Group);
        assert_eq!(actor.object_class(Some("u2"), &["g2".into()]), Class::Guest);
        assert_eq!(Actor::guest().object_class(None, &["g1".into()]), Class::Guest);
    }

    #[test]
    fn table_class_by_sign_in() {
        assert_eq!(Actor::guest().table_class(), Class::Guest);
        assert_eq!(Actor::user("u1").table_class(), Class::Owner);
        assert!(Actor::guest().is_guest());
        assert!(!Actor::system().is_guest());
    }
}
