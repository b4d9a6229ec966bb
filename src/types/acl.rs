use std::ops;

/// Describes the ability of a user to perform a certain action.
///
/// Permissions can be mixed together like integers with `|` and `&`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission(u32);

impl Permission {
    /// No permissions are set.
    pub const NONE: Permission = Permission(0b00000);
    /// You can access the data of a node and can list its children.
    pub const READ: Permission = Permission(0b00001);
    /// You can set the data of a node.
    pub const WRITE: Permission = Permission(0b00010);
    /// You can create a child node.
    pub const CREATE: Permission = Permission(0b00100);
    /// You can delete a child node (but not necessarily this one).
    pub const DELETE: Permission = Permission(0b01000);
    /// You can alter permissions on this node.
    pub const ADMIN: Permission = Permission(0b10000);
    /// You can do anything.
    pub const ALL: Permission = Permission(0b11111);

    /// Check that all given permissions are set in this value.
    pub fn can(self, permissions: Permission) -> bool {
        (self & permissions) == permissions
    }
}

impl ops::BitAnd for Permission {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Permission(self.0 & rhs.0)
    }
}

impl ops::BitOr for Permission {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Permission(self.0 | rhs.0)
    }
}

/// An access control list entry.
///
/// The emulator accepts ACLs wherever the real client API does, but never enforces them; every
/// session is almighty. They are not even stored on the created node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    /// The permissions associated with this ACL.
    pub perms: Permission,
    /// The scheme used to authenticate the user.
    pub scheme: String,
    /// The entity that is authenticated.
    pub id: String,
}

impl Acl {
    fn new(perms: Permission, scheme: &str, id: &str) -> Acl {
        Acl {
            perms,
            scheme: scheme.to_string(),
            id: id.to_string(),
        }
    }

    /// This ACL gives the creator's authentication id all permissions.
    pub fn creator_all() -> Vec<Acl> {
        vec![Acl::new(Permission::ALL, "auth", "")]
    }

    /// This is a completely open ACL.
    pub fn open_unsafe() -> Vec<Acl> {
        vec![Acl::new(Permission::ALL, "world", "anyone")]
    }

    /// This ACL gives the world the ability to read.
    pub fn read_unsafe() -> Vec<Acl> {
        vec![Acl::new(Permission::READ, "world", "anyone")]
    }
}
