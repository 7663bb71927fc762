//! Permission templates and the provider roles they map onto.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The access an activity grants its recipients, chosen when the activity is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTemplate {
    /// Recipients may edit.
    Edit,
    /// Recipients may comment but not edit.
    Comment,
    /// Recipients may only view.
    View,
}

/// A provider-side access role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full edit access.
    Writer,
    /// May read and comment.
    Commenter,
    /// Read only.
    Reader,
}

/// A resolved grant: a role plus whether commenting is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// The role granted.
    pub role: Role,
    /// Whether the grantee may comment.
    pub allow_comments: bool,
}

impl PermissionTemplate {
    /// Maps the template onto a provider role.
    pub fn resolve(self) -> Permission {
        let (role, allow_comments) = match self {
            PermissionTemplate::Edit => (Role::Writer, true),
            PermissionTemplate::Comment => (Role::Commenter, true),
            PermissionTemplate::View => (Role::Reader, false),
        };
        Permission {
            role,
            allow_comments,
        }
    }
}

impl FromStr for PermissionTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edit" => Ok(PermissionTemplate::Edit),
            "comment" => Ok(PermissionTemplate::Comment),
            "view" => Ok(PermissionTemplate::View),
            other => Err(format!("unknown permission `{other}`, expected edit, comment or view")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Writer => "writer",
            Role::Commenter => "commenter",
            Role::Reader => "reader",
        })
    }
}

#[test]
fn view_disallows_comments() {
    assert_eq!(
        PermissionTemplate::View.resolve(),
        Permission {
            role: Role::Reader,
            allow_comments: false
        }
    );
    assert!(PermissionTemplate::Comment.resolve().allow_comments);
}
