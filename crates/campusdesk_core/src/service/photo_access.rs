//! Photo permission rules.
//!
//! Pure functions over roles and already-fetched tag rows; no I/O.

use crate::model::{PersonId, Role};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Person acting on the photo module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub person_id: PersonId,
    pub role: Role,
}

impl Actor {
    pub fn new(person_id: PersonId, role: Role) -> Self {
        Self { person_id, role }
    }
}

/// Role-gated photo operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhotoAction {
    Upload,
    Tag,
    RemoveTag,
    Delete,
    ViewAll,
    ViewUntagged,
}

impl PhotoAction {
    pub const ALL: &'static [PhotoAction] = &[
        Self::Upload,
        Self::Tag,
        Self::RemoveTag,
        Self::Delete,
        Self::ViewAll,
        Self::ViewUntagged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Tag => "tag",
            Self::RemoveTag => "remove_tag",
            Self::Delete => "delete",
            Self::ViewAll => "view_all",
            Self::ViewUntagged => "view_untagged",
        }
    }

    /// Returns whether `role` may perform this action.
    pub fn permits(self, role: Role) -> bool {
        match self {
            Self::Delete => role == Role::Admin,
            Self::Upload | Self::Tag | Self::RemoveTag | Self::ViewAll | Self::ViewUntagged => {
                matches!(role, Role::Staff | Role::Admin)
            }
        }
    }
}

impl Display for PhotoAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns whether `viewer` may see a photo tagged with `tagged`.
///
/// `children` lists the viewer's own children and only matters for parents.
pub fn can_view_photo(viewer: &Actor, tagged: &[PersonId], children: &[PersonId]) -> bool {
    if PhotoAction::ViewAll.permits(viewer.role) {
        return true;
    }
    match viewer.role {
        Role::Parent => tagged.iter().any(|person_id| children.contains(person_id)),
        Role::Student => tagged.contains(&viewer.person_id),
        Role::Staff | Role::Admin => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{can_view_photo, Actor, PhotoAction};
    use crate::model::Role;

    #[test]
    fn permission_table_is_total_over_roles() {
        let expected = |action: PhotoAction, role: Role| match (action, role) {
            (PhotoAction::Delete, Role::Admin) => true,
            (PhotoAction::Delete, _) => false,
            (_, Role::Staff | Role::Admin) => true,
            (_, Role::Parent | Role::Student) => false,
        };
        for action in PhotoAction::ALL {
            for role in Role::ALL {
                assert_eq!(action.permits(*role), expected(*action, *role), "{action} {role}");
            }
        }
    }

    #[test]
    fn staff_and_admin_see_untagged_photos() {
        assert!(can_view_photo(&Actor::new(1, Role::Staff), &[], &[]));
        assert!(can_view_photo(&Actor::new(2, Role::Admin), &[], &[]));
    }

    #[test]
    fn parent_sees_photos_of_own_children_only() {
        let parent = Actor::new(10, Role::Parent);
        assert!(can_view_photo(&parent, &[30, 31], &[31]));
        assert!(!can_view_photo(&parent, &[30], &[31]));
        assert!(!can_view_photo(&parent, &[], &[31]));
    }

    #[test]
    fn student_sees_photos_they_are_tagged_in() {
        let student = Actor::new(31, Role::Student);
        assert!(can_view_photo(&student, &[30, 31], &[]));
        assert!(!can_view_photo(&student, &[30], &[31]));
    }
}
