//! Who may see what, and who may act on it.

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{Tool, Viewer};

/// Approved tools are public. Pending tools are visible only to their owner
/// and to moderators.
///
/// The admin flag alone does not count here even though [`require_moderator`]
/// accepts it. An admin without the moderator flag can approve or reject from
/// the queue but is refused on the detail, comment and similar views of a
/// pending tool. Accounts bootstrapped at startup carry both flags.
pub fn is_visible(tool: &Tool, viewer: &Viewer) -> bool {
    if tool.is_approved {
        return true;
    }
    match viewer {
        Viewer::Anonymous => false,
        Viewer::User { id, is_moderator, .. } => *id == tool.user_id || *is_moderator,
    }
}

/// Detail-view gate. Comments inherit this from their tool.
pub fn ensure_visible(tool: &Tool, viewer: &Viewer) -> DirectoryResult<()> {
    if is_visible(tool, viewer) {
        Ok(())
    } else {
        Err(DirectoryError::Forbidden(format!(
            "Tool {} is not yet approved",
            tool.id
        )))
    }
}

pub fn can_moderate(viewer: &Viewer) -> bool {
    viewer.is_moderator() || viewer.is_admin()
}

pub fn require_authenticated(viewer: &Viewer) -> DirectoryResult<i64> {
    viewer
        .user_id()
        .ok_or_else(|| DirectoryError::Unauthorized("Authentication required".to_string()))
}

pub fn require_moderator(viewer: &Viewer) -> DirectoryResult<()> {
    require_authenticated(viewer)?;
    if can_moderate(viewer) {
        Ok(())
    } else {
        Err(DirectoryError::Forbidden("Moderator rights required".to_string()))
    }
}

pub fn require_admin(viewer: &Viewer) -> DirectoryResult<()> {
    require_authenticated(viewer)?;
    if viewer.is_admin() {
        Ok(())
    } else {
        Err(DirectoryError::Forbidden("Admin rights required".to_string()))
    }
}
