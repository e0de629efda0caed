//! Approval workflow for submitted tools.
//!
//! A tool starts PENDING. A moderator either approves it (APPROVED) or rejects
//! it, which deletes the row along with its comments, votes and category
//! links. Neither transition is allowed once a tool is approved; from then on
//! only an admin can remove it.

use crate::error::DirectoryResult;
use crate::models::{Tool, Viewer};
use crate::store::Store;
use crate::visibility::{require_admin, require_moderator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
    Remove,
}

#[derive(Debug, Clone)]
pub enum ModerationOutcome {
    Approved(Tool),
    Deleted(i64),
}

/// Apply `action` to a tool on behalf of `viewer`. Role checks happen before
/// the store is touched, so a refused action leaves the tool unchanged.
pub fn moderate(
    store: &Store,
    viewer: &Viewer,
    tool_id: i64,
    action: ModerationAction,
) -> DirectoryResult<ModerationOutcome> {
    match action {
        ModerationAction::Approve => approve_tool(store, viewer, tool_id).map(ModerationOutcome::Approved),
        ModerationAction::Reject => {
            reject_tool(store, viewer, tool_id).map(|_| ModerationOutcome::Deleted(tool_id))
        }
        ModerationAction::Remove => {
            remove_tool(store, viewer, tool_id).map(|_| ModerationOutcome::Deleted(tool_id))
        }
    }
}

pub fn approve_tool(store: &Store, viewer: &Viewer, tool_id: i64) -> DirectoryResult<Tool> {
    require_moderator(viewer)?;
    let tool = store.approve_tool(tool_id)?;
    log::info!("Tool {} approved by user {:?}", tool_id, viewer.user_id());
    Ok(tool)
}

pub fn reject_tool(store: &Store, viewer: &Viewer, tool_id: i64) -> DirectoryResult<()> {
    require_moderator(viewer)?;
    store.reject_tool(tool_id)?;
    log::info!("Tool {} rejected by user {:?}", tool_id, viewer.user_id());
    Ok(())
}

pub fn remove_tool(store: &Store, viewer: &Viewer, tool_id: i64) -> DirectoryResult<()> {
    require_admin(viewer)?;
    store.delete_tool(tool_id)?;
    log::info!("Tool {} removed by admin {:?}", tool_id, viewer.user_id());
    Ok(())
}

pub fn pending_tools(store: &Store, viewer: &Viewer) -> DirectoryResult<Vec<Tool>> {
    require_moderator(viewer)?;
    store.list_pending_tools()
}

/// Every tool whatever its state, newest first.
pub fn all_tools(store: &Store, viewer: &Viewer) -> DirectoryResult<Vec<Tool>> {
    require_moderator(viewer)?;
    store.list_all_tools()
}
