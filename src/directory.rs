//! Viewer-facing operations: browsing, submitting, commenting and voting.
//!
//! Each function applies the visibility and role rules before touching the
//! store, so HTTP handlers only translate requests and responses.

use crate::error::DirectoryResult;
use crate::models::{Category, Comment, SubmitToolRequest, Tool, Viewer, VoteTarget};
use crate::query::{SortOrder, ToolFilters};
use crate::store::{NewTool, Store};
use crate::visibility::{ensure_visible, require_authenticated};

pub const SIMILAR_TOOLS_LIMIT: usize = 5;

/// The public listing. Always evaluated as an anonymous viewer, so only
/// approved tools appear.
pub fn public_tools(store: &Store, filters: &ToolFilters, sort: SortOrder) -> DirectoryResult<Vec<Tool>> {
    store.list_tools(filters, sort, &Viewer::Anonymous)
}

/// Approved tools in one category. Unknown categories are `NotFound`.
pub fn category_tools(
    store: &Store,
    category_id: i64,
    sort: SortOrder,
) -> DirectoryResult<(Category, Vec<Tool>)> {
    let category = store.get_category(category_id)?;
    let tools = public_tools(store, &ToolFilters::new().category(category_id), sort)?;
    Ok((category, tools))
}

pub fn tool_detail(store: &Store, viewer: &Viewer, tool_id: i64) -> DirectoryResult<Tool> {
    let tool = store.get_tool(tool_id)?;
    ensure_visible(&tool, viewer)?;
    Ok(tool)
}

pub fn similar_tools(store: &Store, viewer: &Viewer, tool_id: i64) -> DirectoryResult<Vec<Tool>> {
    let tool = tool_detail(store, viewer, tool_id)?;
    store.similar_tools(tool.id, SIMILAR_TOOLS_LIMIT)
}

/// The viewer's own submissions, pending ones included, newest first.
pub fn my_tools(store: &Store, viewer: &Viewer) -> DirectoryResult<Vec<Tool>> {
    let owner_id = require_authenticated(viewer)?;
    store.list_tools_by_owner(owner_id)
}

/// New submissions wait in the moderation queue.
pub fn submit_tool(store: &Store, viewer: &Viewer, request: &SubmitToolRequest) -> DirectoryResult<Tool> {
    let owner_id = require_authenticated(viewer)?;
    let new_tool = NewTool::from_submission(request)?;
    let tool = store.create_tool(owner_id, &new_tool)?;
    log::info!("Tool {} '{}' submitted by user {}", tool.id, tool.name, owner_id);
    Ok(tool)
}

pub fn tool_comments(
    store: &Store,
    viewer: &Viewer,
    tool_id: i64,
    sort: SortOrder,
) -> DirectoryResult<Vec<Comment>> {
    tool_detail(store, viewer, tool_id)?;
    store.list_comments(tool_id, sort)
}

pub fn add_comment(store: &Store, viewer: &Viewer, tool_id: i64, content: &str) -> DirectoryResult<Comment> {
    let user_id = require_authenticated(viewer)?;
    tool_detail(store, viewer, tool_id)?;
    store.create_comment(tool_id, user_id, content)
}

/// Cast a vote and return the target's new score. Comments inherit their
/// tool's visibility.
pub fn vote(
    store: &Store,
    viewer: &Viewer,
    target: VoteTarget,
    target_id: i64,
    value: i64,
) -> DirectoryResult<i64> {
    let voter_id = require_authenticated(viewer)?;
    let tool_id = match target {
        VoteTarget::Tool => target_id,
        VoteTarget::Comment => store.get_comment(target_id)?.tool_id,
    };
    tool_detail(store, viewer, tool_id)?;

    let score = store.cast_vote(target, target_id, voter_id, value)?;
    log::debug!(
        "User {} voted {} on {} {} (score now {})",
        voter_id,
        value,
        target.label(),
        target_id,
        score
    );
    Ok(score)
}
