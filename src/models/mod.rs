use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// A registered account. Role flags gate moderation and admin actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_moderator: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Category groups tools; a tool can belong to several.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Extra link attached to a tool listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResource {
    pub title: String,
    pub url: String,
}

/// Tool is a submitted AI product listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub url: String,
    pub image_url: Option<String>,
    pub youtube_url: Option<String>,
    pub user_id: i64,
    /// Owner's username, joined in for display
    pub author: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub resources: Vec<ToolResource>,
    /// Net vote score, always the live sum of the tool's vote rows
    pub vote_count: i64,
}

impl Tool {
    pub fn has_category(&self, category_id: i64) -> bool {
        self.categories.iter().any(|c| c.id == category_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub tool_id: i64,
    pub user_id: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub vote_count: i64,
}

/// A single signed vote on a tool or comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub target_id: i64,
    pub user_id: i64,
    pub value: i64,
    pub created_at: DateTime<Utc>,
}

/// What a vote is cast on. Tools and comments keep votes in separate tables
/// with the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Tool,
    Comment,
}

impl VoteTarget {
    pub(crate) fn vote_table(self) -> &'static str {
        match self {
            VoteTarget::Tool => "tool_votes",
            VoteTarget::Comment => "comment_votes",
        }
    }

    pub(crate) fn target_table(self) -> &'static str {
        match self {
            VoteTarget::Tool => "tools",
            VoteTarget::Comment => "comments",
        }
    }

    pub(crate) fn target_column(self) -> &'static str {
        match self {
            VoteTarget::Tool => "tool_id",
            VoteTarget::Comment => "comment_id",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VoteTarget::Tool => "Tool",
            VoteTarget::Comment => "Comment",
        }
    }
}

/// Up or down. Anything else is rejected before touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = DirectoryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(DirectoryError::InvalidVoteValue(other)),
        }
    }
}

/// Who is asking. Role flags are read from the store on every request.
#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    Anonymous,
    User {
        id: i64,
        username: String,
        is_moderator: bool,
        is_admin: bool,
    },
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User { id, .. } => Some(*id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::User { .. })
    }

    pub fn is_moderator(&self) -> bool {
        matches!(self, Viewer::User { is_moderator: true, .. })
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Viewer::User { is_admin: true, .. })
    }
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Viewer::User {
            id: user.id,
            username: user.username.clone(),
            is_moderator: user.is_moderator,
            is_admin: user.is_admin,
        }
    }
}

/// Site theme. Singleton row, created with defaults on first read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppearanceSettings {
    pub primary_color: String,
    pub secondary_color: String,
    pub background_color: String,
    pub font_color: String,
    pub font_family: String,
    pub header_background: String,
    pub last_updated: DateTime<Utc>,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            primary_color: "#0d6efd".to_string(),
            secondary_color: "#6c757d".to_string(),
            background_color: "#212529".to_string(),
            font_color: "#ffffff".to_string(),
            font_family: r#"system-ui, -apple-system, "Segoe UI", Roboto, "Helvetica Neue", "Noto Sans", "Liberation Sans", Arial, sans-serif"#.to_string(),
            header_background: "#212529".to_string(),
            last_updated: Utc::now(),
        }
    }
}

/// The only appearance fields an admin may change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppearanceUpdate {
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub background_color: Option<String>,
    pub font_color: Option<String>,
    pub font_family: Option<String>,
    pub header_background: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DirectoryStats {
    pub users: i64,
    pub tools: i64,
    pub pending_tools: i64,
    pub categories: i64,
}

// Request/Response types for API
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitToolRequest {
    pub name: String,
    pub description: String,
    pub url: String,
    pub image_url: Option<String>,
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<i64>,
    #[serde(default)]
    pub resources: Vec<ToolResource>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub value: i64,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub votes: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRolesRequest {
    pub is_moderator: Option<bool>,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_value_accepts_only_unit_values() {
        assert_eq!(VoteValue::try_from(1).unwrap(), VoteValue::Up);
        assert_eq!(VoteValue::try_from(-1).unwrap(), VoteValue::Down);
        for bad in [0, 2, -2, 100] {
            assert!(matches!(
                VoteValue::try_from(bad),
                Err(DirectoryError::InvalidVoteValue(v)) if v == bad
            ));
        }
    }

    #[test]
    fn test_viewer_roles() {
        assert!(!Viewer::Anonymous.is_authenticated());
        assert_eq!(Viewer::Anonymous.user_id(), None);

        let moderator = Viewer::User {
            id: 7,
            username: "mod".to_string(),
            is_moderator: true,
            is_admin: false,
        };
        assert!(moderator.is_moderator());
        assert!(!moderator.is_admin());
        assert_eq!(moderator.user_id(), Some(7));
    }
}
