use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Store};
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::Comment;
use crate::query::SortOrder;
use crate::sanitize::sanitize_html;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.tool_id, c.user_id, u.username AS author, c.content, c.created_at,
           (SELECT COALESCE(SUM(v.value), 0) FROM comment_votes v WHERE v.comment_id = c.id) AS vote_count
    FROM comments c
    JOIN users u ON u.id = c.user_id
"#;

impl Store {
    // ==================== Comment Operations ====================

    pub fn create_comment(&self, tool_id: i64, user_id: i64, content: &str) -> DirectoryResult<Comment> {
        let content = sanitize_html(content);
        if content.trim().is_empty() {
            return Err(DirectoryError::Validation("Comment cannot be empty".to_string()));
        }

        let conn = self.conn();
        let tool_exists = conn
            .query_row("SELECT 1 FROM tools WHERE id = ?1", params![tool_id], |_| Ok(()))
            .optional()?;
        if tool_exists.is_none() {
            return Err(DirectoryError::NotFound(format!("Tool {}", tool_id)));
        }

        conn.execute(
            r#"INSERT INTO comments (tool_id, user_id, content, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![tool_id, user_id, &content, format_datetime(&Utc::now())],
        )?;
        let id = conn.last_insert_rowid();

        conn.query_row(
            &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
            params![id],
            Self::row_to_comment,
        )
        .map_err(DirectoryError::from)
    }

    pub fn get_comment(&self, id: i64) -> DirectoryResult<Comment> {
        let conn = self.conn();
        conn.query_row(
            &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
            params![id],
            Self::row_to_comment,
        )
        .optional()?
        .ok_or_else(|| DirectoryError::NotFound(format!("Comment {}", id)))
    }

    pub fn list_comments(&self, tool_id: i64, sort: SortOrder) -> DirectoryResult<Vec<Comment>> {
        let conn = self.conn();
        let order = match sort {
            SortOrder::Votes => "vote_count DESC, c.id ASC",
            SortOrder::Date => "c.created_at DESC, c.id DESC",
        };
        let mut stmt = conn.prepare(&format!(
            "{COMMENT_SELECT} WHERE c.tool_id = ?1 ORDER BY {order}"
        ))?;
        let comments = stmt
            .query_map(params![tool_id], Self::row_to_comment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: row.get("id")?,
            tool_id: row.get("tool_id")?,
            user_id: row.get("user_id")?,
            author: row.get("author")?,
            content: row.get("content")?,
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
            vote_count: row.get("vote_count")?,
        })
    }
}
