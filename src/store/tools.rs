use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_datetime, parse_datetime, Store};
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::*;
use crate::query::{SortOrder, ToolFilters};
use crate::sanitize::sanitize_html;
use crate::visibility::is_visible;

const TOOL_SELECT: &str = r#"
    SELECT t.id, t.name, t.description, t.url, t.image_url, t.youtube_url, t.user_id,
           u.username AS author, t.is_approved, t.resources, t.created_at,
           (SELECT COALESCE(SUM(v.value), 0) FROM tool_votes v WHERE v.tool_id = t.id) AS vote_count
    FROM tools t
    JOIN users u ON u.id = t.user_id
"#;

/// Position of `resources` in `TOOL_SELECT`.
const RESOURCES_COLUMN: usize = 9;

/// Everything needed to insert a tool. Interactive submissions always arrive
/// unapproved; imports may carry their own approval flag.
#[derive(Debug, Clone)]
pub struct NewTool {
    pub name: String,
    pub description: String,
    pub url: String,
    pub image_url: Option<String>,
    pub youtube_url: Option<String>,
    pub category_ids: Vec<i64>,
    pub resources: Vec<ToolResource>,
    pub is_approved: bool,
}

impl NewTool {
    /// Interactive submission: at least one category is required.
    pub fn from_submission(req: &SubmitToolRequest) -> DirectoryResult<Self> {
        if req.categories.is_empty() {
            return Err(DirectoryError::Validation(
                "Select at least one category".to_string(),
            ));
        }
        Ok(Self {
            name: req.name.clone(),
            description: req.description.clone(),
            url: req.url.clone(),
            image_url: req.image_url.clone(),
            youtube_url: req.youtube_url.clone(),
            category_ids: req.categories.clone(),
            resources: req.resources.clone(),
            is_approved: false,
        })
    }
}

/// Result of [`Store::create_tool_with_category_names`].
#[derive(Debug, Clone)]
pub struct NamedCategoryInsert {
    pub tool: Tool,
    pub created_categories: Vec<String>,
    /// Names dropped because no category matched
    pub unknown_categories: Vec<String>,
}

impl Store {
    // ==================== Tool Operations ====================

    /// Insert a tool and its category links in one transaction.
    pub fn create_tool(&self, owner_id: i64, new_tool: &NewTool) -> DirectoryResult<Tool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let tool = Self::insert_tool(&tx, owner_id, new_tool)?;
        tx.commit()?;
        Ok(tool)
    }

    /// Insert a tool whose categories are given by name. Names that match no
    /// category are created when `create_missing` is set and dropped
    /// otherwise. Category creation shares the tool's transaction, so a tool
    /// that fails to insert leaves no new categories behind.
    pub fn create_tool_with_category_names(
        &self,
        owner_id: i64,
        new_tool: &NewTool,
        category_names: &[&str],
        create_missing: bool,
    ) -> DirectoryResult<NamedCategoryInsert> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut new_tool = new_tool.clone();
        let mut created_categories = Vec::new();
        let mut unknown_categories: Vec<String> = Vec::new();

        for category_name in category_names {
            let category_name = category_name.trim();
            if category_name.is_empty() {
                continue;
            }
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM categories WHERE name = ?1",
                    params![category_name],
                    |row| row.get(0),
                )
                .optional()?;
            match existing {
                Some(id) => new_tool.category_ids.push(id),
                None if create_missing => {
                    tx.execute(
                        "INSERT INTO categories (name, description) VALUES (?1, '')",
                        params![category_name],
                    )?;
                    new_tool.category_ids.push(tx.last_insert_rowid());
                    created_categories.push(category_name.to_string());
                }
                None => {
                    if !unknown_categories.iter().any(|n| n == category_name) {
                        unknown_categories.push(category_name.to_string());
                    }
                }
            }
        }

        let tool = Self::insert_tool(&tx, owner_id, &new_tool)?;
        tx.commit()?;
        Ok(NamedCategoryInsert {
            tool,
            created_categories,
            unknown_categories,
        })
    }

    fn insert_tool(conn: &Connection, owner_id: i64, new_tool: &NewTool) -> DirectoryResult<Tool> {
        let name = new_tool.name.trim();
        let url = new_tool.url.trim();
        let description = sanitize_html(&new_tool.description);
        if name.is_empty() || url.is_empty() || description.trim().is_empty() {
            return Err(DirectoryError::Validation(
                "Name, description and URL are required".to_string(),
            ));
        }

        let mut category_ids = new_tool.category_ids.clone();
        category_ids.sort_unstable();
        category_ids.dedup();

        let resources_json = serde_json::to_string(&new_tool.resources)?;
        let created_at = Utc::now();

        for category_id in &category_ids {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM categories WHERE id = ?1",
                    params![category_id],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_none() {
                return Err(DirectoryError::Validation(format!(
                    "Invalid category selection: {}",
                    category_id
                )));
            }
        }

        conn.execute(
            r#"INSERT INTO tools (name, description, url, image_url, youtube_url, user_id,
                is_approved, resources, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                name,
                &description,
                url,
                non_blank(&new_tool.image_url),
                non_blank(&new_tool.youtube_url),
                owner_id,
                new_tool.is_approved,
                &resources_json,
                format_datetime(&created_at),
            ],
        )?;
        let tool_id = conn.last_insert_rowid();

        for category_id in &category_ids {
            conn.execute(
                "INSERT INTO tool_categories (tool_id, category_id) VALUES (?1, ?2)",
                params![tool_id, category_id],
            )?;
        }

        Self::load_tool(conn, tool_id)
    }

    pub fn get_tool(&self, id: i64) -> DirectoryResult<Tool> {
        let conn = self.conn();
        Self::load_tool(&conn, id)
    }

    pub fn tool_name_exists(&self, name: &str) -> DirectoryResult<bool> {
        let conn = self.conn();
        let found = conn
            .query_row(
                "SELECT 1 FROM tools WHERE name = ?1",
                params![name.trim()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// The listing pipeline: visibility for `viewer`, then search, then
    /// category membership, ordered by `sort`.
    pub fn list_tools(
        &self,
        filters: &ToolFilters,
        sort: SortOrder,
        viewer: &Viewer,
    ) -> DirectoryResult<Vec<Tool>> {
        let conn = self.conn();
        let order = match sort {
            SortOrder::Votes => "vote_count DESC, t.id ASC",
            SortOrder::Date => "t.created_at DESC, t.id DESC",
        };
        let sql = format!(
            r#"{TOOL_SELECT}
               WHERE (?1 IS NULL OR EXISTS (
                   SELECT 1 FROM tool_categories tc WHERE tc.tool_id = t.id AND tc.category_id = ?1))
               ORDER BY {order}"#
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![filters.category_id], Self::row_to_tool)?;

        let mut tools = Vec::new();
        for row in rows {
            let tool = row?;
            if is_visible(&tool, viewer) && filters.matches_search(&tool) {
                tools.push(tool);
            }
        }

        Self::attach_categories(&conn, &mut tools)?;
        Ok(tools)
    }

    /// Approved tools sharing a category with `tool_id`, most overlap first,
    /// then by score, then by id.
    pub fn similar_tools(&self, tool_id: i64, limit: usize) -> DirectoryResult<Vec<Tool>> {
        let conn = self.conn();
        let sql = format!(
            r#"SELECT sub.* FROM (
                   {TOOL_SELECT}
                   WHERE t.id != ?1 AND t.is_approved = 1
               ) sub
               JOIN tool_categories tc ON tc.tool_id = sub.id
               WHERE tc.category_id IN (SELECT category_id FROM tool_categories WHERE tool_id = ?1)
               GROUP BY sub.id
               ORDER BY COUNT(tc.category_id) DESC, sub.vote_count DESC, sub.id ASC
               LIMIT ?2"#
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut tools = stmt
            .query_map(params![tool_id, limit as i64], Self::row_to_tool)?
            .collect::<Result<Vec<_>, _>>()?;

        Self::attach_categories(&conn, &mut tools)?;
        Ok(tools)
    }

    /// Moderation queue, newest first.
    pub fn list_pending_tools(&self) -> DirectoryResult<Vec<Tool>> {
        let conn = self.conn();
        let sql = format!("{TOOL_SELECT} WHERE t.is_approved = 0 ORDER BY t.created_at DESC, t.id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let mut tools = stmt
            .query_map([], Self::row_to_tool)?
            .collect::<Result<Vec<_>, _>>()?;

        Self::attach_categories(&conn, &mut tools)?;
        Ok(tools)
    }

    /// Every tool regardless of state, newest first.
    pub fn list_all_tools(&self) -> DirectoryResult<Vec<Tool>> {
        let conn = self.conn();
        let sql = format!("{TOOL_SELECT} ORDER BY t.created_at DESC, t.id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let mut tools = stmt
            .query_map([], Self::row_to_tool)?
            .collect::<Result<Vec<_>, _>>()?;

        Self::attach_categories(&conn, &mut tools)?;
        Ok(tools)
    }

    /// Tools submitted by `owner_id`, pending ones included, newest first.
    pub fn list_tools_by_owner(&self, owner_id: i64) -> DirectoryResult<Vec<Tool>> {
        let conn = self.conn();
        let sql = format!("{TOOL_SELECT} WHERE t.user_id = ?1 ORDER BY t.created_at DESC, t.id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let mut tools = stmt
            .query_map(params![owner_id], Self::row_to_tool)?
            .collect::<Result<Vec<_>, _>>()?;

        Self::attach_categories(&conn, &mut tools)?;
        Ok(tools)
    }

    /// PENDING -> APPROVED
    pub fn approve_tool(&self, id: i64) -> DirectoryResult<Tool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        Self::require_pending(&tx, id)?;
        tx.execute("UPDATE tools SET is_approved = 1 WHERE id = ?1", params![id])?;
        let tool = Self::load_tool(&tx, id)?;
        tx.commit()?;
        Ok(tool)
    }

    /// PENDING -> DELETED. Comments, votes and category links go with it.
    pub fn reject_tool(&self, id: i64) -> DirectoryResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        Self::require_pending(&tx, id)?;
        tx.execute("DELETE FROM tools WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    /// Unconditional delete, whatever the approval state.
    pub fn delete_tool(&self, id: i64) -> DirectoryResult<()> {
        let conn = self.conn();
        let rows = conn.execute("DELETE FROM tools WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(DirectoryError::NotFound(format!("Tool {}", id)));
        }
        Ok(())
    }

    fn require_pending(conn: &Connection, id: i64) -> DirectoryResult<()> {
        let approved: Option<bool> = conn
            .query_row(
                "SELECT is_approved FROM tools WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match approved {
            None => Err(DirectoryError::NotFound(format!("Tool {}", id))),
            Some(true) => Err(DirectoryError::Validation(format!(
                "Tool {} is already approved",
                id
            ))),
            Some(false) => Ok(()),
        }
    }

    fn load_tool(conn: &Connection, id: i64) -> DirectoryResult<Tool> {
        let sql = format!("{TOOL_SELECT} WHERE t.id = ?1");
        let tool = conn
            .query_row(&sql, params![id], Self::row_to_tool)
            .optional()?;
        let mut tool = tool.ok_or_else(|| DirectoryError::NotFound(format!("Tool {}", id)))?;
        tool.categories = Self::categories_for_tool(conn, id)?;
        Ok(tool)
    }

    fn attach_categories(conn: &Connection, tools: &mut [Tool]) -> DirectoryResult<()> {
        for tool in tools.iter_mut() {
            tool.categories = Self::categories_for_tool(conn, tool.id)?;
        }
        Ok(())
    }

    fn categories_for_tool(conn: &Connection, tool_id: i64) -> DirectoryResult<Vec<Category>> {
        let mut stmt = conn.prepare(
            r#"SELECT c.id, c.name, c.description FROM categories c
               JOIN tool_categories tc ON tc.category_id = c.id
               WHERE tc.tool_id = ?1 ORDER BY c.name ASC"#,
        )?;
        let categories = stmt
            .query_map(params![tool_id], Self::row_to_category)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn row_to_tool(row: &rusqlite::Row) -> rusqlite::Result<Tool> {
        let resources_str: String = row.get("resources")?;
        let resources: Vec<ToolResource> = serde_json::from_str(&resources_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                RESOURCES_COLUMN,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(Tool {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            url: row.get("url")?,
            image_url: row.get("image_url")?,
            youtube_url: row.get("youtube_url")?,
            user_id: row.get("user_id")?,
            author: row.get("author")?,
            is_approved: row.get("is_approved")?,
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
            categories: Vec::new(),
            resources,
            vote_count: row.get("vote_count")?,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
