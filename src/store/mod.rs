use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::*;

mod comments;
mod tools;
mod votes;

pub use tools::{NamedCategoryInsert, NewTool};

/// Thread-safe SQLite store
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path
    pub fn new(db_path: &str) -> DirectoryResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> DirectoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> DirectoryResult<Self> {
        // Cascading deletes of tools rely on this being on for every connection.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> DirectoryResult<()> {
        let conn = self.conn();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                is_moderator INTEGER NOT NULL DEFAULT 0,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS tools (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                url TEXT NOT NULL,
                image_url TEXT,
                youtube_url TEXT,
                user_id INTEGER NOT NULL,
                is_approved INTEGER NOT NULL DEFAULT 0,
                resources TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS tool_categories (
                tool_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (tool_id, category_id),
                FOREIGN KEY (tool_id) REFERENCES tools(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id)
            );

            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tool_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (tool_id) REFERENCES tools(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS tool_votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tool_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                value INTEGER NOT NULL CHECK (value IN (-1, 1)),
                created_at TEXT NOT NULL,
                UNIQUE (tool_id, user_id),
                FOREIGN KEY (tool_id) REFERENCES tools(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS comment_votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                comment_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                value INTEGER NOT NULL CHECK (value IN (-1, 1)),
                created_at TEXT NOT NULL,
                UNIQUE (comment_id, user_id),
                FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS appearance_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                primary_color TEXT NOT NULL,
                secondary_color TEXT NOT NULL,
                background_color TEXT NOT NULL,
                font_color TEXT NOT NULL,
                font_family TEXT NOT NULL,
                header_background TEXT NOT NULL,
                last_updated TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tools_user_id ON tools(user_id);
            CREATE INDEX IF NOT EXISTS idx_tools_created_at ON tools(created_at);
            CREATE INDEX IF NOT EXISTS idx_tool_categories_category ON tool_categories(category_id);
            CREATE INDEX IF NOT EXISTS idx_comments_tool_id ON comments(tool_id);
            CREATE INDEX IF NOT EXISTS idx_tool_votes_tool_id ON tool_votes(tool_id);
            CREATE INDEX IF NOT EXISTS idx_comment_votes_comment_id ON comment_votes(comment_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub fn create_user(&self, user: &mut User) -> DirectoryResult<()> {
        let conn = self.conn();
        user.created_at = Utc::now();

        conn.execute(
            r#"INSERT INTO users (username, email, password_hash, is_moderator, is_admin, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                &user.username,
                &user.email,
                &user.password_hash,
                user.is_moderator,
                user.is_admin,
                format_datetime(&user.created_at),
            ],
        )
        .map_err(|e| DirectoryError::from_unique_violation(e, "Username or email already taken"))?;

        user.id = conn.last_insert_rowid();
        Ok(())
    }

    pub fn get_user(&self, id: i64) -> DirectoryResult<User> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], Self::row_to_user)
            .optional()?
            .ok_or_else(|| DirectoryError::NotFound(format!("User {}", id)))
    }

    pub fn get_user_by_username(&self, username: &str) -> DirectoryResult<User> {
        let conn = self.conn();
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1",
            params![username],
            Self::row_to_user,
        )
        .optional()?
        .ok_or_else(|| DirectoryError::NotFound(format!("User {}", username)))
    }

    pub fn list_users(&self) -> DirectoryResult<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY created_at DESC, id DESC")?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Update role flags; `None` leaves a flag as it is.
    pub fn set_user_roles(
        &self,
        id: i64,
        is_moderator: Option<bool>,
        is_admin: Option<bool>,
    ) -> DirectoryResult<User> {
        {
            let conn = self.conn();
            let rows = conn.execute(
                r#"UPDATE users SET is_moderator = COALESCE(?1, is_moderator),
                   is_admin = COALESCE(?2, is_admin) WHERE id = ?3"#,
                params![is_moderator, is_admin, id],
            )?;
            if rows == 0 {
                return Err(DirectoryError::NotFound(format!("User {}", id)));
            }
        }
        self.get_user(id)
    }

    pub fn count_users(&self) -> DirectoryResult<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            is_moderator: row.get("is_moderator")?,
            is_admin: row.get("is_admin")?,
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
        })
    }

    // ==================== Category Operations ====================

    pub fn create_category(&self, name: &str, description: &str) -> DirectoryResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectoryError::Validation("Category name is required".to_string()));
        }

        let conn = self.conn();
        conn.execute(
            "INSERT INTO categories (name, description) VALUES (?1, ?2)",
            params![name, description.trim()],
        )
        .map_err(|e| {
            DirectoryError::from_unique_violation(e, format!("Category '{}' already exists", name))
        })?;

        Ok(Category {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.trim().to_string(),
        })
    }

    pub fn get_category(&self, id: i64) -> DirectoryResult<Category> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description FROM categories WHERE id = ?1",
            params![id],
            Self::row_to_category,
        )
        .optional()?
        .ok_or_else(|| DirectoryError::NotFound(format!("Category {}", id)))
    }

    pub fn find_category_by_name(&self, name: &str) -> DirectoryResult<Option<Category>> {
        let conn = self.conn();
        let category = conn
            .query_row(
                "SELECT id, name, description FROM categories WHERE name = ?1",
                params![name.trim()],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    pub fn list_categories(&self) -> DirectoryResult<Vec<Category>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, description FROM categories ORDER BY name ASC")?;
        let categories = stmt
            .query_map([], Self::row_to_category)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Refuses while any tool still links to the category.
    pub fn delete_category(&self, id: i64) -> DirectoryResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists = tx
            .query_row("SELECT 1 FROM categories WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        if exists.is_none() {
            return Err(DirectoryError::NotFound(format!("Category {}", id)));
        }

        let linked: i64 = tx.query_row(
            "SELECT COUNT(*) FROM tool_categories WHERE category_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if linked > 0 {
            return Err(DirectoryError::Conflict(format!(
                "Category {} is still used by {} tool(s)",
                id, linked
            )));
        }

        tx.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }

    // ==================== Appearance Operations ====================

    /// Read the settings row, creating it with defaults on first use.
    pub fn get_appearance(&self) -> DirectoryResult<AppearanceSettings> {
        let conn = self.conn();
        Self::ensure_appearance_row(&conn)?;
        let settings = conn.query_row(
            "SELECT * FROM appearance_settings WHERE id = 1",
            [],
            Self::row_to_appearance,
        )?;
        Ok(settings)
    }

    pub fn update_appearance(&self, update: &AppearanceUpdate) -> DirectoryResult<AppearanceSettings> {
        update.validate()?;
        {
            let conn = self.conn();
            Self::ensure_appearance_row(&conn)?;
            conn.execute(
                r#"UPDATE appearance_settings SET
                   primary_color = COALESCE(?1, primary_color),
                   secondary_color = COALESCE(?2, secondary_color),
                   background_color = COALESCE(?3, background_color),
                   font_color = COALESCE(?4, font_color),
                   font_family = COALESCE(?5, font_family),
                   header_background = COALESCE(?6, header_background),
                   last_updated = ?7
                   WHERE id = 1"#,
                params![
                    update.primary_color,
                    update.secondary_color,
                    update.background_color,
                    update.font_color,
                    update.font_family.as_deref().map(str::trim),
                    update.header_background,
                    format_datetime(&Utc::now()),
                ],
            )?;
        }
        self.get_appearance()
    }

    fn ensure_appearance_row(conn: &Connection) -> DirectoryResult<()> {
        let defaults = AppearanceSettings::default();
        conn.execute(
            r#"INSERT OR IGNORE INTO appearance_settings (id, primary_color, secondary_color,
                background_color, font_color, font_family, header_background, last_updated)
               VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &defaults.primary_color,
                &defaults.secondary_color,
                &defaults.background_color,
                &defaults.font_color,
                &defaults.font_family,
                &defaults.header_background,
                format_datetime(&defaults.last_updated),
            ],
        )?;
        Ok(())
    }

    fn row_to_appearance(row: &rusqlite::Row) -> rusqlite::Result<AppearanceSettings> {
        Ok(AppearanceSettings {
            primary_color: row.get("primary_color")?,
            secondary_color: row.get("secondary_color")?,
            background_color: row.get("background_color")?,
            font_color: row.get("font_color")?,
            font_family: row.get("font_family")?,
            header_background: row.get("header_background")?,
            last_updated: parse_datetime(row.get::<_, String>("last_updated")?),
        })
    }

    // ==================== Dashboard ====================

    pub fn stats(&self) -> DirectoryResult<DirectoryStats> {
        let conn = self.conn();
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |row| row.get(0)) };
        Ok(DirectoryStats {
            users: count("SELECT COUNT(*) FROM users")?,
            tools: count("SELECT COUNT(*) FROM tools")?,
            pending_tools: count("SELECT COUNT(*) FROM tools WHERE is_approved = 0")?,
            categories: count("SELECT COUNT(*) FROM categories")?,
        })
    }
}

impl AppearanceUpdate {
    /// Colors must be `#rrggbb`; the font stack may not be blank.
    pub fn validate(&self) -> DirectoryResult<()> {
        let colors = [
            ("primary_color", &self.primary_color),
            ("secondary_color", &self.secondary_color),
            ("background_color", &self.background_color),
            ("font_color", &self.font_color),
            ("header_background", &self.header_background),
        ];
        for (field, value) in colors {
            if let Some(color) = value {
                if !is_hex_color(color) {
                    return Err(DirectoryError::Validation(format!(
                        "{} must be a #rrggbb color, got '{}'",
                        field, color
                    )));
                }
            }
        }
        if let Some(font) = &self.font_family {
            if font.trim().is_empty() {
                return Err(DirectoryError::Validation("font_family cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

// Fixed-width timestamps so lexical ORDER BY matches chronological order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
