use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_datetime, parse_datetime, Store};
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{Vote, VoteTarget, VoteValue};

impl Store {
    // ==================== Vote Operations ====================

    /// Record `voter_id`'s vote on a tool or comment and return the target's
    /// new net score. A repeat vote overwrites the earlier one.
    pub fn cast_vote(
        &self,
        target: VoteTarget,
        target_id: i64,
        voter_id: i64,
        value: i64,
    ) -> DirectoryResult<i64> {
        let value = VoteValue::try_from(value)?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        Self::require_target(&tx, target, target_id)?;

        tx.execute(
            &format!(
                r#"INSERT INTO {table} ({column}, user_id, value, created_at)
                   VALUES (?1, ?2, ?3, ?4)
                   ON CONFLICT({column}, user_id) DO UPDATE SET value = excluded.value"#,
                table = target.vote_table(),
                column = target.target_column(),
            ),
            params![target_id, voter_id, value.as_i64(), format_datetime(&Utc::now())],
        )?;

        let total = Self::sum_votes(&tx, target, target_id)?;
        tx.commit()?;
        Ok(total)
    }

    /// Live sum of the target's votes; zero when nobody has voted.
    pub fn vote_count(&self, target: VoteTarget, target_id: i64) -> DirectoryResult<i64> {
        let conn = self.conn();
        Self::require_target(&conn, target, target_id)?;
        Self::sum_votes(&conn, target, target_id)
    }

    pub fn list_votes(&self, target: VoteTarget, target_id: i64) -> DirectoryResult<Vec<Vote>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, {column} AS target_id, user_id, value, created_at FROM {table}
             WHERE {column} = ?1 ORDER BY id ASC",
            table = target.vote_table(),
            column = target.target_column(),
        ))?;
        let votes = stmt
            .query_map(params![target_id], |row| {
                Ok(Vote {
                    id: row.get("id")?,
                    target_id: row.get("target_id")?,
                    user_id: row.get("user_id")?,
                    value: row.get("value")?,
                    created_at: parse_datetime(row.get::<_, String>("created_at")?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(votes)
    }

    fn require_target(conn: &Connection, target: VoteTarget, target_id: i64) -> DirectoryResult<()> {
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", target.target_table()),
                params![target_id],
                |_| Ok(()),
            )
            .optional()?;
        found.ok_or_else(|| DirectoryError::NotFound(format!("{} {}", target.label(), target_id)))
    }

    fn sum_votes(conn: &Connection, target: VoteTarget, target_id: i64) -> DirectoryResult<i64> {
        let total: i64 = conn.query_row(
            &format!(
                "SELECT COALESCE(SUM(value), 0) FROM {table} WHERE {column} = ?1",
                table = target.vote_table(),
                column = target.target_column(),
            ),
            params![target_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
