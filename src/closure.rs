use anyhow::Result;
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::thread::Comment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadEdge {
    pub id: i64,
    pub ancestor: i64,
    pub descendant: i64,
    pub depth: i64,
}

/// Storage the thread reconstruction writes through.
pub trait ClosureStore {
    /// Persist a comment and return its store-local id.
    fn insert_comment(&self, comment: &Comment) -> Result<i64>;

    fn insert_self_edge(&self, id: i64) -> Result<()>;

    /// Copy every ancestor edge of `parent` down to `child`, one level deeper,
    /// in a single batch. Returns how many edges were written.
    fn insert_edges_for_reply(&self, parent: i64, child: i64) -> Result<usize>;

    /// Ancestor edges of `id`, itself first, ordered by depth.
    fn ancestors_of(&self, id: i64) -> Result<Vec<ThreadEdge>>;

    /// Descendant edges of `id`, itself first, ordered by depth.
    fn descendants_of(&self, id: i64) -> Result<Vec<ThreadEdge>>;
}

impl ClosureStore for Connection {
    fn insert_comment(&self, comment: &Comment) -> Result<i64> {
        self.execute(
            "
            INSERT INTO comments (comment_id, username, color, content, article_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                comment.comment_id,
                comment.username,
                comment.color,
                comment.content,
                comment.article_id
            ],
        )?;
        Ok(self.last_insert_rowid())
    }

    fn insert_self_edge(&self, id: i64) -> Result<()> {
        self.execute(
            "INSERT INTO threads (ancestor, descendant, depth) VALUES (?1, ?1, 0)",
            [id],
        )?;
        Ok(())
    }

    fn insert_edges_for_reply(&self, parent: i64, child: i64) -> Result<usize> {
        // One statement, so the batch lands entirely or not at all
        let inserted = self.execute(
            "
            INSERT INTO threads (ancestor, descendant, depth)
            SELECT ancestor, ?1, depth + 1 FROM threads
            WHERE descendant = ?2
            ",
            [child, parent],
        )?;
        Ok(inserted)
    }

    fn ancestors_of(&self, id: i64) -> Result<Vec<ThreadEdge>> {
        edges(
            self,
            "
            SELECT id, ancestor, descendant, depth FROM threads
            WHERE descendant = ?1
            ORDER BY depth, id
            ",
            id,
        )
    }

    fn descendants_of(&self, id: i64) -> Result<Vec<ThreadEdge>> {
        edges(
            self,
            "
            SELECT id, ancestor, descendant, depth FROM threads
            WHERE ancestor = ?1
            ORDER BY depth, id
            ",
            id,
        )
    }
}

fn edges(conn: &Connection, sql: &str, id: i64) -> Result<Vec<ThreadEdge>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let edges = stmt
        .query_map([id], |row| {
            Ok(ThreadEdge {
                id: row.get(0)?,
                ancestor: row.get(1)?,
                descendant: row.get(2)?,
                depth: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}
