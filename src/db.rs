use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use crate::article::Article;

// Stored comment, as read back for export
#[derive(Debug)]
pub struct StoredComment {
    pub id: i64,
    pub comment_id: i64,
    pub username: String,
    pub color: Option<String>,
    pub content: String,
}

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

// Initialize tables
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rank INTEGER NOT NULL,
            link TEXT NOT NULL,
            title TEXT NOT NULL,
            score INTEGER NOT NULL,
            username TEXT NOT NULL,
            comment_count INTEGER NOT NULL,
            comments_link TEXT NOT NULL,
            snapshot_id INTEGER NOT NULL REFERENCES snapshots(id)
        );

        CREATE INDEX IF NOT EXISTS idx_articles_snapshot
            ON articles (snapshot_id);

        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            comment_id INTEGER NOT NULL,
            username TEXT NOT NULL,
            color TEXT,
            content TEXT NOT NULL,
            article_id INTEGER NOT NULL REFERENCES articles(id)
        );

        CREATE INDEX IF NOT EXISTS idx_comments_article
            ON comments (article_id);

        -- Closure table: one row per (ancestor, descendant) pair, self included
        CREATE TABLE IF NOT EXISTS threads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ancestor INTEGER NOT NULL REFERENCES comments(id),
            descendant INTEGER NOT NULL REFERENCES comments(id),
            depth INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_threads_descendant
            ON threads (descendant);

        CREATE INDEX IF NOT EXISTS idx_threads_ancestor
            ON threads (ancestor);
        ",
    )?;

    Ok(())
}

pub fn insert_snapshot(conn: &Connection, time: &DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO snapshots (time) VALUES (?1)",
        [time.to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_article(conn: &Connection, article: &Article) -> Result<i64> {
    conn.execute(
        "
        INSERT INTO articles
        (rank, link, title, score, username, comment_count, comments_link, snapshot_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            article.rank,
            article.link,
            article.title,
            article.score,
            article.username,
            article.comment_count,
            article.comments_link,
            article.snapshot_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// Most recent snapshot as (id, time)
pub fn latest_snapshot(conn: &Connection) -> Result<Option<(i64, String)>> {
    let mut stmt = conn.prepare("SELECT id, time FROM snapshots ORDER BY id DESC LIMIT 1")?;
    let mut rows = stmt.query([])?;

    if let Some(row) = rows.next()? {
        return Ok(Some((row.get(0)?, row.get(1)?)));
    }

    Ok(None)
}

pub fn articles_for_snapshot(conn: &Connection, snapshot_id: i64) -> Result<Vec<Article>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, snapshot_id, rank, link, title, score, username, comment_count, comments_link
        FROM articles
        WHERE snapshot_id = ?1
        ORDER BY rank, id
        ",
    )?;

    let rows = stmt.query_map([snapshot_id], |row| {
        Ok(Article {
            id: row.get(0)?,
            snapshot_id: row.get(1)?,
            rank: row.get(2)?,
            link: row.get(3)?,
            title: row.get(4)?,
            score: row.get(5)?,
            username: row.get(6)?,
            comment_count: row.get(7)?,
            comments_link: row.get(8)?,
        })
    })?;

    let mut articles = Vec::new();
    for article in rows {
        articles.push(article?);
    }

    Ok(articles)
}

// Comments of an article in the order they were scanned
pub fn comments_for_article(conn: &Connection, article_id: i64) -> Result<Vec<StoredComment>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, comment_id, username, color, content
        FROM comments
        WHERE article_id = ?1
        ORDER BY id
        ",
    )?;

    let rows = stmt.query_map([article_id], |row| {
        Ok(StoredComment {
            id: row.get(0)?,
            comment_id: row.get(1)?,
            username: row.get(2)?,
            color: row.get(3)?,
            content: row.get(4)?,
        })
    })?;

    let mut comments = Vec::new();
    for comment in rows {
        comments.push(comment?);
    }

    Ok(comments)
}

#[cfg(test)]
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    init(&conn)?;
    Ok(conn)
}
