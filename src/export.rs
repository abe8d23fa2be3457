use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use crate::article::Article;
use crate::closure::ClosureStore;
use crate::db;

#[derive(Serialize)]
struct ExportSnapshot {
    id: i64,
    time: String,
    articles: Vec<ExportArticle>,
}

#[derive(Serialize)]
struct ExportArticle {
    #[serde(flatten)]
    article: Article,
    comments: Vec<ExportComment>,
}

#[derive(Serialize)]
struct ExportComment {
    id: i64,
    comment_id: i64,
    username: String,
    color: Option<String>,
    content: String,
    parent: Option<i64>,
    depth: i64,
    replies: usize,
}

// Entry point. Returns false when there is no snapshot to export.
pub fn export_json(conn: &Connection, path: &Path) -> Result<bool> {
    let Some(snapshot) = latest(conn)? else {
        return Ok(false);
    };

    let json = serde_json::to_string_pretty(&snapshot)?;

    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;

    Ok(true)
}

fn latest(conn: &Connection) -> Result<Option<ExportSnapshot>> {
    let Some((id, time)) = db::latest_snapshot(conn)? else {
        return Ok(None);
    };

    let mut articles = Vec::new();
    for article in db::articles_for_snapshot(conn, id)? {
        let comments = thread(conn, article.id)?;
        articles.push(ExportArticle { article, comments });
    }

    Ok(Some(ExportSnapshot { id, time, articles }))
}

// Parent and depth come straight from the closure table, no tree walk needed
fn thread(conn: &Connection, article_id: i64) -> Result<Vec<ExportComment>> {
    let mut exported = Vec::new();

    for comment in db::comments_for_article(conn, article_id)? {
        let ancestors = conn.ancestors_of(comment.id)?;
        let parent = ancestors.iter().find(|e| e.depth == 1).map(|e| e.ancestor);
        let depth = ancestors.last().map_or(0, |e| e.depth);
        let replies = conn
            .descendants_of(comment.id)?
            .iter()
            .filter(|e| e.depth == 1)
            .count();

        exported.push(ExportComment {
            id: comment.id,
            comment_id: comment.comment_id,
            username: comment.username,
            color: comment.color,
            content: comment.content,
            parent,
            depth,
            replies,
        });
    }

    Ok(exported)
}
