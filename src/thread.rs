use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::article::Article;
use crate::closure::ClosureStore;
use crate::error::RowError;
use crate::rows::{Layout, Row};

// `offset` is the indentation width, only used while rebuilding the thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub comment_id: i64,
    pub username: String,
    pub color: Option<String>,
    pub content: String,
    pub article_id: i64,
    pub offset: i32,
}

impl Comment {
    pub fn parse(row: &impl Row, layout: &Layout, article_id: i64) -> Result<Self, RowError> {
        let offset = row
            .attr(&layout.indent, "width")
            .and_then(|w| w.trim().parse::<i32>().ok())
            .ok_or(RowError::MissingOffset)?;

        // The head holds the user link and the permalink, nothing else
        let links = row.links(&layout.comment_head_link);
        let [user, permalink] = links.as_slice() else {
            return Err(RowError::HeadLinks(links.len()));
        };
        let comment_id = permalink
            .href
            .as_deref()
            .and_then(|href| href.rsplit('=').next())
            .and_then(|id| id.parse::<i64>().ok())
            .ok_or_else(|| RowError::CommentId(permalink.href.clone()))?;

        // Downvoted comments are rendered in a lighter color
        let color = row.attr(&layout.comment_font, "color");
        let content = row
            .html_without(&layout.comment, &layout.reply)
            .ok_or(RowError::MissingBody)?;

        Ok(Self {
            comment_id,
            username: user.text.clone(),
            color,
            content,
            article_id,
            offset,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSummary {
    pub stored: usize,
    pub skipped: usize,
    pub edges: usize,
}

// Entry on the root-to-leaf path
struct PathEntry {
    id: i64,
    offset: i32,
}

/// Store the comments of `article` and their closure edges. Rows must be in
/// page order.
pub fn reconstruct<S, R>(
    store: &S,
    article: &Article,
    rows: &[R],
    layout: &Layout,
) -> Result<ThreadSummary>
where
    S: ClosureStore + ?Sized,
    R: Row,
{
    let mut path: Vec<PathEntry> = Vec::new();
    let mut summary = ThreadSummary::default();

    for (position, row) in rows.iter().enumerate() {
        let comment = match Comment::parse(row, layout, article.id) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    article = %article.comments_link,
                    position,
                    error = %e,
                    "skipping malformed comment"
                );
                summary.skipped += 1;
                continue;
            }
        };

        // Prior comments at an equal or deeper offset can't take more replies
        while path.last().is_some_and(|top| top.offset >= comment.offset) {
            path.pop();
        }

        let id = store.insert_comment(&comment)?;
        store.insert_self_edge(id)?;
        summary.edges += 1;

        if let Some(parent) = path.last() {
            let inserted = store.insert_edges_for_reply(parent.id, id)?;
            if inserted == 0 {
                warn!(
                    article = %article.comments_link,
                    position,
                    parent = parent.id,
                    child = id,
                    "parent comment has no ancestor edges, reply left unlinked"
                );
            }
            summary.edges += inserted;
        }

        debug!(
            comment_id = comment.comment_id,
            offset = comment.offset,
            depth = path.len(),
            "stored comment"
        );

        path.push(PathEntry {
            id,
            offset: comment.offset,
        });
        summary.stored += 1;
    }

    Ok(summary)
}

// One transaction per article
pub fn store_thread<R: Row>(
    conn: &mut Connection,
    article: &Article,
    rows: &[R],
    layout: &Layout,
) -> Result<ThreadSummary> {
    let tx = conn.transaction()?;
    let summary = reconstruct(&*tx, article, rows, layout)?;
    tx.commit()?;

    info!(
        article = %article.comments_link,
        stored = summary.stored,
        skipped = summary.skipped,
        edges = summary.edges,
        "stored comment thread"
    );

    Ok(summary)
}
