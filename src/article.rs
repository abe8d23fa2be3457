use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::db;
use crate::rows::{Layout, Row, RowKind};

/// A ranked article from one front page snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: i64,
    pub snapshot_id: i64,
    pub rank: i64,
    pub link: String,
    pub title: String,
    pub score: i64,
    pub username: String,
    pub comment_count: i64,
    pub comments_link: String,
}

// Article being accumulated between spacer rows
struct Draft {
    article: Article,
    complete: bool,
}

impl Draft {
    fn from_title_row(row: &impl Row, layout: &Layout, snapshot_id: i64) -> Self {
        let article = Article {
            snapshot_id,
            rank: layout.number_in(&row.text(&layout.rank)),
            link: row.attr(&layout.title_link, "href").unwrap_or_default(),
            title: row
                .links(&layout.title_link)
                .into_iter()
                .next()
                .map(|l| l.text)
                .unwrap_or_default(),
            ..Article::default()
        };

        Self {
            article,
            complete: false,
        }
    }

    // Score, submitter and comments link. Without any links the article stays incomplete.
    fn read_subtext_row(&mut self, row: &impl Row, layout: &Layout) {
        let links = row.links(&layout.subtext_link);
        let (Some(user), Some(comments)) = (links.first(), links.last()) else {
            return;
        };

        self.article.score = layout.number_in(&row.text(&layout.score));
        self.article.username = user.text.clone();
        self.article.comments_link = comments.href.clone().unwrap_or_default();
        self.article.comment_count = layout.number_in(&comments.text);
        self.complete = true;
    }
}

/// Partition front page rows into articles, persisting each complete one
/// under `snapshot_id`. Returns the stored articles in page order.
pub fn assemble<R: Row>(
    conn: &Connection,
    snapshot_id: i64,
    rows: &[R],
    layout: &Layout,
) -> Result<Vec<Article>> {
    let mut articles = Vec::new();
    let mut draft: Option<Draft> = None;

    for row in rows {
        match row.kind() {
            // Articles are separated by empty rows classed "spacer"
            RowKind::Spacer => flush(conn, draft.take(), &mut articles)?,
            RowKind::Title => {
                flush(conn, draft.take(), &mut articles)?;
                draft = Some(Draft::from_title_row(row, layout, snapshot_id));
            }
            RowKind::Subtext => match draft.as_mut() {
                Some(d) => d.read_subtext_row(row, layout),
                None => debug!("subtext row without a title row"),
            },
            RowKind::Comment | RowKind::Other => {}
        }
    }

    flush(conn, draft.take(), &mut articles)?;

    Ok(articles)
}

fn flush(conn: &Connection, draft: Option<Draft>, articles: &mut Vec<Article>) -> Result<()> {
    let Some(Draft { mut article, complete }) = draft else {
        return Ok(());
    };

    if !complete {
        info!(
            rank = article.rank,
            title = %article.title,
            "dropping incomplete article"
        );
        return Ok(());
    }

    article.id = db::insert_article(conn, &article)?;
    debug!(rank = article.rank, link = %article.link, "stored article");
    articles.push(article);

    Ok(())
}
