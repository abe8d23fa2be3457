use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP status error: {status} {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// A comment row that can't be turned into a `Comment`.
/// The row is skipped and the scan carries on with the next one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("expected 2 links in comment head, found {0}")]
    HeadLinks(usize),

    #[error("comment permalink missing or malformed: {0:?}")]
    CommentId(Option<String>),

    #[error("comment indentation width missing or malformed")]
    MissingOffset,

    #[error("comment body not found")]
    MissingBody,
}
