use anyhow::Result;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::CrawlError;

// Front page table rows
const MAIN_TABLE: &str = "#hnmain tr table tr";
const SPACER: &str = "spacer";
const TITLE_ROW: &str = "athing";

/// Role of a table row in the site's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Spacer,
    Title,
    Comment,
    Subtext,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub href: Option<String>,
}

/// Read access to one row of a fetched page.
///
/// Assembly and thread reconstruction only go through this trait, never
/// through the markup itself.
pub trait Row {
    fn kind(&self) -> RowKind;

    /// Text of every element matching `selector`, concatenated.
    fn text(&self, selector: &Selector) -> String;

    /// Attribute `name` of the first element matching `selector`.
    fn attr(&self, selector: &Selector, name: &str) -> Option<String>;

    /// Every element matching `selector`, as text plus href.
    fn links(&self, selector: &Selector) -> Vec<Link>;

    /// Inner HTML of the first element matching `selector`, with any
    /// descendants matching `strip` cut out.
    fn html_without(&self, selector: &Selector, strip: &Selector) -> Option<String>;
}

/// Selectors and patterns describing the site's row layout, parsed once at startup.
pub struct Layout {
    main_table: Selector,
    subtext: Selector,
    pub rank: Selector,
    pub title_link: Selector,
    pub score: Selector,
    pub subtext_link: Selector,
    pub indent: Selector,
    pub comment_head_link: Selector,
    pub comment: Selector,
    pub comment_font: Selector,
    pub reply: Selector,
    number: Regex,
}

impl Layout {
    pub fn new() -> Result<Self> {
        Ok(Self {
            main_table: parse_selector(MAIN_TABLE)?,
            subtext: parse_selector("td.subtext")?,
            rank: parse_selector("span.rank")?,
            title_link: parse_selector(".title a")?,
            score: parse_selector("span.score")?,
            subtext_link: parse_selector("td.subtext a")?,
            indent: parse_selector("td.ind img")?,
            comment_head_link: parse_selector("span.comhead a")?,
            comment: parse_selector("span.comment")?,
            comment_font: parse_selector("span.comment font")?,
            reply: parse_selector(".reply")?,
            number: Regex::new(r"[0-9]+")?,
        })
    }

    /// First run of digits in `text`, or 0 when there is none.
    pub fn number_in(&self, text: &str) -> i64 {
        self.number
            .find(text)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0)
    }

    fn classify(&self, element: ElementRef) -> RowKind {
        let has_class = |name: &str| element.value().classes().any(|c| c == name);
        let tagged = element.value().classes().next().is_some();

        if has_class(SPACER) {
            RowKind::Spacer
        } else if element.select(&self.comment).next().is_some() {
            RowKind::Comment
        } else if has_class(TITLE_ROW) {
            RowKind::Title
        } else if !tagged && element.select(&self.subtext).next().is_some() {
            RowKind::Subtext
        } else {
            RowKind::Other
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector).map_err(|e| CrawlError::Selector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}

/// A `<tr>` of a parsed document.
pub struct HtmlRow<'a> {
    element: ElementRef<'a>,
    kind: RowKind,
}

impl Row for HtmlRow<'_> {
    fn kind(&self) -> RowKind {
        self.kind
    }

    fn text(&self, selector: &Selector) -> String {
        self.element.select(selector).flat_map(|e| e.text()).collect()
    }

    fn attr(&self, selector: &Selector, name: &str) -> Option<String> {
        self.element
            .select(selector)
            .next()?
            .value()
            .attr(name)
            .map(str::to_owned)
    }

    fn links(&self, selector: &Selector) -> Vec<Link> {
        self.element
            .select(selector)
            .map(|a| Link {
                text: a.text().collect(),
                href: a.value().attr("href").map(str::to_owned),
            })
            .collect()
    }

    fn html_without(&self, selector: &Selector, strip: &Selector) -> Option<String> {
        let element = self.element.select(selector).next()?;
        let mut html = element.inner_html();
        for chrome in element.select(strip) {
            html = html.replacen(&chrome.html(), "", 1);
        }
        Some(html.trim().to_string())
    }
}

/// Rows of the front page article table, in document order.
pub fn front_page_rows<'a>(document: &'a Html, layout: &Layout) -> Vec<HtmlRow<'a>> {
    document
        .select(&layout.main_table)
        .map(|element| HtmlRow {
            kind: layout.classify(element),
            element,
        })
        .collect()
}

/// One row per comment on an item page, in the order the site emits them.
///
/// The row is the nearest `<tr>` enclosing the comment body, which also holds
/// the indentation cell and the comment head.
pub fn comment_rows<'a>(document: &'a Html, layout: &Layout) -> Vec<HtmlRow<'a>> {
    document
        .select(&layout.comment)
        .filter_map(|body| {
            let row = body
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "tr");
            if row.is_none() {
                debug!("comment body outside of a table row");
            }
            row
        })
        .map(|element| HtmlRow {
            element,
            kind: RowKind::Comment,
        })
        .collect()
}
