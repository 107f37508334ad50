// src/ingest/normalize/html_page.rs
//! Headline extraction from news pages: anchors whose text mentions a keyword.

use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};

use super::NormalizeContext;
use crate::error::MalformedPayload;
use crate::ingest::types::{CanonicalRow, FieldValue, Fields, HtmlDocument, SourceKind};

fn collapse_whitespace(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(s, " ").trim().to_string()
}

/// Uppercases the first letter of every alphabetic run, lowercases the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

/// Absolute http(s) links pass through, `//host/..` takes the page scheme and
/// `/path` takes the page origin. Anything else yields `None`.
pub fn resolve_link(href: &str, page: Option<&Url>) -> Option<String> {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(href.to_string());
    }
    let page = page?;
    // Scheme-relative: the host comes from the href, not the page.
    if let Some(rest) = href.strip_prefix("//") {
        return (!rest.is_empty()).then(|| format!("{}://{}", page.scheme(), rest));
    }
    if href.starts_with('/') {
        return Some(format!("{}{}", page.origin().ascii_serialization(), href));
    }
    None
}

pub fn normalize_html(
    doc: HtmlDocument,
    ctx: &NormalizeContext<'_>,
) -> Result<Vec<CanonicalRow>, MalformedPayload> {
    let anchors = Selector::parse("a[href]")
        .map_err(|e| MalformedPayload(format!("anchor selector: {e:?}")))?;
    let page = Url::parse(&doc.page_url).ok();
    let keywords: Vec<String> = ctx
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let html = Html::parse_document(&doc.body);
    let mut rows = Vec::new();
    for a in html.select(&anchors) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let folded = collapse_whitespace(&a.text().collect::<String>()).to_lowercase();
        if folded.is_empty() || !keywords.iter().any(|k| folded.contains(k.as_str())) {
            continue;
        }
        let Some(link) = resolve_link(href, page.as_ref()) else {
            tracing::trace!(source = ctx.source_id, href, "dropping unresolvable link");
            continue;
        };

        let mut fields = Fields::new();
        fields.insert("title", FieldValue::Text(title_case(&folded)));
        fields.insert("link", FieldValue::Text(link));
        rows.push(CanonicalRow {
            kind: SourceKind::HtmlPage,
            timestamp: None,
            fields,
            source_id: ctx.source_id.to_string(),
            collected_at: ctx.collected_at,
        });
    }
    Ok(rows)
}
