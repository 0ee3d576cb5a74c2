//! Text helpers shared by the HTML and JSON parsers.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

/// Trim and collapse every whitespace run to a single space.
pub fn norm_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lenient integer coercion for values scraped from JSON or attributes.
pub fn safe_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

pub fn parse_int(s: &str) -> Option<i64> {
    s.trim().parse().ok()
}

/// JSON truthiness: non-empty strings and collections, non-zero numbers, `true`.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn card_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/cards/(\d+)").expect("static regex"))
}

fn user_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/users/(\d+)").expect("static regex"))
}

fn page_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]page=(\d+)").expect("static regex"))
}

/// Card design id from a link like `/cards/123/users`.
pub fn extract_card_id_from_href(href: &str) -> Option<i64> {
    card_href_re()
        .captures(href)
        .and_then(|cap| parse_int(&cap[1]))
}

/// User id from a link like `/users/77`.
pub fn extract_user_id_from_href(href: &str) -> Option<i64> {
    user_href_re()
        .captures(href)
        .and_then(|cap| parse_int(&cap[1]))
}

/// Append or extend the query string with `page=N`.
pub fn with_page(url: &str, page: u32) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}page={}", url, sep, page)
}

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Highest page number advertised by a `ul.pagination` block, or 1.
pub fn extract_last_page_number(doc: &Html) -> u32 {
    let from_links = selector("ul.pagination a[href]")
        .map(|sel| {
            doc.select(&sel)
                .filter_map(|a| a.value().attr("href"))
                .filter_map(|href| page_param_re().captures(href))
                .filter_map(|cap| cap[1].parse::<u32>().ok())
                .max()
        })
        .unwrap_or(None);
    if let Some(last) = from_links {
        return last;
    }

    selector("ul.pagination li")
        .and_then(|sel| {
            doc.select(&sel)
                .filter_map(|li| {
                    let text: String = li.text().collect();
                    text.trim().parse::<u32>().ok()
                })
                .max()
        })
        .unwrap_or(1)
}
