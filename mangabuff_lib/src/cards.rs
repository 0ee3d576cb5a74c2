//! Canonical card entries and the parsers that produce them from HTML
//! fragments and loosely shaped JSON records.

use std::collections::HashSet;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::text::{extract_card_id_from_href, norm_text, safe_int, selector};

const INSTANCE_KEYS: &[&str] = &[
    "id",
    "instance",
    "instance_id",
    "instanceId",
    "card_instance_id",
    "key",
    "data-id",
];
const CARD_ID_KEYS: &[&str] = &["card_id", "cardId", "card-id"];
const RANK_KEYS: &[&str] = &["rank", "grade", "data-rank"];
const TITLE_KEYS: &[&str] = &["title", "name", "card_name"];
const HREF_KEYS: &[&str] = &["href", "url", "link", "permalink", "card_url", "path"];

/// One owned copy of a card as listed by the site.
///
/// Useless for trading unless `instance_id` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEntry {
    #[serde(rename = "id", default)]
    pub instance_id: Option<i64>,
    #[serde(default)]
    pub card_id: Option<i64>,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub href: String,
}

impl CardEntry {
    /// Whether this entry is a tradeable copy of `card_id`.
    pub fn matches(&self, card_id: i64) -> Option<i64> {
        if self.card_id == Some(card_id) {
            self.instance_id
        } else {
            None
        }
    }
}

/// First instance id in `entries` whose card id equals `card_id`.
pub fn find_instance(entries: &[CardEntry], card_id: i64) -> Option<i64> {
    entries.iter().find_map(|entry| entry.matches(card_id))
}

fn nonzero(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

fn first_int(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| nonzero(safe_int(v)))
}

fn first_string(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Canonicalize a JSON card record whose key names vary between endpoints.
pub fn normalize_card_entry(record: &Value) -> CardEntry {
    let Some(obj) = record.as_object() else {
        return CardEntry::default();
    };
    let nested = obj.get("card").and_then(Value::as_object);

    let instance_id = first_int(obj, INSTANCE_KEYS)
        .or_else(|| {
            obj.get("id")
                .and_then(Value::as_object)
                .and_then(|inner| first_int(inner, &["instance", "instance_id", "instanceId"]))
        })
        .or_else(|| nested.and_then(|card| first_int(card, &["instance", "instance_id"])));

    let href = first_string(obj, HREF_KEYS).unwrap_or_default();
    let card_id = first_int(obj, CARD_ID_KEYS)
        .or_else(|| nested.and_then(|card| first_int(card, &["id", "card_id"])))
        .or_else(|| {
            HREF_KEYS
                .iter()
                .filter_map(|k| obj.get(*k).and_then(Value::as_str))
                .find_map(extract_card_id_from_href)
        });

    let rank = first_string(obj, RANK_KEYS)
        .or_else(|| nested.and_then(|card| first_string(card, RANK_KEYS)))
        .unwrap_or_default();
    let title = first_string(obj, TITLE_KEYS)
        .or_else(|| nested.and_then(|card| first_string(card, TITLE_KEYS)))
        .unwrap_or_default();

    CardEntry {
        instance_id,
        card_id,
        rank,
        title,
        href,
    }
}

fn attr_any<'a>(el: &ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| el.value().attr(name))
        .find(|v| !v.trim().is_empty())
}

fn parent_element<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.parent().and_then(ElementRef::wrap)
}

fn first_card_link<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    ["a[href*=\"/cards/\"]", "[data-href*=\"/cards/\"]"]
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| el.select(&sel).next())
        .and_then(|link| attr_any(&link, &["href", "data-href"]))
}

fn title_of(el: &ElementRef<'_>) -> String {
    let Some(sel) = selector(".card__title, .card-title, [class*='title'], img[alt]") else {
        return String::new();
    };
    match el.select(&sel).next() {
        Some(t) if t.value().name() == "img" => t.value().attr("alt").unwrap_or("").to_string(),
        Some(t) => norm_text(&t.text().collect::<Vec<_>>().join(" ")),
        None => String::new(),
    }
}

/// Extract card entries from an inventory or offer-page HTML fragment.
pub fn parse_trade_cards_html(html: &str) -> Vec<CardEntry> {
    let doc = Html::parse_document(html);
    let mut items = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    if let Some(candidates) = selector("[data-id], [data-card-id], .card, [class*=\"card\"], img") {
        for el in doc.select(&candidates) {
            let mut inst = attr_any(
                &el,
                &["data-id", "data-instance-id", "data-instance", "data-item-id"],
            );
            if inst.is_none() && el.value().name() == "img" {
                inst = parent_element(&el).and_then(|p| attr_any(&p, &["data-id", "data-instance-id"]));
            }

            let href = first_card_link(&el).unwrap_or("");
            let card_id = attr_any(&el, &["data-card-id", "data-cardid"])
                .and_then(crate::text::parse_int)
                .or_else(|| extract_card_id_from_href(href));
            let rank = attr_any(&el, &["data-rank", "data-grade"]).unwrap_or("");
            let title = title_of(&el);

            let key = inst
                .map(str::to_string)
                .or_else(|| card_id.map(|c| c.to_string()))
                .or_else(|| (!href.is_empty()).then(|| href.to_string()))
                .or_else(|| (!title.is_empty()).then(|| title.clone()));
            let Some(key) = key else {
                continue;
            };
            if !seen.insert(key) {
                continue;
            }

            items.push(CardEntry {
                instance_id: nonzero(inst.and_then(crate::text::parse_int)),
                card_id,
                rank: rank.trim().to_string(),
                title,
                href: href.to_string(),
            });
        }
    }

    if items.is_empty() {
        if let (Some(imgs), Some(link_sel)) = (
            selector("img[alt]"),
            selector("a[href*=\"/cards/\"]"),
        ) {
            for img in doc.select(&imgs) {
                let parent = parent_element(&img);
                let inst = parent.as_ref().and_then(|p| p.value().attr("data-id"));
                let href = parent
                    .as_ref()
                    .and_then(|p| p.select(&link_sel).next())
                    .and_then(|a| a.value().attr("href"))
                    .unwrap_or("");
                items.push(CardEntry {
                    instance_id: nonzero(inst.and_then(crate::text::parse_int)),
                    card_id: extract_card_id_from_href(href),
                    rank: String::new(),
                    title: img.value().attr("alt").unwrap_or("").to_string(),
                    href: href.to_string(),
                });
            }
        }
    }

    items
}
