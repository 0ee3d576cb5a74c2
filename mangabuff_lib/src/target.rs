//! Target card loading from saved card files.

use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use serde_json::Value;

use crate::dispatch::TargetCard;
use crate::error::MangaBuffError;
use crate::text::{extract_card_id_from_href, safe_int};

const CARD_KEYS: &[&str] = &["card_id", "card", "id", "name", "rank"];

/// Newest `card_*_from_*.json` in `dir`, as written by the boost lookup.
pub fn latest_card_file(dir: &Path) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            name.starts_with("card_") && name.contains("_from_") && name.ends_with(".json")
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

/// Read a card file: one card object, a list of cards, or an object holding
/// such a list. A list yields one of its cards at random.
pub fn load_target_card(path: &Path) -> Result<TargetCard, MangaBuffError> {
    let raw = fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&raw)?;
    let chosen = choose_card(&data).ok_or_else(|| {
        MangaBuffError::InvalidInput(format!("no card in {}", path.display()))
    })?;
    target_from_value(chosen).ok_or_else(|| {
        MangaBuffError::InvalidInput(format!("card in {} has no card id", path.display()))
    })
}

fn choose_card(data: &Value) -> Option<&Value> {
    match data {
        Value::Object(obj) => {
            let has_list = obj.values().any(Value::is_array);
            if !has_list && CARD_KEYS.iter().any(|k| obj.contains_key(*k)) {
                return Some(data);
            }
            let candidates = match obj.get("cards") {
                Some(Value::Array(cards)) => cards,
                _ => obj.values().find_map(Value::as_array)?,
            };
            candidates.choose(&mut rand::thread_rng())
        }
        Value::Array(cards) => cards.choose(&mut rand::thread_rng()),
        _ => None,
    }
}

/// Card id, name and rank from one loosely shaped card record.
pub fn target_from_value(card: &Value) -> Option<TargetCard> {
    let obj = card.as_object()?;
    let block = obj.get("card").and_then(Value::as_object);

    let card_id = ["card_id", "cardId", "id"]
        .iter()
        .find_map(|k| obj.get(*k))
        .and_then(safe_int)
        .or_else(|| block.and_then(|b| b.get("id")).and_then(safe_int))
        .filter(|id| *id != 0)
        .or_else(|| {
            ["href", "link", "url", "permalink"]
                .iter()
                .filter_map(|k| obj.get(*k).and_then(Value::as_str))
                .find_map(extract_card_id_from_href)
        })?;

    let text = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let name = text(obj.get("name"))
        .or_else(|| text(block.and_then(|b| b.get("name"))))
        .or_else(|| text(obj.get("title")))
        .unwrap_or_default();
    let rank = text(obj.get("rank"))
        .or_else(|| text(block.and_then(|b| b.get("rank"))))
        .unwrap_or_default();

    Some(TargetCard { card_id, name, rank })
}
