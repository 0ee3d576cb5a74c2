//! Download of a user's full tradeable inventory.

use mangabuff_api::Session;
use serde_json::Value;

use crate::cards::{normalize_card_entry, parse_trade_cards_html, CardEntry};
use crate::config::TradeConfig;
use crate::search::pause;

/// Every card `user_id` can trade, page by page through the listing endpoint.
///
/// Any transport error or non-200 ends the walk with what was collected.
pub async fn fetch_all_cards(session: &Session, user_id: i64, config: &TradeConfig) -> Vec<CardEntry> {
    let url = format!("/trades/{}/availableCardsLoad", user_id);
    let headers = session.ajax_headers(&session.url(&format!("/trades/{}", user_id)));
    let mut all = Vec::new();
    let mut offset = 0;

    for page in 1..=config.inventory_max_pages {
        let form = vec![("offset".to_string(), offset.to_string())];
        let reply = match session.post_form(&url, &headers, &form, true).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!("inventory of {} at offset {}: {}", user_id, offset, e);
                break;
            }
        };
        if reply.status() != 200 {
            tracing::debug!("inventory of {}: status {}", user_id, reply.status());
            break;
        }
        let body = match reply.into_page().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("inventory of {}: {}", user_id, e);
                break;
            }
        };

        let received = match body.json.as_ref().and_then(|j| j.get("cards")) {
            Some(Value::Array(cards)) if cards.len() > config.huge_list_threshold => {
                tracing::warn!("inventory of {} lists {} cards at once, stopping", user_id, cards.len());
                break;
            }
            Some(Value::Array(cards)) => {
                all.extend(cards.iter().map(normalize_card_entry));
                cards.len()
            }
            Some(Value::String(html)) => {
                let parsed = parse_trade_cards_html(html);
                let n = parsed.len();
                all.extend(parsed);
                n
            }
            Some(_) => 0,
            None if body.json.is_some() => 0,
            None => {
                let parsed = parse_trade_cards_html(&body.text);
                let n = parsed.len();
                all.extend(parsed);
                n
            }
        };
        if received == 0 {
            break;
        }
        tracing::debug!("inventory of {}: page {} gave {} cards", user_id, page, received);

        offset += received;
        if received < config.page_size {
            break;
        }
        pause(config.inventory_page_delay).await;
    }

    tracing::info!("inventory of {}: {} cards", user_id, all.len());
    all
}
