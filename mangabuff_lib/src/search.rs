//! Locating a partner's tradeable copy of a card.
//!
//! The site offers no lookup by card id, so the search walks through
//! progressively more expensive strategies: the full-text search endpoint,
//! the paginated AJAX listing (with guessed payload shapes), and finally the
//! partner's offer page.

use std::fmt;

use mangabuff_api::{Error, Page, Reply, Session};
use serde_json::Value;

use crate::cards::{find_instance, normalize_card_entry, parse_trade_cards_html, CardEntry};
use crate::config::TradeConfig;
use crate::partner::PartnerState;
use crate::text::norm_text;

/// Role a party plays in a proposed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Creator,
    Receiver,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a payload field takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadValue {
    Rank,
    Search,
    Side,
    /// `"1"` when listing the creator's cards, `"0"` otherwise.
    CreatorFlag,
}

/// One guessed request shape for the listing endpoint.
///
/// `offset` and `limit` are appended to every rendered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadTemplate {
    pub needs_rank: bool,
    pub needs_search: bool,
    pub fields: &'static [(&'static str, PayloadValue)],
}

impl PayloadTemplate {
    const fn new(
        needs_rank: bool,
        needs_search: bool,
        fields: &'static [(&'static str, PayloadValue)],
    ) -> Self {
        Self {
            needs_rank,
            needs_search,
            fields,
        }
    }

    /// Form pairs for this shape, or `None` when a required input is missing.
    pub fn render(
        &self,
        side: Side,
        rank: Option<&str>,
        search: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Option<Vec<(String, String)>> {
        if (self.needs_rank && rank.is_none()) || (self.needs_search && search.is_none()) {
            return None;
        }
        let mut form = Vec::with_capacity(self.fields.len() + 2);
        for (name, value) in self.fields {
            let value = match value {
                PayloadValue::Rank => rank?.to_string(),
                PayloadValue::Search => search?.to_string(),
                PayloadValue::Side => side.as_str().to_string(),
                PayloadValue::CreatorFlag => {
                    let flag = if side == Side::Creator { "1" } else { "0" };
                    flag.to_string()
                }
            };
            form.push((name.to_string(), value));
        }
        form.push(("offset".to_string(), offset.to_string()));
        form.push(("limit".to_string(), limit.to_string()));
        Some(form)
    }
}

use PayloadValue::{CreatorFlag, Rank, Search, Side as SideValue};

/// Payload shapes the listing endpoint has been seen to accept, most specific first.
pub const DEFAULT_PAYLOADS: &[PayloadTemplate] = &[
    PayloadTemplate::new(true, true, &[("rank", Rank), ("search", Search), ("side", SideValue)]),
    PayloadTemplate::new(true, true, &[("rank", Rank), ("search", Search), ("tab", SideValue)]),
    PayloadTemplate::new(true, true, &[("tab", SideValue), ("rank", Rank), ("q", Search)]),
    PayloadTemplate::new(true, true, &[("search", Search), ("rank", Rank)]),
    PayloadTemplate::new(true, false, &[("rank", Rank), ("side", SideValue)]),
    PayloadTemplate::new(true, false, &[("data-rank", Rank), ("tab", SideValue)]),
    PayloadTemplate::new(false, true, &[("search", Search)]),
    PayloadTemplate::new(false, true, &[("q", Search)]),
    PayloadTemplate::new(false, false, &[("side", SideValue)]),
    PayloadTemplate::new(false, false, &[("owner", SideValue)]),
    PayloadTemplate::new(false, false, &[("inventory", SideValue)]),
    PayloadTemplate::new(false, false, &[("tab", SideValue)]),
    PayloadTemplate::new(false, false, &[("from", SideValue)]),
    PayloadTemplate::new(false, false, &[("isCreator", CreatorFlag)]),
    PayloadTemplate::new(false, false, &[]),
];

/// Card lookups against one session, sharing limits from [`TradeConfig`].
pub struct CardSearch<'a> {
    session: &'a Session,
    config: &'a TradeConfig,
}

impl<'a> CardSearch<'a> {
    pub fn new(session: &'a Session, config: &'a TradeConfig) -> Self {
        Self { session, config }
    }

    /// Instance id of the partner's copy of `card_id`, if one can be found.
    ///
    /// Tries search by name (with and without rank), then the paginated
    /// listing, then the offer page; the first match wins.
    pub async fn find_partner_card_instance(
        &self,
        state: &mut PartnerState,
        partner_id: i64,
        side: Side,
        card_id: i64,
        rank: &str,
        name: &str,
    ) -> Option<i64> {
        let rank = Some(rank.trim()).filter(|r| !r.is_empty());
        let name = norm_text(name);
        let searchable = name.chars().count() > 2;

        if searchable {
            let cards = self
                .load_trade_cards(state, partner_id, side, rank, Some(name.as_str()), 0)
                .await;
            if let Some(found) = find_instance(&cards, card_id) {
                tracing::debug!("partner {}: found {} via search", partner_id, found);
                return Some(found);
            }

            let cards = self
                .load_trade_cards(state, partner_id, side, None, Some(name.as_str()), 0)
                .await;
            if let Some(found) = find_instance(&cards, card_id) {
                tracing::debug!("partner {}: found {} via unranked search", partner_id, found);
                return Some(found);
            }
        }

        let mut offset = 0;
        let mut scanned = 0;
        for page in 0..self.config.max_pages {
            let cards = self
                .load_trade_cards(state, partner_id, side, rank, None, offset)
                .await;
            if cards.is_empty() {
                break;
            }
            if let Some(found) = find_instance(&cards, card_id) {
                tracing::debug!("partner {}: found {} on listing page {}", partner_id, found, page);
                return Some(found);
            }
            scanned += cards.len();
            if cards.len() < self.config.page_size {
                break;
            }
            offset += cards.len();
            pause(self.config.page_delay).await;
            if scanned > self.config.max_scanned {
                tracing::debug!("partner {}: scan ceiling reached after {} cards", partner_id, scanned);
                break;
            }
        }

        let cards = self.scrape_offer_page(state, partner_id).await;
        let found = find_instance(&cards, card_id);
        if found.is_some() {
            tracing::debug!("partner {}: found {:?} on offer page", partner_id, found);
        }
        found
    }

    /// One listing page: the search endpoint first when a query is given,
    /// then the AJAX listing.
    pub async fn load_trade_cards(
        &self,
        state: &mut PartnerState,
        partner_id: i64,
        side: Side,
        rank: Option<&str>,
        search: Option<&str>,
        offset: usize,
    ) -> Vec<CardEntry> {
        if let Some(q) = search {
            let found = self.attempt_search(state, partner_id, offset, q).await;
            if !found.is_empty() {
                return found;
            }
        }
        self.attempt_ajax(state, partner_id, side, rank, search, offset)
            .await
    }

    async fn attempt_search(
        &self,
        state: &mut PartnerState,
        partner_id: i64,
        offset: usize,
        q: &str,
    ) -> Vec<CardEntry> {
        if norm_text(q).chars().count() <= 2 {
            return Vec::new();
        }
        let params = [
            ("user_id", partner_id.to_string()),
            ("offset", offset.to_string()),
            ("q", q.to_string()),
        ];
        let result = self.session.get_query("/search/cards", &params).await;
        let Some(page) = read_partner_page(state, partner_id, result).await else {
            return Vec::new();
        };
        if self.listing_too_large(state, partner_id, page.json.as_ref()) {
            return Vec::new();
        }

        if let Some(obj) = page.json.as_ref().and_then(Value::as_object) {
            let html = ["content", "html", "view"]
                .iter()
                .filter_map(|k| obj.get(*k))
                .find(|v| crate::text::truthy(v));
            if let Some(Value::String(html)) = html {
                return parse_trade_cards_html(html);
            }
            if let Some(Value::Array(cards)) = obj.get("cards") {
                return cards.iter().map(normalize_card_entry).collect();
            }
        }
        parse_trade_cards_html(&page.text)
    }

    async fn attempt_ajax(
        &self,
        state: &mut PartnerState,
        partner_id: i64,
        side: Side,
        rank: Option<&str>,
        search: Option<&str>,
        offset: usize,
    ) -> Vec<CardEntry> {
        if state.is_blocked(partner_id) {
            tracing::debug!("partner {} is blocked, skipping listing", partner_id);
            return Vec::new();
        }

        let url = format!("/trades/{}/availableCardsLoad", partner_id);
        let referer = self.session.url(&format!("/trades/offers/{}", partner_id));
        let headers = self.session.ajax_headers(&referer);

        for template in &self.config.payloads {
            if state.is_blocked(partner_id) {
                break;
            }
            let Some(form) = template.render(side, rank, search, offset, self.config.page_size)
            else {
                continue;
            };
            let result = self.session.post_form(&url, &headers, &form, true).await;
            let Some(page) = read_partner_page(state, partner_id, result).await else {
                continue;
            };

            if let Some(obj) = page.json.as_ref().and_then(Value::as_object) {
                match obj.get("cards") {
                    Some(Value::Array(cards)) => {
                        if cards.len() > self.config.huge_list_threshold {
                            tracing::warn!(
                                "partner {} listed {} cards, blocking",
                                partner_id,
                                cards.len()
                            );
                            state.block(partner_id);
                            return Vec::new();
                        }
                        return cards.iter().map(normalize_card_entry).collect();
                    }
                    Some(Value::String(html)) => {
                        let parsed = parse_trade_cards_html(html);
                        if !parsed.is_empty() {
                            return parsed;
                        }
                    }
                    _ => {}
                }
                for key in ["html", "view", "content"] {
                    if let Some(Value::String(html)) = obj.get(key) {
                        let parsed = parse_trade_cards_html(html);
                        if !parsed.is_empty() {
                            return parsed;
                        }
                    }
                }
            }

            let parsed = parse_trade_cards_html(&page.text);
            if !parsed.is_empty() {
                return parsed;
            }
            tracing::debug!("partner {}: payload {:?} gave nothing", partner_id, form);
        }
        Vec::new()
    }

    async fn scrape_offer_page(&self, state: &mut PartnerState, partner_id: i64) -> Vec<CardEntry> {
        let result = self
            .session
            .get(&format!("/trades/offers/{}", partner_id))
            .await;
        match read_partner_page(state, partner_id, result).await {
            Some(page) => parse_trade_cards_html(&page.text),
            None => Vec::new(),
        }
    }

    fn listing_too_large(&self, state: &mut PartnerState, partner_id: i64, json: Option<&Value>) -> bool {
        let listed = json
            .and_then(|j| j.get("cards"))
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        if listed > self.config.huge_list_threshold {
            tracing::warn!("partner {} listed {} cards, blocking", partner_id, listed);
            state.block(partner_id);
            return true;
        }
        false
    }
}

/// Read a partner response, recording timeouts, oversized bodies and successes.
///
/// Returns `None` for anything other than a readable 200.
async fn read_partner_page(
    state: &mut PartnerState,
    partner_id: i64,
    result: Result<Reply, Error>,
) -> Option<Page> {
    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            note_failure(state, partner_id, &e);
            return None;
        }
    };
    if reply.status() != 200 {
        tracing::debug!("partner {}: status {}", partner_id, reply.status());
        return None;
    }
    match reply.into_page().await {
        Ok(page) => {
            state.clear_timeout(partner_id);
            Some(page)
        }
        Err(e) => {
            note_failure(state, partner_id, &e);
            None
        }
    }
}

fn note_failure(state: &mut PartnerState, partner_id: i64, err: &Error) {
    match err {
        Error::Timeout => state.mark_timeout(partner_id),
        Error::TooBig { limit } => {
            tracing::warn!("partner {} sent more than {} bytes, blocking", partner_id, limit);
            state.block(partner_id);
        }
        other => tracing::debug!("partner {}: {}", partner_id, other),
    }
}

pub(crate) async fn pause(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
