//! Club helpers: the card the club is boosting and how many people own or want it.

use mangabuff_api::Session;
use scraper::Html;
use serde::Serialize;

use crate::cards::CardEntry;
use crate::config::TradeConfig;
use crate::inventory::fetch_all_cards;
use crate::text::{extract_card_id_from_href, extract_last_page_number, extract_user_id_from_href, selector, with_page};

const OWNER_SELECTORS: &[&str] = &[
    "a.card-show__owner",
    r#"a[class*="card-show__owner"]"#,
    "a.card-show_owner",
    r#"a[class*="card-show_owner"]"#,
];
const WANTER_SELECTORS: &[&str] = &[
    "a.profile__friends-item",
    r#"a[class*="profile__friends-item"]"#,
    "a.profile_friends-item",
    r#"a[class*="profile_friends-item"]"#,
];
const OWNERS_PER_PAGE: u64 = 36;
const WANTERS_PER_PAGE: u64 = 60;

/// The boosted card as found in one owner's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoostCard {
    pub card_id: i64,
    pub owner_id: i64,
    pub card: CardEntry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CardDemand {
    pub owners: u64,
    pub wanters: u64,
}

async fn fetch_html(session: &Session, url: &str) -> Option<String> {
    let reply = session.get(url).await.ok()?;
    if reply.status() != 200 {
        tracing::debug!("{}: status {}", url, reply.status());
        return None;
    }
    reply.into_page().await.ok().map(|p| p.text)
}

/// Follow the club boost page to the card, then to its most recent owner,
/// and return that owner's copy of it.
pub async fn find_boost_card(session: &Session, boost_url: &str, config: &TradeConfig) -> Option<BoostCard> {
    let html = fetch_html(session, boost_url).await?;
    let card_href = {
        let doc = Html::parse_document(&html);
        let sel = selector(r#"a.button.button--block[href*="/cards/"]"#)?;
        let href = doc.select(&sel).next()?.value().attr("href")?;
        href.to_string()
    };
    let card_id = extract_card_id_from_href(&card_href)?;

    let users_html = fetch_html(session, &card_href).await?;
    let owner_id = {
        let doc = Html::parse_document(&users_html);
        let sel = selector("a[href]")?;
        doc.select(&sel)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| href.starts_with("/users/"))
            .last()
            .and_then(|href| extract_user_id_from_href(href.trim_end_matches('/')))?
    };
    tracing::debug!("boost card {}: checking owner {}", card_id, owner_id);

    let cards = fetch_all_cards(session, owner_id, config).await;
    let card = cards.into_iter().find(|c| c.card_id == Some(card_id))?;
    Some(BoostCard {
        card_id,
        owner_id,
        card,
    })
}

fn count_matches(doc: &Html, selectors: &[&str]) -> u64 {
    let mut seen = std::collections::HashSet::new();
    for sel in selectors.iter().filter_map(|css| selector(css)) {
        for el in doc.select(&sel) {
            seen.insert(el.id());
        }
    }
    seen.len() as u64
}

/// Total listing size from the first and last pages only.
pub async fn count_by_last_page(session: &Session, url: &str, selectors: &[&str], per_page: u64) -> u64 {
    let Some(first) = fetch_html(session, &with_page(url, 1)).await else {
        return 0;
    };
    let (first_count, last_page) = {
        let doc = Html::parse_document(&first);
        (count_matches(&doc, selectors), extract_last_page_number(&doc))
    };
    if last_page <= 1 {
        return first_count;
    }

    let full_pages = u64::from(last_page - 1) * per_page;
    match fetch_html(session, &with_page(url, last_page)).await {
        Some(last) => full_pages + count_matches(&Html::parse_document(&last), selectors),
        None => full_pages,
    }
}

/// How many users own `card_id` and how many want it.
pub async fn owners_and_wanters_counts(session: &Session, card_id: i64) -> CardDemand {
    let owners = count_by_last_page(
        session,
        &format!("/cards/{}/users", card_id),
        OWNER_SELECTORS,
        OWNERS_PER_PAGE,
    )
    .await;
    let wanters = count_by_last_page(
        session,
        &format!("/cards/{}/offers/want", card_id),
        WANTER_SELECTORS,
        WANTERS_PER_PAGE,
    )
    .await;
    CardDemand { owners, wanters }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_selectors_count_each_element_once() {
        let doc = Html::parse_document(
            r#"<a class="card-show__owner" href="/users/1"></a>
               <a class="card-show__owner card-show__owner--online" href="/users/2"></a>
               <a class="profile__friends-item" href="/users/3"></a>"#,
        );
        assert_eq!(count_matches(&doc, OWNER_SELECTORS), 2);
        assert_eq!(count_matches(&doc, WANTER_SELECTORS), 1);
    }
}
