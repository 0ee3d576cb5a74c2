//! Batch dispatch: offer one of our copies to every online owner of the
//! target card who turns out to have a tradeable instance.

use mangabuff_api::Session;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cards::CardEntry;
use crate::config::TradeConfig;
use crate::owners::OwnerPageSource;
use crate::partner::PartnerState;
use crate::search::{pause, CardSearch, Side};
use crate::trade::TradeSubmitter;

/// The card we want from other owners. Fixed for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCard {
    pub card_id: i64,
    pub name: String,
    pub rank: String,
}

/// Counters accumulated over one run. They only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub checked_pages: u64,
    pub owners_seen: u64,
    pub trades_attempted: u64,
    pub trades_succeeded: u64,
    pub skipped_no_my_cards: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Resolve and log offers without submitting them.
    pub dry_run: bool,
    /// Try the create-trade endpoint before the offer form.
    pub use_api: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            use_api: true,
        }
    }
}

/// Our instance ids to offer: same rank as the target, else any.
pub fn select_my_instances(my_cards: &[CardEntry], rank: &str) -> Vec<i64> {
    let rank = rank.trim();
    if !rank.is_empty() {
        let ranked: Vec<i64> = my_cards
            .iter()
            .filter(|c| c.rank.trim() == rank)
            .filter_map(|c| c.instance_id)
            .collect();
        if !ranked.is_empty() {
            return ranked;
        }
    }
    my_cards.iter().filter_map(|c| c.instance_id).collect()
}

/// Walk the owner pages and send (or log) one offer per matching owner.
///
/// Partner failures are absorbed; only having no cards of our own to offer
/// ends the run early.
pub async fn send_trades_to_owners<S>(
    session: &Session,
    config: &TradeConfig,
    operator_id: Option<i64>,
    target: &TargetCard,
    owner_pages: &mut S,
    my_cards: &[CardEntry],
    options: DispatchOptions,
) -> RunStats
where
    S: OwnerPageSource + ?Sized,
{
    let mut stats = RunStats::default();
    let my_instances = select_my_instances(my_cards, &target.rank);
    if my_instances.is_empty() {
        tracing::warn!("no cards of our own to offer");
        stats.skipped_no_my_cards = 1;
        return stats;
    }

    let mut state = PartnerState::new(config.partner_timeout_limit);
    let search = CardSearch::new(session, config);
    let submitter = TradeSubmitter::new(session);

    while let Some(page) = owner_pages.next_page().await {
        stats.checked_pages += 1;
        for owner_id in page.owner_ids {
            stats.owners_seen += 1;
            if Some(owner_id) == operator_id {
                continue;
            }
            let Some(his_instance) = search
                .find_partner_card_instance(
                    &mut state,
                    owner_id,
                    Side::Receiver,
                    target.card_id,
                    &target.rank,
                    &target.name,
                )
                .await
            else {
                continue;
            };

            let Some(&my_instance) = my_instances.choose(&mut rand::thread_rng()) else {
                continue;
            };
            stats.trades_attempted += 1;
            if options.dry_run {
                tracing::info!("[DRY] {} -> {} for owner {}", my_instance, his_instance, owner_id);
                continue;
            }

            if submitter
                .submit(owner_id, my_instance, his_instance, options.use_api)
                .await
            {
                stats.trades_succeeded += 1;
                tracing::info!("offer sent to {}: {} -> {}", owner_id, my_instance, his_instance);
            } else {
                tracing::warn!("offer to {} was not confirmed", owner_id);
            }

            let delay = if config.trade_delay_max > config.trade_delay_min {
                rand::thread_rng().gen_range(config.trade_delay_min..=config.trade_delay_max)
            } else {
                config.trade_delay_min
            };
            pause(delay).await;
        }
    }

    tracing::info!(
        "run finished: {} pages, {} owners, {}/{} offers confirmed",
        stats.checked_pages,
        stats.owners_seen,
        stats.trades_succeeded,
        stats.trades_attempted
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(instance: i64, rank: &str) -> CardEntry {
        CardEntry {
            instance_id: Some(instance),
            card_id: Some(1),
            rank: rank.to_string(),
            ..CardEntry::default()
        }
    }

    #[test]
    fn ranked_instances_preferred() {
        let cards = vec![card(1, "A"), card(2, "B"), card(3, " A ")];
        assert_eq!(select_my_instances(&cards, "A"), vec![1, 3]);
    }

    #[test]
    fn falls_back_to_any_rank() {
        let cards = vec![card(1, "B"), CardEntry::default(), card(2, "C")];
        assert_eq!(select_my_instances(&cards, "A"), vec![1, 2]);
        assert_eq!(select_my_instances(&cards, ""), vec![1, 2]);
    }

    #[test]
    fn stats_serialize_with_field_names() {
        let stats = RunStats {
            checked_pages: 1,
            owners_seen: 2,
            trades_attempted: 1,
            ..RunStats::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["owners_seen"], 2);
        assert_eq!(json["skipped_no_my_cards"], 0);
    }
}
