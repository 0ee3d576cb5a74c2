//! Tunables for search, trading and owner discovery.

use std::time::Duration;

use crate::search::{PayloadTemplate, DEFAULT_PAYLOADS};

/// Limits and pacing for one batch run.
#[derive(Debug, Clone)]
pub struct TradeConfig {
    /// Cards requested per AJAX listing page.
    pub page_size: usize,
    /// Listing pages scanned per partner before giving up.
    pub max_pages: usize,
    /// Cards scanned per partner before giving up.
    pub max_scanned: usize,
    /// A `cards` list longer than this blocks the partner.
    pub huge_list_threshold: usize,
    /// Consecutive timeouts before a partner is blocked.
    pub partner_timeout_limit: u32,
    pub page_delay: Duration,
    pub trade_delay_min: Duration,
    pub trade_delay_max: Duration,
    pub owner_page_delay: Duration,
    pub inventory_page_delay: Duration,
    pub inventory_max_pages: usize,
    /// Payload shapes tried against the listing endpoint, in order.
    pub payloads: Vec<PayloadTemplate>,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            page_size: 60,
            max_pages: 1000,
            max_scanned: 30_000,
            huge_list_threshold: 5000,
            partner_timeout_limit: 2,
            page_delay: Duration::from_millis(180),
            trade_delay_min: Duration::from_millis(400),
            trade_delay_max: Duration::from_millis(1000),
            owner_page_delay: Duration::from_millis(200),
            inventory_page_delay: Duration::from_millis(250),
            inventory_max_pages: 500,
            payloads: DEFAULT_PAYLOADS.to_vec(),
        }
    }
}

impl TradeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            huge_list_threshold: env_usize("MANGABUFF_HUGE_LIST_THRESHOLD", defaults.huge_list_threshold),
            partner_timeout_limit: env_usize(
                "MANGABUFF_PARTNER_TIMEOUT_LIMIT",
                defaults.partner_timeout_limit as usize,
            ) as u32,
            ..defaults
        }
    }

    /// Same limits with every sleep removed. Used by tests.
    pub fn without_delays(self) -> Self {
        Self {
            page_delay: Duration::ZERO,
            trade_delay_min: Duration::ZERO,
            trade_delay_max: Duration::ZERO,
            owner_page_delay: Duration::ZERO,
            inventory_page_delay: Duration::ZERO,
            ..self
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site_limits() {
        let cfg = TradeConfig::default();
        assert_eq!(cfg.page_size, 60);
        assert_eq!(cfg.max_pages, 1000);
        assert_eq!(cfg.max_scanned, 30_000);
        assert_eq!(cfg.partner_timeout_limit, 2);
        assert_eq!(cfg.payloads.len(), DEFAULT_PAYLOADS.len());
    }

    #[test]
    fn without_delays_zeroes_sleeps_only() {
        let cfg = TradeConfig::default().without_delays();
        assert_eq!(cfg.page_delay, Duration::ZERO);
        assert_eq!(cfg.trade_delay_max, Duration::ZERO);
        assert_eq!(cfg.page_size, 60);
    }
}
