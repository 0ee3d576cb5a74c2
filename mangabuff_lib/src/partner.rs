//! Run-scoped bookkeeping of partners whose endpoints misbehave.

use std::collections::{HashMap, HashSet};

/// Consecutive-timeout counters and the set of partners given up on.
///
/// Created once per batch run and passed by reference to every lookup.
/// A blocked partner stays blocked until the state is dropped.
#[derive(Debug, Clone)]
pub struct PartnerState {
    blocked: HashSet<i64>,
    timeouts: HashMap<i64, u32>,
    limit: u32,
}

impl Default for PartnerState {
    fn default() -> Self {
        Self::new(2)
    }
}

impl PartnerState {
    pub fn new(limit: u32) -> Self {
        Self {
            blocked: HashSet::new(),
            timeouts: HashMap::new(),
            limit: limit.max(1),
        }
    }

    pub fn is_blocked(&self, partner_id: i64) -> bool {
        self.blocked.contains(&partner_id)
    }

    /// Count a timeout; at the limit the partner is blocked and its counter dropped.
    pub fn mark_timeout(&mut self, partner_id: i64) {
        let count = {
            let slot = self.timeouts.entry(partner_id).or_insert(0);
            *slot += 1;
            *slot
        };
        if count >= self.limit {
            tracing::warn!("partner {} blocked after {} timeouts", partner_id, count);
            self.block(partner_id);
        }
    }

    /// Reset the counter after a successful response.
    pub fn clear_timeout(&mut self, partner_id: i64) {
        self.timeouts.remove(&partner_id);
    }

    /// Block immediately, e.g. after an oversized response.
    pub fn block(&mut self, partner_id: i64) {
        self.blocked.insert(partner_id);
        self.timeouts.remove(&partner_id);
    }

    pub fn timeouts(&self, partner_id: i64) -> u32 {
        self.timeouts.get(&partner_id).copied().unwrap_or(0)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_at_limit_and_clears_counter() {
        let mut state = PartnerState::new(2);
        state.mark_timeout(7);
        assert!(!state.is_blocked(7));
        assert_eq!(state.timeouts(7), 1);
        state.mark_timeout(7);
        assert!(state.is_blocked(7));
        assert_eq!(state.timeouts(7), 0);
    }

    #[test]
    fn clear_timeout_resets_fully() {
        let mut state = PartnerState::default();
        state.mark_timeout(3);
        state.clear_timeout(3);
        state.mark_timeout(3);
        assert!(!state.is_blocked(3));
        assert_eq!(state.timeouts(3), 1);
    }

    #[test]
    fn block_is_permanent_and_per_partner() {
        let mut state = PartnerState::default();
        state.block(1);
        state.clear_timeout(1);
        assert!(state.is_blocked(1));
        assert!(!state.is_blocked(2));
        assert_eq!(state.blocked_count(), 1);
    }

    #[test]
    fn zero_limit_behaves_as_one() {
        let mut state = PartnerState::new(0);
        state.mark_timeout(9);
        assert!(state.is_blocked(9));
    }
}
