//! CLI subcommand implementations.

pub mod boost;
pub mod inventory;
pub mod login;
pub mod send_trades;

use anyhow::{Context as _, Result};
use mangabuff_lib::{ClientConfig, Profile, ProfileStore, Session, TradeConfig};

/// Settings and storage shared by every subcommand.
pub struct Context {
    pub store: ProfileStore,
    pub name: String,
    pub client: ClientConfig,
    pub trade: TradeConfig,
}

impl Context {
    /// The stored profile; commands other than `login` need one.
    pub fn profile(&self) -> Result<Profile> {
        self.store.read(&self.name).with_context(|| {
            format!(
                "no profile at {}, run `mangabuff login` first",
                self.store.path_for(&self.name).display()
            )
        })
    }

    pub fn session(&self, profile: &Profile) -> Result<Session> {
        Ok(Session::from_profile(profile, &self.client)?)
    }
}
