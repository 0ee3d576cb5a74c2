//! Library layer for MangaBuff trade automation: card lookup, trade
//! submission and batch dispatch on top of the `mangabuff_api` transport.
//!
//! Partner lookups share a run-scoped [`PartnerState`]; every remote
//! failure is absorbed per partner so a batch never aborts half-way.

pub mod auth;
pub mod cards;
pub mod club;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod inventory;
pub mod owners;
pub mod partner;
pub mod profile;
pub mod search;
pub mod target;
pub mod text;
pub mod trade;

pub use mangabuff_api;
pub use mangabuff_api::{ClientConfig, Profile, Session};

pub use cards::CardEntry;
pub use config::TradeConfig;
pub use dispatch::{send_trades_to_owners, DispatchOptions, RunStats, TargetCard};
pub use error::MangaBuffError;
pub use owners::{OnlineOwnerPages, OwnerPage, OwnerPageSource};
pub use partner::PartnerState;
pub use profile::ProfileStore;
pub use search::{CardSearch, Side};
pub use trade::{TradeFormInfo, TradeSubmitter};
