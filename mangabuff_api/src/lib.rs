//! HTTP transport for the MangaBuff site: session construction from a stored
//! profile, capped body reads and charset-aware decoding.

mod body;
mod client;
mod config;
mod errors;
pub mod profile;
pub use self::body::{decode_body, parse_charset, read_capped};
pub use self::client::{Page, Reply, Session};
pub use self::config::ClientConfig;
pub use self::errors::Error;
pub use self::profile::Profile;
