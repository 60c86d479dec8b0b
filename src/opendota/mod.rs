// OpenDota API module.
// Player lookups for rank verification, built on the shared getter.

pub mod client;
pub mod types;

pub use client::OpenDotaClient;
pub use types::{PlayerInfo, Profile, Rank};
