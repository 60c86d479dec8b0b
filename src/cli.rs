// Command-line interface.
// Subcommands for ad-hoc fetches, rank lookups, and cache maintenance.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mangofetch")]
#[command(author, version, about = "Cached HTTP fetches and rank lookups for the Mango bot")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, default_value = "mangofetch.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// GET a URL through the shared getter
    Get {
        url: String,

        /// Representation to print: json, text, bytes, or filename
        #[arg(long = "as", default_value = "json")]
        representation: String,

        /// Serve from and store into the response cache
        #[arg(long)]
        cache: bool,

        /// Store the response permanently (implies --cache)
        #[arg(long)]
        permanent: bool,
    },

    /// POST a JSON body to a URL
    Post {
        url: String,

        /// JSON request body
        #[arg(long, default_value = "{}")]
        body: String,

        /// Representation to print: json, text, or bytes
        #[arg(long = "as", default_value = "json")]
        representation: String,
    },

    /// Look up a player's rank medal on OpenDota
    Rank {
        /// 32-bit Steam account id
        steam32: u64,
    },

    /// Response cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Remove every transient entry
    Clear,
}
