// mangofetch binary.
// Builds the shared getter once at startup and runs one command against it.

mod cli;

use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error};

use cli::{CacheAction, Cli, Commands};
use mangofetch::cache::FileCache;
use mangofetch::config::Config;
use mangofetch::error::{FetchError, Result};
use mangofetch::http::{GetRequest, HttpGetter, Payload, PostRequest, Representation};
use mangofetch::opendota::OpenDotaClient;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let FetchError::DeveloperNotif {
                developer_message, ..
            } = &e
            {
                error!("{}", developer_message);
            }
            match e.user_message() {
                Some(message) => eprintln!("{}", message),
                None => eprintln!("Error: {}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    debug!(?config, "loaded config");

    match cli.command {
        Commands::Get {
            url,
            representation,
            cache,
            permanent,
        } => {
            // Rejected here, before the getter or any request exists.
            let representation: Representation = representation.parse()?;
            let request = GetRequest::new(url)
                .representation(representation)
                .cache(cache)
                .cache_permanent(permanent);
            let getter = HttpGetter::new(&config).await?;
            print_payload(getter.get(&request).await?)
        }
        Commands::Post {
            url,
            body,
            representation,
        } => {
            let representation: Representation = representation.parse()?;
            let request = PostRequest::new(url)
                .representation(representation)
                .body(serde_json::from_str(&body)?);
            let getter = HttpGetter::new(&config).await?;
            print_payload(getter.post(&request).await?)
        }
        Commands::Rank { steam32 } => {
            let getter = Arc::new(HttpGetter::new(&config).await?);
            let client = OpenDotaClient::new(getter, &config.opendota_base_url);
            let player = client.player(steam32).await?;
            let name = player
                .profile
                .as_ref()
                .and_then(|p| p.personaname.clone())
                .unwrap_or_else(|| steam32.to_string());
            println!("{} is {}", name, player.rank());
            Ok(())
        }
        Commands::Cache {
            action: CacheAction::Clear,
        } => {
            let removed = FileCache::new(config.cache_dir()?).clear_transient().await?;
            println!("Removed {} transient cache entries", removed);
            Ok(())
        }
    }
}

fn print_payload(payload: Payload) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match payload {
        Payload::Json(value) => writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?,
        Payload::Text(text) => writeln!(stdout, "{}", text)?,
        Payload::Bytes(mut cursor) => {
            let mut bytes = Vec::new();
            cursor.read_to_end(&mut bytes)?;
            stdout.write_all(&bytes)?;
        }
        Payload::Filename(path) => writeln!(stdout, "{}", path.display())?,
    }
    Ok(())
}
