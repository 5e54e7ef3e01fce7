use std::sync::Arc;

use magpie::channels;
use magpie::config::Config;
use magpie::error::MagpieError;
use magpie::handler::AppState;
use magpie::logging;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"Magpie v{VERSION} — Discord assistant that chats, scrapes, and summarizes the web

USAGE:
    magpie <COMMAND>

COMMANDS:
    start       Start the bot
    version     Show version information
    help        Show this help message

FEATURES:
    - Conversational replies with bounded per-sender history
    - Inline directives: ::temperature=0.7::, ::model=gpt-4::
    - Paste a URL to get the page scraped and summarized
    - ::search <query>:: to search the web and summarize each result
    - Long replies delivered in 2000-character chunks

SETUP:
    1. Copy magpie.config.example.yaml to magpie.config.yaml
    2. Fill in the required keys:

       discord_bot_token     Discord bot token from the Developer Portal
       api_key               Completion provider API key
       scraper_api_key       Async scraping provider API key
       search_api_key        Web search provider API key

    3. Run: magpie start

CONFIG FILE (magpie.config.yaml):
    Magpie reads configuration from magpie.config.yaml (or magpie.config.yml).
    Override the path with the MAGPIE_CONFIG env var.
    See magpie.config.example.yaml for all available fields.

    Core fields:
      default_model          Model for chat replies (default: gpt-3.5-turbo)
      summary_model          Model for page summaries (default: gpt-4)
      default_temperature    Sampling temperature (default: 1.0)
      cost_rates             USD per 1K tokens, keyed by model name
      context_capacity       Turns kept per sender (default: 5)
      chunk_size             Max characters per delivered message (default: 2000)
      persona                System prompt; {{time}} and {{sender}} interpolated

    Fetch workflow:
      poll_interval_secs     Seconds between job status checks (default: 10)
      max_poll_attempts      Status checks before giving up (default: 90)
      poll_timeout_secs      Overall deadline per job (default: 900)

    Discord:
      discord_allowed_channels   Channel allowlist by ID (empty = all)
"#
    );
}

fn print_version() {
    println!("magpie {VERSION}");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str());

    match command {
        Some("start") => {}
        Some("version" | "--version" | "-V") => {
            print_version();
            return Ok(());
        }
        Some("help" | "--help" | "-h") | None => {
            print_help();
            return Ok(());
        }
        Some(unknown) => {
            eprintln!("Unknown command: {unknown}\n");
            print_help();
            std::process::exit(1);
        }
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(MagpieError::Config(e)) => {
            eprintln!("Config missing/invalid: {e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    logging::init_console_logging();
    info!("Starting Magpie bot...");

    let state = Arc::new(AppState::from_config(config));
    channels::discord::start_discord_bot(state).await?;

    Ok(())
}
