use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::info;

use tts_hub::commands::{self, SpeakOptions};
use tts_hub::config::AppConfig;
use tts_hub::core::tts::{PresetEditor, RateValue};

/// tts-hub - Text-to-speech engines with resumable streaming
#[derive(Parser, Debug)]
#[command(name = "tts-hub")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered engine types
    Types,

    /// List stored engines
    List,

    /// Store a new engine from a JSON record
    Add {
        /// Unique engine name
        #[arg(short = 'n', long = "name")]
        name: String,

        /// Engine record, e.g. '{"#type": "openai", "voice": "nova"}'
        #[arg(short = 'r', long = "record")]
        record: String,
    },

    /// Remove a stored engine
    Remove {
        /// Engine id or name
        #[arg(short = 'e', long = "engine")]
        engine: String,
    },

    /// Synthesize text to a file
    Speak {
        /// Engine id or name
        #[arg(short = 'e', long = "engine")]
        engine: String,

        /// Text to synthesize
        #[arg(short = 't', long = "text")]
        text: String,

        /// Output file; PCM audio written to a .wav path gets a WAV header
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Stream with resume and retry instead of a single request
        #[arg(long = "stream")]
        stream: bool,

        /// Chunk size in bytes when streaming (0 keeps backend framing)
        #[arg(long = "chunk-size")]
        chunk_size: Option<usize>,
    },

    /// Change pitch, volume or rate of a stored engine
    Edit {
        /// Engine id or name
        #[arg(short = 'e', long = "engine")]
        engine: String,

        #[arg(long = "pitch", allow_hyphen_values = true)]
        pitch: Option<i32>,

        #[arg(long = "volume", allow_hyphen_values = true)]
        volume: Option<i32>,

        /// A number, or "system" to follow the system rate
        #[arg(long = "rate", value_parser = parse_rate)]
        rate: Option<RateValue>,
    },
}

fn parse_rate(value: &str) -> Result<RateValue, String> {
    if value.eq_ignore_ascii_case("system") {
        return Ok(RateValue::System);
    }
    value
        .parse::<i32>()
        .map(RateValue::Value)
        .map_err(|_| format!("expected a number or 'system', got '{value}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        AppConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        AppConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let ctx = config.engine_context()?;
    let store = config.engine_store();

    match cli.command {
        Commands::Types => {
            for (tag, display_name) in commands::engine_types() {
                println!("{tag:<10} {display_name}");
            }
        }
        Commands::List => {
            let engines = commands::list_engines(&store, &ctx)?;
            if engines.is_empty() {
                println!("No engines stored in {}", store.path().display());
            }
            for engine in engines {
                println!("{} [{}] {}", engine.name, engine.engine_type, engine.id);
                match (engine.description, engine.bottom_content) {
                    (Some(description), Some(bottom)) => {
                        println!("    {description}");
                        println!("    {bottom}");
                    }
                    _ => println!("    (engine type not available in this build)"),
                }
            }
        }
        Commands::Add { name, record } => {
            let stored = commands::add_engine(&store, &ctx, &name, &record)?;
            println!("Added {} ({})", stored.name, stored.id);
        }
        Commands::Remove { engine } => {
            let removed = commands::remove_engine(&store, &engine)?;
            println!("Removed {} ({})", removed.name, removed.id);
        }
        Commands::Speak {
            engine,
            text,
            output,
            stream,
            chunk_size,
        } => {
            let options = SpeakOptions {
                stream,
                chunk_size: chunk_size.unwrap_or(config.chunk_size),
                retry: config.retry.clone(),
            };
            let outcome =
                commands::speak(&store, &ctx, &engine, &text, &output, &options).await?;
            println!(
                "Wrote {} bytes of {} audio to {}{}",
                outcome.bytes,
                outcome.format,
                output.display(),
                if outcome.wav_wrapped { " (WAV)" } else { "" }
            );
        }
        Commands::Edit {
            engine,
            pitch,
            volume,
            rate,
        } => {
            let editor = PresetEditor {
                pitch,
                volume,
                rate,
            };
            match commands::edit_engine(&store, &ctx, &engine, &editor).await? {
                Some(updated) => println!("Updated {} ({})", updated.name, updated.id),
                None => println!("No change"),
            }
        }
    }

    Ok(())
}
