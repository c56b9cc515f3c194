//! Command-line interface parsing and handling
//!
//! Each subcommand runs one stage of the pipeline on its own, which makes the
//! binary useful for checking inputs by hand and for replaying captured
//! response streams.

mod ingest;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::config::Config;
use crate::core::sanitize::{sanitize_api_response, sanitize_html, sanitize_text};
use crate::core::url_allowlist::UrlAllowlist;
use crate::core::validation::{validate_chat_input, validate_image_prompt, ValidationResult};

#[derive(Parser)]
#[command(name = "chatguard")]
#[command(about = "Validate chat input, check image URLs, and decode response streams")]
#[command(version, long_version = long_version())]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Read configuration from this file instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log decisions to stderr (RUST_LOG overrides)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a chat message
    Chat {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        text: Vec<String>,
    },
    /// Validate an image-generation prompt
    Image {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
    },
    /// Check whether an image URL may be displayed
    Url { url: String },
    /// HTML-encode text
    Sanitize {
        #[arg(short, long, value_enum, default_value_t = SanitizeMode::Html)]
        mode: SanitizeMode,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        text: Vec<String>,
    },
    /// Decode a newline-delimited JSON response stream from a file or stdin
    Ingest {
        /// File to read; stdin when omitted
        file: Option<PathBuf>,
        /// Print the finished message HTML-encoded instead of streaming deltas
        #[arg(long)]
        html: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SanitizeMode {
    /// Encode & < > " ' and /
    Html,
    /// Encode & < > " and ', keep slashes
    Text,
    /// HTML-encode and strip script schemes and base64 image prefixes
    Response,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("VERGEN_GIT_DESCRIBE"),
        ", built ",
        env!("VERGEN_BUILD_DATE"),
        ")"
    )
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    crate::logging::init(args.verbose);

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match args.command {
        Commands::Chat { text } => {
            report_validation(&validate_chat_input(text.join(" ").as_str()), args.json)
        }
        Commands::Image { prompt } => {
            report_validation(&validate_image_prompt(prompt.join(" ").as_str()), args.json)
        }
        Commands::Url { url } => report_url(&config.image_allowlist(), &url, args.json),
        Commands::Sanitize { mode, text } => {
            let text = text.join(" ");
            let sanitized = match mode {
                SanitizeMode::Html => sanitize_html(&text),
                SanitizeMode::Text => sanitize_text(text.as_str()),
                SanitizeMode::Response => sanitize_api_response(text.as_str()),
            };
            println!("{sanitized}");
            Ok(())
        }
        Commands::Ingest { file, html } => ingest::run_ingest(file, html).await,
        Commands::Config => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                config.print_all();
            }
            Ok(())
        }
    }
}

fn report_validation(result: &ValidationResult, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if result.is_valid {
        println!("✅ {}", result.sanitized);
    } else {
        for error in &result.errors {
            eprintln!("❌ {error}");
        }
    }

    if !result.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

fn report_url(allowlist: &UrlAllowlist, url: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let trusted = allowlist.is_trusted(url);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "url": url, "trusted": trusted }))?
        );
    } else if trusted {
        println!("✅ {url}");
    } else {
        eprintln!("❌ Untrusted image URL: {url}");
    }

    if !trusted {
        std::process::exit(1);
    }
    Ok(())
}
