//! lingo-cli: translation, connection checks and cache maintenance from the shell.
//!
//! Usage:
//!   lingo-cli translate <text> --to <lang>     Translate text (cached)
//!   lingo-cli test-connection                  Probe the configured endpoint
//!   lingo-cli cache stats|sweep|clear <ns>     Inspect or maintain the caches
//!   lingo-cli detect-language                  Guess a default language from geo-IP

use anyhow::{anyhow, bail, Context};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use lingo_core::cache::{CacheStore, DirectoryMedium, Namespace, SqliteMedium, StoreBudget};
use lingo_core::locale::LocaleResolver;
use lingo_core::{InferenceClient, Settings, TranslationService};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lingo_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "translate" => cmd_translate(&args[2..]).await,
        "test-connection" => cmd_test_connection(&args[2..]).await,
        "cache" => cmd_cache(&args[2..]).await,
        "detect-language" => cmd_detect_language().await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"lingo-cli: translation and cache tool

USAGE:
    lingo-cli <COMMAND> [OPTIONS]

COMMANDS:
    translate <text> --to <lang>    Translate text, using the local cache
    test-connection                 Check that the configured model endpoint answers
    cache stats                     Show entry counts and usage of both caches
    cache sweep                     Delete expired entries
    cache clear <namespace>         Remove every entry of translation|image|voice
    detect-language                 Guess a default language from the public IP
    version                         Show version information
    help                            Show this help message

OPTIONS:
    --config <path>                 YAML settings file

ENVIRONMENT:
    LINGO_API_URL, LINGO_API_KEY, LINGO_MODEL, LINGO_BACKEND,
    LINGO_HTTP_TIMEOUT_SECS, LINGO_DATA_DIR, RUST_LOG"#
    );
}

fn cmd_version() {
    println!("{}", version_line());
}

fn version_line() -> String {
    format!("lingo-cli {}", env!("CARGO_PKG_VERSION"))
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Positional arguments with `--flag value` pairs removed.
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

fn load_settings(args: &[String]) -> anyhow::Result<Settings> {
    let path = flag_value(args, "--config").map(PathBuf::from);
    Settings::load(path.as_deref()).context("failed to load settings")
}

struct Caches {
    text: Arc<CacheStore>,
    media: Arc<CacheStore>,
}

async fn open_caches(settings: &Settings) -> anyhow::Result<Caches> {
    let root = settings.data_dir().join("cache");
    let text_medium =
        SqliteMedium::open(root.join("text.db")).context("failed to open text cache")?;
    let media_medium = DirectoryMedium::open(root.join("media"))
        .await
        .context("failed to open media cache")?;
    let text = CacheStore::open(
        Arc::new(text_medium),
        StoreBudget::bytes(settings.cache.text_budget_bytes),
    )
    .await?;
    let media = CacheStore::open(
        Arc::new(media_medium),
        StoreBudget::bytes(settings.cache.blob_budget_bytes),
    )
    .await?;
    Ok(Caches {
        text: Arc::new(text),
        media: Arc::new(media),
    })
}

async fn cmd_translate(args: &[String]) -> anyhow::Result<()> {
    let settings = load_settings(args)?;
    let target = flag_value(args, "--to").ok_or_else(|| anyhow!("missing --to <lang>"))?;
    let text = positionals(args).join(" ");
    if text.trim().is_empty() {
        bail!("nothing to translate");
    }

    let client = InferenceClient::new(settings.remote_config()?)?;
    let caches = open_caches(&settings).await?;
    let service = TranslationService::new(Arc::new(client), caches.text)
        .with_media_cache(caches.media)
        .with_ttls(settings.cache.translation_ttl(), settings.cache.media_ttl());

    let result = service.translate(&text, target).await?;
    println!("{}", result.record.translation);
    eprintln!(
        "[{} ({}) -> {}{}]",
        result.record.source_language_name,
        result.record.detected_language,
        target,
        if result.cached { ", cached" } else { "" }
    );
    Ok(())
}

async fn cmd_test_connection(args: &[String]) -> anyhow::Result<()> {
    let settings = load_settings(args)?;
    let client = InferenceClient::new(settings.remote_config()?)?;
    if client.test_connection().await {
        println!("✅ {} backend at {} is reachable", client.backend(), client.config().endpoint());
        Ok(())
    } else {
        bail!("{} backend at {} did not answer", client.backend(), client.config().endpoint())
    }
}

async fn cmd_cache(args: &[String]) -> anyhow::Result<()> {
    let settings = load_settings(args)?;
    let caches = open_caches(&settings).await?;
    let pos = positionals(args);

    match pos.first().copied() {
        Some("stats") => {
            for (label, store) in [("text", &caches.text), ("media", &caches.media)] {
                println!(
                    "{label:<6} entries={:<6} used={} bytes (live {}) budget={} bytes",
                    store.len().await,
                    store.usage().await,
                    store.live_usage().await,
                    store.budget().max_bytes,
                );
            }
        }
        Some("sweep") => {
            let removed = caches.text.sweep().await? + caches.media.sweep().await?;
            println!("removed {removed} expired entries");
        }
        Some("clear") => {
            let ns: Namespace = pos
                .get(1)
                .ok_or_else(|| anyhow!("missing namespace (translation|image|voice)"))?
                .parse()?;
            let store = match ns {
                Namespace::Translation => &caches.text,
                Namespace::Image | Namespace::Voice => &caches.media,
            };
            let removed = store.clear_namespace(ns).await?;
            println!("removed {removed} {ns} entries");
        }
        Some(other) => bail!("unknown cache command: {other}"),
        None => bail!("missing cache command (stats|sweep|clear)"),
    }
    Ok(())
}

async fn cmd_detect_language() -> anyhow::Result<()> {
    let resolver = LocaleResolver::new(Duration::from_secs(5))?;
    println!("{}", resolver.detect_language().await);
    Ok(())
}
