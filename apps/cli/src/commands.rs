//! CLI command definitions, routing, and tracing setup.

use std::io::Read;

use accesscms_core::assembler;
use accesscms_core::engine::{Adaptation, AdaptationEngine, AdaptationProgress};
use accesscms_core::profiles::CATALOG;
use accesscms_core::schema::{ContentSchema, schema_for};
use accesscms_shared::{
    AppConfig, DisabilityProfile, EntityId, EntityKind, database_path, init_config, load_config,
};
use accesscms_storage::Storage;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AccessCMS — accessibility-adapted content for hotels, tours and care services.
#[derive(Parser)]
#[command(
    name = "accesscms",
    version,
    about = "Store travel and care content and adapt it for five disability profiles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create an entity and generate content for every profile.
    Create {
        /// Entity kind: hotel, tour or care-service.
        kind: EntityKind,

        /// JSON payload file, or `-` for stdin.
        #[arg(short, long)]
        file: String,
    },

    /// List entities of one kind.
    List {
        /// Entity kind: hotel, tour or care-service.
        kind: EntityKind,
    },

    /// Show an entity's content, optionally as adapted for one profile.
    Show {
        /// Entity kind: hotel, tour or care-service.
        kind: EntityKind,

        /// Entity ID.
        id: EntityId,

        /// Disability profile to view.
        #[arg(short, long, conflicts_with = "all")]
        profile: Option<DisabilityProfile>,

        /// Show the original and every profile slot.
        #[arg(long)]
        all: bool,
    },

    /// Regenerate the adapted content for one profile.
    Regenerate {
        /// Entity kind: hotel, tour or care-service.
        kind: EntityKind,

        /// Entity ID.
        id: EntityId,

        /// Disability profile to regenerate.
        #[arg(short, long)]
        profile: DisabilityProfile,
    },

    /// Validate a payload without storing it.
    Validate {
        /// Entity kind: hotel, tour or care-service.
        kind: EntityKind,

        /// JSON payload file, or `-` for stdin.
        #[arg(short, long)]
        file: String,
    },

    /// Delete an entity and its adapted content.
    Delete {
        /// Entity kind: hotel, tour or care-service.
        kind: EntityKind,

        /// Entity ID.
        id: EntityId,
    },

    /// List the supported disability profiles.
    Profiles,

    /// Print the content model of one kind, or of all kinds.
    Schema {
        /// Entity kind: hotel, tour or care-service.
        kind: Option<EntityKind>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "accesscms=info",
        1 => "accesscms=debug",
        _ => "accesscms=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Create { kind, file } => cmd_create(kind, &file).await,
        Command::List { kind } => cmd_list(kind).await,
        Command::Show {
            kind,
            id,
            profile,
            all,
        } => cmd_show(kind, id, profile, all).await,
        Command::Regenerate { kind, id, profile } => cmd_regenerate(kind, id, profile).await,
        Command::Validate { kind, file } => cmd_validate(kind, &file),
        Command::Delete { kind, id } => cmd_delete(kind, id).await,
        Command::Profiles => cmd_profiles(),
        Command::Schema { kind } => cmd_schema(kind),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_create(kind: EntityKind, file: &str) -> Result<()> {
    let config = load_config()?;
    let raw = read_payload(file)?;
    let engine = AdaptationEngine::from_config(&config)?;
    if !engine.is_available() {
        eprintln!(
            "note: ${} is not set; adapted content will mirror the original",
            config.generation.api_key_env
        );
    }
    let storage = open_storage(&config).await?;

    info!(%kind, file, "creating entity");

    let reporter = CliProgress::new();
    let result = assembler::create_entity(&engine, &storage, kind, &raw, &reporter).await;
    reporter.finish();
    let created = result?;

    println!();
    println!("  {} created", kind.label());
    println!("  ID:   {}", created.id);
    println!("  Name: {}", created.original.text("name").unwrap_or_default());
    for adaptation in created.adaptations.iter() {
        println!("  {:<22} {}", adaptation.profile.as_str(), adaptation.provenance);
    }
    println!();

    Ok(())
}

async fn cmd_list(kind: EntityKind) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;

    let entities = assembler::list_entities(&storage, kind).await?;
    if entities.is_empty() {
        println!("No {} entries.", kind.label().to_lowercase());
        return Ok(());
    }

    for entity in &entities {
        println!(
            "{}  {}  {}",
            entity.id,
            entity.name,
            truncate(&entity.headline, 60)
        );
    }
    Ok(())
}

async fn cmd_show(
    kind: EntityKind,
    id: EntityId,
    profile: Option<DisabilityProfile>,
    all: bool,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;

    if all {
        let document = assembler::get_entity(&storage, kind, id).await?;
        print_json(&document)
    } else {
        let view = assembler::content_view(&storage, kind, id, profile).await?;
        print_json(&view)
    }
}

async fn cmd_regenerate(kind: EntityKind, id: EntityId, profile: DisabilityProfile) -> Result<()> {
    let config = load_config()?;
    let engine = AdaptationEngine::from_config(&config)?;
    let storage = open_storage(&config).await?;

    info!(%kind, %id, %profile, "regenerating profile");

    let reporter = CliProgress::new();
    reporter.phase(&format!("Regenerating {profile}"));
    let result = assembler::regenerate(&engine, &storage, kind, id, profile).await;
    reporter.finish();
    let adaptation = result?;

    println!("{} {}: {}", id, profile, adaptation.provenance);
    print_json(&adaptation.record)
}

fn cmd_validate(kind: EntityKind, file: &str) -> Result<()> {
    let raw = read_payload(file)?;
    match assembler::validate_payload(kind, &raw) {
        Ok(record) => {
            eprintln!("valid {}", kind.label().to_lowercase());
            print_json(&record)
        }
        Err(e) => Err(eyre!("invalid {}: {e}", kind.label().to_lowercase())),
    }
}

async fn cmd_delete(kind: EntityKind, id: EntityId) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    assembler::delete_entity(&storage, kind, id).await?;
    println!("Deleted {} {id}", kind.label().to_lowercase());
    Ok(())
}

fn cmd_profiles() -> Result<()> {
    for entry in &CATALOG {
        println!("{:<22} {}", entry.profile.as_str(), entry.description);
    }
    Ok(())
}

fn cmd_schema(kind: Option<EntityKind>) -> Result<()> {
    let schemas: Vec<&ContentSchema> = match kind {
        Some(kind) => vec![schema_for(kind)],
        None => EntityKind::ALL.into_iter().map(schema_for).collect(),
    };
    print_json(&schemas)
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = database_path(config)?;
    Ok(Storage::open(&path).await?)
}

async fn open_storage_readonly(config: &AppConfig) -> Result<Storage> {
    let path = database_path(config)?;
    Ok(Storage::open_readonly(&path).await?)
}

/// Read a JSON payload from a file, or stdin for `-`.
fn read_payload(file: &str) -> Result<serde_json::Value> {
    let text = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| eyre!("cannot read stdin: {e}"))?;
        buf
    } else {
        std::fs::read_to_string(file).map_err(|e| eyre!("cannot read '{file}': {e}"))?
    };
    serde_json::from_str(&text).map_err(|e| eyre!("'{file}' is not valid JSON: {e}"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl AdaptationProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn profile_done(&self, adaptation: &Adaptation, completed: usize, total: usize) {
        self.spinner.set_message(format!(
            "Adapting [{completed}/{total}] {} ({})",
            adaptation.profile, adaptation.provenance
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_with_kind_alias() {
        let cli = Cli::try_parse_from(["accesscms", "create", "care-service", "--file", "svc.json"])
            .expect("parse");
        match cli.command {
            Command::Create { kind, file } => {
                assert_eq!(kind, EntityKind::CareService);
                assert_eq!(file, "svc.json");
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn parses_regenerate_profile() {
        let id = EntityId::new();
        let id_str = id.to_string();
        let cli = Cli::try_parse_from([
            "accesscms",
            "-v",
            "regenerate",
            "hotel",
            id_str.as_str(),
            "--profile",
            "low_vision",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Regenerate { kind, id: parsed, profile } => {
                assert_eq!(kind, EntityKind::Hotel);
                assert_eq!(parsed, id);
                assert_eq!(profile, DisabilityProfile::LowVision);
            }
            _ => panic!("expected regenerate"),
        }
    }

    #[test]
    fn rejects_unknown_profile_and_kind() {
        assert!(Cli::try_parse_from(["accesscms", "list", "castle"]).is_err());
        let id = EntityId::new().to_string();
        assert!(
            Cli::try_parse_from(["accesscms", "show", "tour", id.as_str(), "--profile", "colour_blind"])
                .is_err()
        );
    }

    #[test]
    fn show_profile_conflicts_with_all() {
        let id = EntityId::new().to_string();
        let parsed = Cli::try_parse_from([
            "accesscms", "show", "tour", id.as_str(), "--profile", "dyslexia", "--all",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Straße am Hafen", 6), "Straß…");
    }
}
