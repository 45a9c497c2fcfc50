//! concierge CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use concierge::{
    commands::{
        cmd_add_keyword, cmd_backfill, cmd_chunk, cmd_init, cmd_list_chunks, cmd_list_keywords,
        cmd_remove_chunks, cmd_retrieve, cmd_route, cmd_seed_keywords, cmd_status,
        print_backfill_stats, print_chunk_outcome, print_chunks, print_context, print_init,
        print_keywords, print_removal, print_route_decision, print_seed_stats, print_status,
        InitOptions, RetrieveOptions,
    },
    config::Config,
    error::Result,
    models::{ChunkKind, SourcePolicy, SourceRecord},
    progress::LogWriterFactory,
    store::KnowledgeDb,
};
use std::io::Read;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "concierge")]
#[command(version, about = "Tenant knowledge core: chunking, intent routing, context retrieval", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize concierge configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Chunk a single source record
    Chunk {
        /// Tenant identifier
        #[arg(short, long)]
        tenant: String,

        /// Source record identifier
        #[arg(short, long)]
        source: String,

        /// Record kind: faq, manual, product or page
        #[arg(short, long)]
        kind: String,

        /// Record title
        #[arg(long)]
        title: Option<String>,

        /// Language code (e.g. fa, en)
        #[arg(long)]
        lang: Option<String>,

        /// Mark the record as user-corrected (boosts priority)
        #[arg(long)]
        corrected: bool,

        /// Record text (reads a file with --file, stdin if neither is given)
        text: Option<String>,

        /// Read record text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Bulk-chunk records from a JSONL file
    Backfill {
        /// Path to the JSONL export, one record per line
        file: PathBuf,
    },

    /// Classify a query into an intent
    Route {
        /// The query to route
        query: String,

        /// Tenant identifier
        #[arg(short, long)]
        tenant: String,
    },

    /// Retrieve budgeted context for a query
    Retrieve {
        /// The query to retrieve context for
        query: String,

        /// Tenant identifier
        #[arg(short, long)]
        tenant: String,

        /// Primary source kind
        #[arg(long, default_value = "faq")]
        primary: String,

        /// Secondary source kinds, in priority order
        #[arg(long)]
        secondary: Vec<String>,

        /// Primary context budget in characters
        #[arg(long)]
        primary_budget: Option<usize>,

        /// Per-source secondary budget in characters
        #[arg(long)]
        secondary_budget: Option<usize>,

        /// Rerank candidates with the configured reranker
        #[arg(long)]
        rerank: bool,
    },

    /// Manage intent keywords
    Keywords {
        #[command(subcommand)]
        action: KeywordAction,
    },

    /// Inspect and remove knowledge chunks
    Chunks {
        #[command(subcommand)]
        action: ChunkAction,
    },

    /// Show system status
    Status {
        /// Include one tenant's breakdown
        #[arg(short, long)]
        tenant: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum KeywordAction {
    /// Seed the built-in global keywords (idempotent)
    Seed {
        /// Extra keyword rows to seed (JSONL)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Add a single keyword
    Add {
        /// Intent label the keyword routes to
        intent: String,

        /// Keyword or phrase
        keyword: String,

        /// Tenant identifier (omit for a global keyword)
        #[arg(short, long)]
        tenant: Option<String>,

        /// Language code
        #[arg(long)]
        lang: Option<String>,
    },

    /// List keywords
    List {
        /// Limit to rows visible to one tenant
        #[arg(short, long)]
        tenant: Option<String>,
    },
}

#[derive(Subcommand)]
enum ChunkAction {
    /// List a tenant's chunks
    List {
        /// Tenant identifier
        #[arg(short, long)]
        tenant: String,

        /// Limit to one kind
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Remove the chunk set for a source record
    Remove {
        /// Source record identifier
        source: String,

        /// Tenant identifier
        #[arg(short, long)]
        tenant: String,

        /// Record kind
        #[arg(short, long)]
        kind: String,

        /// Keep the content as an orphan instead of the kind's default policy
        #[arg(long)]
        orphan: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if matches!(cli.command, Commands::Init { .. }) {
        return handle_init(cli).await;
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "concierge", &mut std::io::stdout());
        return Ok(());
    }

    // Load configuration
    let config = load_config(cli.config.as_deref())?;
    let db = KnowledgeDb::new(&config.paths.db_file).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Chunk {
            tenant,
            source,
            kind,
            title,
            lang,
            corrected,
            text,
            file,
        } => {
            let text = read_record_text(text, file)?;
            let record = SourceRecord {
                tenant_id: tenant,
                source_id: source,
                kind: kind.parse::<ChunkKind>()?,
                title,
                text,
                lang,
                user_corrected: corrected,
            };

            let outcome = cmd_chunk(&config, &db, &record).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_chunk_outcome(&outcome);
            }
        }

        Commands::Backfill { file } => {
            let stats = cmd_backfill(&config, &db, &file).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_backfill_stats(&stats);
            }
        }

        Commands::Route { query, tenant } => {
            let decision = cmd_route(&config, &db, &tenant, &query).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                print_route_decision(&decision);
            }
        }

        Commands::Retrieve {
            query,
            tenant,
            primary,
            secondary,
            primary_budget,
            secondary_budget,
            rerank,
        } => {
            let secondary_sources = secondary
                .iter()
                .map(|s| s.parse::<ChunkKind>())
                .collect::<Result<Vec<_>>>()?;

            let options = RetrieveOptions {
                tenant_id: tenant,
                query,
                primary_source: primary.parse()?,
                secondary_sources,
                primary_budget,
                secondary_budget,
                rerank: if rerank { Some(true) } else { None },
            };

            let context = cmd_retrieve(&config, &db, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&context)?);
            } else {
                print_context(&context);
            }
        }

        Commands::Keywords { action } => match action {
            KeywordAction::Seed { file } => {
                let stats = cmd_seed_keywords(&config, &db, file.as_deref()).await?;

                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    print_seed_stats(&stats);
                }
            }
            KeywordAction::Add {
                intent,
                keyword,
                tenant,
                lang,
            } => {
                let row = cmd_add_keyword(
                    &config,
                    &db,
                    tenant.as_deref(),
                    &intent,
                    &keyword,
                    lang.as_deref(),
                )
                .await?;

                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&row)?);
                } else {
                    println!("✓ Added keyword '{}' → intent '{}'", row.keyword, row.intent);
                }
            }
            KeywordAction::List { tenant } => {
                let keywords = cmd_list_keywords(&db, tenant.as_deref()).await?;

                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&keywords)?);
                } else {
                    print_keywords(&keywords);
                }
            }
        },

        Commands::Chunks { action } => match action {
            ChunkAction::List { tenant, kind } => {
                let kind = kind.map(|k| k.parse::<ChunkKind>()).transpose()?;
                let chunks = cmd_list_chunks(&db, &tenant, kind).await?;

                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&chunks)?);
                } else {
                    print_chunks(&chunks);
                }
            }
            ChunkAction::Remove {
                source,
                tenant,
                kind,
                orphan,
            } => {
                let kind = kind.parse::<ChunkKind>()?;
                let removed = cmd_remove_chunks(&db, &tenant, &source, kind, orphan).await?;
                let orphaned = orphan || kind.delete_policy() == SourcePolicy::Orphan;

                if cli.json {
                    println!(
                        r#"{{"removed": {}, "orphaned": {}}}"#,
                        removed, orphaned
                    );
                } else {
                    print_removal(removed, orphaned);
                }
            }
        },

        Commands::Status { tenant } => {
            let status = cmd_status(&config, &db, tenant.as_deref()).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

async fn handle_init(cli: Cli) -> Result<()> {
    let Commands::Init { force } = cli.command else {
        unreachable!()
    };

    // A --config path moves the whole base directory along with it
    let base_dir = if let Some(path) = cli.config {
        if path.extension().is_some_and(|e| e == "toml") {
            path.parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir)
        } else {
            path
        }
    } else {
        Config::default_base_dir()
    };

    let config = cmd_init(InitOptions { base_dir, force }).await?;

    if cli.json {
        println!(
            r#"{{"status": "ok", "base_dir": "{}"}}"#,
            config.paths.base_dir.display()
        );
    } else {
        print_init(&config);
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        return Err(concierge::error::Error::NotInitialized);
    }

    Config::load(&config_path)
}

fn read_record_text(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return Ok(std::fs::read_to_string(path)?);
    }

    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}
