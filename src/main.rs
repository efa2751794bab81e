//! # DA/PA Checker CLI (`dapa`)
//!
//! The `dapa` binary runs metrics lookups, inspects and exports search
//! history, manages blog posts, and starts the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! dapa --config ./config/dapa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dapa init [--seed]` | Create the SQLite database, optionally with sample blog posts |
//! | `dapa check <url>` | Look up metrics for a website |
//! | `dapa history --identity <id>` | Show an identity's recent searches |
//! | `dapa clear-history --identity <id>` | Delete an identity's searches |
//! | `dapa export --identity <id>` | Export history as CSV or JSON |
//! | `dapa blog list\|show\|create\|delete` | Manage blog posts |
//! | `dapa stats` | Totals and recent activity |
//! | `dapa serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! dapa init --seed
//! dapa check example.com --identity alice
//! dapa export --identity alice --format csv --output ./alice.csv
//! dapa serve
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use chrono::Utc;
use dapa_checker::app::App;
use dapa_checker::config::{self, Config};
use dapa_checker::export::{self, ExportFormat};
use dapa_checker::{logging, migrate, server, stats};
use dapa_checker_core::models::{BlogDraft, Identity, SearchRecord};
use dapa_checker_core::url::normalize_input;

/// DA/PA Checker: website authority metrics with a daily search quota.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dapa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dapa",
    about = "DA/PA Checker: website authority metrics with a daily search quota",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dapa.toml`. `check` falls back to an
    /// in-memory store when the file does not exist.
    #[arg(long, global = true, default_value = "./config/dapa.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent. With `--seed`, also inserts the sample blog posts when
    /// the blog is empty.
    Init {
        #[arg(long)]
        seed: bool,
    },

    /// Look up metrics for a website.
    ///
    /// A bare hostname gets `https://` prepended. With `--identity` the
    /// daily quota applies and the search is saved to history.
    Check {
        url: String,

        #[arg(long, value_parser = config::parse_identity)]
        identity: Option<Identity>,

        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show an identity's most recent searches.
    History {
        #[arg(long, value_parser = config::parse_identity)]
        identity: Identity,
    },

    /// Delete every search saved for an identity.
    ClearHistory {
        #[arg(long, value_parser = config::parse_identity)]
        identity: Identity,
    },

    /// Export an identity's recent searches.
    Export {
        #[arg(long, value_parser = config::parse_identity)]
        identity: Identity,

        /// `csv` or `json`.
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Manage blog posts.
    Blog {
        #[command(subcommand)]
        action: BlogAction,
    },

    /// Totals and recent activity across all identities.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum BlogAction {
    /// List posts, newest first.
    List {
        /// Only posts whose title or excerpt contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one post and its related posts.
    Show { slug: String },
    /// Create a post.
    Create {
        #[arg(long)]
        title: String,
        /// Post body (HTML). Use `--content-file` to read from disk.
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,
        #[arg(long)]
        content_file: Option<PathBuf>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },
    /// Delete a post by id.
    Delete { id: String },
}

fn load(path: &Path, fallback_in_memory: bool) -> anyhow::Result<Config> {
    if fallback_in_memory && !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using in-memory store");
        return Ok(Config::in_memory());
    }
    config::load_config(path)
}

fn print_record(r: &SearchRecord) {
    println!("  URL:              {}", r.url);
    println!("  Domain:           {}", r.domain);
    println!("  Domain Authority: {}", r.domain_authority);
    println!("  Page Authority:   {}", r.page_authority);
    println!("  Spam Score:       {}", r.spam_score);
    println!("  Backlinks:        {}", r.backlinks);
    println!("  Domain Age:       {}", r.domain_age);
    println!("  Checked:          {}", r.check_timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let fallback = matches!(cli.command, Commands::Check { .. });
    let cfg = load(&cli.config, fallback)?;

    match cli.command {
        Commands::Init { seed } => {
            if cfg.db.backend == "sqlite" {
                migrate::run_migrations(&cfg).await?;
                println!("Database initialized successfully.");
            }
            if seed {
                let app = App::build(&cfg).await?;
                let inserted = app.blog.seed_samples(Utc::now()).await?;
                println!("Seeded {} sample blog posts.", inserted);
            }
        }
        Commands::Check {
            url,
            identity,
            json,
        } => {
            let app = App::build(&cfg).await?;
            let record = app
                .checker
                .fetch_metrics(&normalize_input(&url), identity.as_ref())
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }
        Commands::History { identity } => {
            let app = App::build(&cfg).await?;
            let history = app.checker.get_history(Some(&identity)).await;
            if history.is_empty() {
                println!("No searches yet for {}.", identity);
            }
            for (i, r) in history.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_record(r);
            }
            let usage = app.checker.quota_usage(Some(&identity)).await?;
            if let Some(remaining) = usage.remaining {
                println!();
                println!("{} searches left today.", remaining);
            }
        }
        Commands::ClearHistory { identity } => {
            let app = App::build(&cfg).await?;
            let removed = app.checker.clear_history(&identity).await?;
            println!("Removed {} searches.", removed);
        }
        Commands::Export {
            identity,
            format,
            output,
        } => {
            let app = App::build(&cfg).await?;
            let history = app.checker.get_history(Some(&identity)).await;
            export::run_export(&history, format, output.as_deref())?;
        }
        Commands::Blog { action } => {
            let app = App::build(&cfg).await?;
            match action {
                BlogAction::List { search } => {
                    for p in app.blog.list(search.as_deref()).await? {
                        println!(
                            "{}  {:<40} {}",
                            p.created_at.format("%Y-%m-%d"),
                            p.slug,
                            p.title
                        );
                    }
                }
                BlogAction::Show { slug } => {
                    let post = app.blog.get_by_slug(&slug).await?;
                    println!("{}", post.title);
                    println!("by {} on {}", post.author, post.created_at.format("%Y-%m-%d"));
                    println!();
                    println!("{}", post.content);
                    let related = app.blog.related(&slug).await?;
                    if !related.is_empty() {
                        println!();
                        println!("Related:");
                        for r in related {
                            println!("  {}  {}", r.slug, r.title);
                        }
                    }
                }
                BlogAction::Create {
                    title,
                    content,
                    content_file,
                    slug,
                    excerpt,
                    author,
                } => {
                    let content = match content_file {
                        Some(path) => std::fs::read_to_string(&path)?,
                        None => content.unwrap_or_default(),
                    };
                    let draft = BlogDraft {
                        title,
                        content,
                        slug,
                        excerpt,
                        author,
                    };
                    let post = app.blog.create(&draft, Utc::now()).await?;
                    println!("Created {} ({})", post.slug, post.id);
                }
                BlogAction::Delete { id } => {
                    app.blog.delete(&id).await?;
                    println!("Deleted {}.", id);
                }
            }
        }
        Commands::Stats => {
            let app = App::build(&cfg).await?;
            stats::run_stats(&app).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
