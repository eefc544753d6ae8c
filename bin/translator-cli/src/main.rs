//! Translator CLI - Admin Command Line Interface
//!
//! Resolves display values through the same cache chain the engine uses and
//! prints the effective configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use translator_common::TranslatorConfig;
use translator_core::{FieldSpec, Param, SqliteLookup, Translator};

#[derive(Parser, Debug)]
#[command(name = "translator-cli")]
#[command(about = "Display-value translator admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dictionary database (SQLite)
    #[arg(short, long, default_value = "dict.db")]
    database: PathBuf,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve one set of association values to a display value
    Resolve {
        /// Dictionary code
        #[arg(long, conflicts_with = "sql", required_unless_present = "sql")]
        dict_code: Option<String>,

        /// Use the English dictionary template
        #[arg(long, requires = "dict_code")]
        english: bool,

        /// Literal query with one `?` per value
        #[arg(long)]
        sql: Option<String>,

        /// Template parameter substituted into `{0}`, `{1}`, ... of the query
        #[arg(long = "param", requires = "sql")]
        params: Vec<String>,

        /// Cache key prefix for a literal query
        #[arg(long, requires = "sql")]
        prefix: Option<String>,

        /// Association values, bound to the query in order
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TranslatorConfig::load(args.config.as_deref()).with_context(|| {
        format!(
            "failed to load configuration{}",
            args.config
                .as_ref()
                .map(|p| format!(" from {}", p.display()))
                .unwrap_or_default()
        )
    })?;

    match args.command {
        Commands::Resolve {
            dict_code,
            english,
            sql,
            params,
            prefix,
            values,
        } => {
            info!(database = %args.database.display(), "Using dictionary database");
            let translator =
                Translator::from_config(&config, Arc::new(SqliteLookup::new(&args.database)));

            let associations = (0..values.len()).map(|i| format!("value{i}"));
            let (target, spec) = match (dict_code, sql) {
                (Some(code), _) => {
                    let target = if english { "display_en_name" } else { "display_name" };
                    (target, FieldSpec::associated(associations).dict_code(code))
                }
                (None, Some(sql)) => {
                    let mut spec = FieldSpec::associated(associations)
                        .sql(sql)
                        .template_params(params);
                    if let Some(prefix) = prefix {
                        spec = spec.cache_key_prefix(prefix);
                    }
                    ("display_name", spec)
                }
                (None, None) => anyhow::bail!("either --dict-code or --sql is required"),
            };

            let query = translator.compile(target, &spec)?;
            debug!(sql = %query.sql, prefix = %query.prefix, "Compiled query");

            let values: Vec<Param> = values.into_iter().map(Param::Text).collect();
            match translator.resolve(&query, &values) {
                Some(display) => println!("{display}"),
                None => println!("<none>"),
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
