//! plsql2pg CLI
//!
//! Entry point for the command-line tool. One unit per invocation: read an
//! Oracle source file, translate it against the extractor's catalog, print
//! PostgreSQL DDL to stdout (or a file). Diagnostics and warnings go to
//! stderr as text or JSON.

use anyhow::{Context, Result, bail};
use clap::Parser;
use plsql2pg::{Config, Diagnostics, Translated, Transpiler, TriggerEvent, TriggerKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plsql2pg")]
#[command(about = "Oracle PL/SQL to PostgreSQL PL/pgSQL transpiler", long_about = None)]
struct Args {
    /// Oracle source file to translate
    input: PathBuf,

    /// Path to configuration file
    #[arg(short, long, default_value = "plsql2pg.toml")]
    config: PathBuf,

    /// Catalog JSON produced by the metadata extractor
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Unit kind: view, function, procedure, package-member, trigger-body
    #[arg(short, long, default_value = "view")]
    kind: String,

    /// Current schema (defaults to the configured default_schema)
    #[arg(short, long)]
    schema: Option<String>,

    /// Enclosing package, for kind=package-member
    #[arg(long)]
    package: Option<String>,

    /// Trigger name, for kind=trigger-body
    #[arg(long)]
    trigger_name: Option<String>,

    /// Trigger fires per statement instead of per row
    #[arg(long)]
    statement_level: bool,

    /// Trigger event: insert, update, delete
    #[arg(long, default_value = "update")]
    event: String,

    /// Write the emitted DDL here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override diagnostic format (text, json)
    #[arg(long)]
    format: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Load configuration
    let config = if args.config.exists() {
        Config::from_file(&args.config).context("Failed to load configuration")?
    } else {
        eprintln!(
            "Warning: Config file {} not found, using defaults",
            args.config.display()
        );
        Config::default()
    };

    let catalog = match &args.catalog {
        Some(path) => plsql2pg::Catalog::from_json_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => {
            eprintln!("Warning: no catalog given, resolving against an empty one");
            plsql2pg::Catalog::new()
        }
    };

    let schema = args
        .schema
        .clone()
        .unwrap_or_else(|| config.transpile.default_schema.clone());
    let format = args
        .format
        .clone()
        .unwrap_or_else(|| config.output.format.clone());

    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let mut transpiler = Transpiler::new(catalog, config);
    let result = run_translation(&mut transpiler, &args, &source, &schema)?;

    match result {
        Ok(translated) => {
            report_warnings(&translated, &format);
            match &args.output {
                Some(path) => std::fs::write(path, &translated.sql)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{}", ensure_trailing_newline(translated.sql)),
            }
            Ok(())
        }
        Err(diagnostics) => {
            report_failure(&diagnostics, &format);
            std::process::exit(1);
        }
    }
}

/// Dispatch on the requested kind. The outer `Result` is CLI usage errors;
/// the inner one is the translation outcome.
fn run_translation(
    transpiler: &mut Transpiler,
    args: &Args,
    source: &str,
    schema: &str,
) -> Result<std::result::Result<Translated, Diagnostics>> {
    let result = match args.kind.as_str() {
        "view" => transpiler.translate_view(source, schema),
        "function" => transpiler.translate_function(source, schema),
        "procedure" => transpiler.translate_procedure(source, schema),
        "package-member" => {
            let Some(package) = &args.package else {
                bail!("--package is required for kind=package-member");
            };
            transpiler.translate_package_member(source, schema, package)
        }
        "trigger-body" => {
            let Some(trigger_name) = &args.trigger_name else {
                bail!("--trigger-name is required for kind=trigger-body");
            };
            let event = match args.event.as_str() {
                "insert" => TriggerEvent::Insert,
                "update" => TriggerEvent::Update,
                "delete" => TriggerEvent::Delete,
                other => bail!("unknown trigger event: {other}"),
            };
            transpiler.translate_trigger(
                source,
                schema,
                trigger_name,
                TriggerKind {
                    row_level: !args.statement_level,
                    event,
                },
            )
        }
        other => bail!("unknown kind: {other}"),
    };
    Ok(result)
}

fn report_warnings(translated: &Translated, format: &str) {
    if translated.warnings.is_empty() {
        return;
    }
    if format == "json" {
        if let Ok(json) = serde_json::to_string(&translated.warnings) {
            eprintln!("{json}");
        }
        return;
    }
    for warning in &translated.warnings {
        eprintln!("warning (line {}): {}", warning.line, warning.message);
    }
}

fn report_failure(diagnostics: &Diagnostics, format: &str) {
    if format == "json" {
        if let Ok(json) = serde_json::to_string(diagnostics) {
            eprintln!("{json}");
        }
        return;
    }
    eprintln!("error: {diagnostics}");
    if let Some(object) = &diagnostics.object {
        eprintln!("  object: {object}");
    }
}

fn ensure_trailing_newline(mut sql: String) -> String {
    if !sql.ends_with('\n') {
        sql.push('\n');
    }
    sql
}
