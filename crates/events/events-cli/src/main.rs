//! `schema-events` command line entry point.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schema_events::{EventError, EventSchema, SchemaSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for a schema that passed validation.
const EXIT_VALID: u8 = 0;
/// Exit code for input that could not be read or parsed into a mapping.
const EXIT_UNREADABLE: u8 = 1;
/// Exit code for a document that failed meta-schema validation.
const EXIT_INVALID: u8 = 2;

#[derive(Parser)]
#[command(name = "schema-events")]
#[command(about = "Tools for schema-validated structured events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a SCHEMA against the event meta-schema.
    ///
    /// SCHEMA can be a JSON/YAML string or a path to a schema file.
    Validate {
        /// Schema file path, or the schema itself as JSON/YAML text
        schema: String,
    },
}

fn main() -> ExitCode {
    // Diagnostics go to stderr; stdout carries the report.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { schema } => validate(&schema),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_UNREADABLE)
        }
    }
}

fn validate(arg: &str) -> anyhow::Result<u8> {
    let source = SchemaSource::infer(arg);
    tracing::debug!(?source, "Loading schema");

    rule("Validating the following schema");
    // Load without validating, so the document can be shown first.
    let document = match source.load() {
        Ok(document) => document,
        Err(err @ EventError::SchemaFileAbsent(_)) => {
            println!("{err}");
            return Ok(EXIT_UNREADABLE);
        }
        Err(err) if err.is_schema_error() => {
            println!("The input could not be loaded as a schema.\n");
            println!("    {err}");
            return Ok(EXIT_UNREADABLE);
        }
        Err(err) => return Err(err.into()),
    };
    println!();
    for line in serde_json::to_string_pretty(&document)?.lines() {
        println!("    {line}");
    }
    println!();

    rule("Results");
    match EventSchema::from_document(document) {
        Ok(schema) => {
            tracing::info!(schema_id = schema.id(), version = schema.version(), "Schema is valid");
            println!("\u{2714} Nice work! This schema is valid.");
            Ok(EXIT_VALID)
        }
        Err(err) if err.is_schema_error() => {
            println!("\u{274c} The schema failed to validate.\n");
            println!("We found the following error with your schema:\n");
            println!("    {err}");
            Ok(EXIT_INVALID)
        }
        Err(err) => Err(err.into()),
    }
}

fn rule(title: &str) {
    println!("{:-^60}", format!(" {title} "));
}
