//! Model Validator CLI
//!
//! Validates JSON documents against schemas loaded from a schema file and
//! renders schemas as interchange documents.

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use familiar_models::{loader, EngineConfig, ErrorFormat, RefMode, SchemaRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-validate")]
#[command(about = "Validate documents against model schemas")]
struct Cli {
    /// Schema file (JSON)
    #[arg(short, long)]
    schemas: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSON document against a schema
    Check {
        /// Schema name
        schema: String,
        /// Input document (JSON)
        input: PathBuf,
        /// Error format: detailed, simple or minimal
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Render a schema as an interchange document
    Render {
        /// Schema name
        schema: String,
        /// Inline referenced schemas instead of emitting $defs
        #[arg(long)]
        inline: bool,
        /// Provider profile from the configuration
        #[arg(short, long)]
        provider: Option<String>,
        /// Output file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the schemas in the schema file
    List,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn parse_format(format: &str) -> Result<ErrorFormat, String> {
    match format {
        "detailed" => Ok(ErrorFormat::Detailed),
        "simple" => Ok(ErrorFormat::Simple),
        "minimal" => Ok(ErrorFormat::Minimal),
        other => Err(format!("unknown error format '{}'", other)),
    }
}

/// Returns `Ok(false)` when the input did not validate
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = EngineConfig::load_from(cli.config.as_deref())?;
    let mut registry = SchemaRegistry::new();
    loader::load_into(&mut registry, &cli.schemas, &config.defaults)?;

    match cli.command {
        Commands::Check { schema, input, format } => {
            let definition = registry.require(&schema)?;
            let format = match format {
                Some(f) => parse_format(&f)?,
                None => definition.config().error_format,
            };
            let content = std::fs::read_to_string(&input)?;
            let value: serde_json::Value = serde_json::from_str(&content)?;

            match registry.validate_value(&schema, &value)? {
                Ok(validated) => {
                    println!("✅ {} is valid", input.display());
                    println!("{}", serde_json::to_string_pretty(&validated.record)?);
                    Ok(true)
                }
                Err(errors) => {
                    println!("❌ {} - {} error(s)", input.display(), errors.len());
                    for line in errors.render(format) {
                        println!("   └─ {}", line);
                    }
                    Ok(false)
                }
            }
        }

        Commands::Render { schema, inline, provider, output } => {
            let mut options = config.resolve_options(provider.as_deref())?;
            if inline {
                options.ref_mode = RefMode::Inline;
            }
            let document = registry.render(&schema, &options)?;
            let rendered = serde_json::to_string_pretty(&document)?;

            if let Some(path) = output {
                std::fs::write(&path, &rendered)?;
                println!("✅ Document written to {:?}", path);
            } else {
                println!("{}", rendered);
            }
            Ok(true)
        }

        Commands::List => {
            let recursive = registry.recursive_schemas();
            for definition in registry.iter() {
                let marker = if recursive.contains(definition.name()) {
                    " (recursive)"
                } else {
                    ""
                };
                println!(
                    "  {} - {} fields, {} required{}",
                    definition.name(),
                    definition.fields().len(),
                    definition.required_field_names().len(),
                    marker
                );
            }
            Ok(true)
        }
    }
}
