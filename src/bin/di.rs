//! Distributed Interfaces CLI
//!
//! Compiles schema sources into the build directory and prints the derived
//! ledger, definition and linked models.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use distributed_interfaces::{
    build, compile, storage::Storage, Compilation, DiConfig, FsStorage, SchemaError,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "di")]
#[command(about = "Compile schemas into content-addressed interfaces")]
struct Cli {
    /// Configuration file layered over di.toml and DI__* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the schema and replace the build directory
    Build,

    /// Compile without writing and print the ledger
    Check,

    /// Print or write the definition summary
    Definition {
        /// Output file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print or write the linked models
    Linked {
        /// Output file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        #[arg(default_value = "di.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<SchemaError>() {
            Some(err) if err.is_schema_error() => eprintln!("❌ Schema rejected: {}", err),
            _ => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Config { command: ConfigCommands::Init { path, force } } = &cli.command {
        return init_config(path, *force);
    }

    let config = DiConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let build_config = config.build_config()?;
    let mut storage = FsStorage::new(config.schema_path(), config.build_path());

    match cli.command {
        Commands::Build => {
            println!("📦 Compiling {}...", config.schema_path().display());
            let compilation = build(&mut storage, &build_config)?;
            print_summary(&compilation);
            println!("✅ Build written to {}", storage.build_dir().display());
        }

        Commands::Check => {
            let compilation = compile(&storage.read_sources()?, &build_config)?;
            print_summary(&compilation);
            println!("{}", serde_json::to_string_pretty(&compilation.ledger)?);
        }

        Commands::Definition { output } => {
            let compilation = compile(&storage.read_sources()?, &build_config)?;
            emit(&serde_json::to_string_pretty(&compilation.definition)?, output.as_deref())?;
        }

        Commands::Linked { output } => {
            let compilation = compile(&storage.read_sources()?, &build_config)?;
            emit(&serde_json::to_string_pretty(&compilation.linked)?, output.as_deref())?;
        }

        Commands::Config { command: ConfigCommands::Show } => {
            println!("{}", toml::to_string_pretty(&config)?);
        }

        Commands::Config { command: ConfigCommands::Init { .. } } => {}
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to replace it)", path.display());
    }
    DiConfig::default().save(path)?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

fn print_summary(compilation: &Compilation) {
    for interface in &compilation.interfaces {
        let marker = if compilation.is_unchanged(&interface.name) {
            "  unchanged"
        } else {
            "  ✏️ "
        };
        println!("{} {} {}", marker, interface.file.to_upper(), interface.name);
    }
    println!(
        "📊 {} interface(s), {} unchanged",
        compilation.interfaces.len(),
        compilation.unchanged.len()
    );
}

fn emit(content: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("✅ Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
