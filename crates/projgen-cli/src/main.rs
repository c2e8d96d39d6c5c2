mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{build::BuildArgs, projects::ProjectsSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "projgen",
    about = "Generate starter projects with an LLM agent and serve their build status",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from projgen.yaml)
    #[arg(long, global = true, env = "PROJGEN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default projgen.yaml and create the projects directory
    Init,

    /// Run the HTTP build service
    Serve {
        /// Port to listen on (default: server.port from projgen.yaml)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Build one project in-process and wait for the result
    Build(BuildArgs),

    /// Extract the filename-to-content object from raw model output
    Extract {
        /// File holding the raw output (default: stdin)
        file: Option<PathBuf>,
    },

    /// Inspect generated projects
    Projects {
        #[command(subcommand)]
        subcommand: ProjectsSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Build(args) => cmd::build::run(&root, args, cli.json),
        Commands::Extract { file } => cmd::extract::run(file.as_deref(), cli.json),
        Commands::Projects { subcommand } => cmd::projects::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
