//! Formation - reconciles location descriptors into orchestration state

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

use commands::LocationArgs;
use commands::run::RunOverrides;

#[derive(Parser)]
#[command(name = "formation")]
#[command(author = "Formation Contributors")]
#[command(version)]
#[command(about = "Reconciles location descriptors into orchestration state", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the controller against the current cluster
    Run {
        /// Controller settings file
        #[arg(short, long, env = "FORMATION_CONFIG")]
        config: Option<PathBuf>,

        /// Only watch this namespace
        #[arg(short, long, env = "FORMATION_NAMESPACE")]
        namespace: Option<String>,

        /// Maximum number of descriptors reconciled in parallel
        #[arg(long, env = "FORMATION_CONCURRENCY")]
        concurrency: Option<u16>,

        /// Seconds before a retriable failure is processed again
        #[arg(long, env = "FORMATION_REQUEUE_SECONDS")]
        requeue_seconds: Option<u64>,

        /// Port serving Prometheus metrics on /metrics
        #[arg(long, env = "FORMATION_METRICS_PORT")]
        metrics_port: Option<u16>,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Expand a descriptor offline and print the resulting state object
    Render {
        /// LocationDescriptor YAML file
        descriptor: PathBuf,

        /// Release data YAML file used for ${release:...} variables
        #[arg(short, long)]
        release: Option<PathBuf>,

        /// Controller settings file supplying the location
        #[arg(short, long, env = "FORMATION_CONFIG")]
        config: Option<PathBuf>,

        #[command(flatten)]
        location: LocationArgs,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    // Setup miette for nice error display; long messages stay on one line
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().wrap_lines(false).build())
    }));
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Run {
            config,
            namespace,
            concurrency,
            requeue_seconds,
            metrics_port,
            location,
        } => commands::run::run(
            config.as_deref(),
            RunOverrides {
                location: &location,
                namespace: namespace.as_deref(),
                concurrency,
                requeue_seconds,
                metrics_port,
            },
        ),

        Commands::Render {
            descriptor,
            release,
            config,
            location,
        } => commands::render::run(&descriptor, release.as_deref(), config.as_deref(), &location),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
