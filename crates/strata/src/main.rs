mod commands;
mod context;
mod output;
mod resources;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use context::Project;
use std::path::PathBuf;
use strata_aws::AwsApi;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Declare AWS resources in YAML, reconcile them in place", long_about = None)]
struct Cli {
    /// Backend that serves the cloud API calls
    #[arg(
        short,
        long,
        value_enum,
        env = "STRATA_BACKEND",
        default_value = "sandbox",
        global = true
    )]
    backend: Backend,

    /// Resource file
    #[arg(
        short = 'f',
        long = "file",
        env = "STRATA_RESOURCES",
        default_value = "resources.yaml",
        global = true
    )]
    file: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Simulated cloud persisted under the state directory
    Sandbox,
    /// Real AWS APIs (requires the `sdk` feature)
    Aws,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the actions needed to reach the declared resources
    Plan,
    /// Apply the plan
    Apply {
        /// Apply without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Re-read every recorded resource and report drift
    Refresh,
    /// Delete one recorded resource, or all of them
    Destroy {
        /// Resource address (`type:name`); all resources when omitted
        address: Option<String>,
        /// Delete without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Adopt an existing remote object into state
    Import {
        /// Resource type (e.g. aws_api_gateway_stage)
        resource_type: String,
        /// Name to record the resource under
        name: String,
        /// Import id (e.g. `abc123/prod`)
        id: String,
    },
    /// Run a data source lookup
    Read {
        /// Data source type (e.g. aws_mskconnect_custom_plugin)
        data_source_type: String,
        /// Query as a JSON object
        query: String,
    },
    /// Check that the backend credentials match the configured account
    Auth,
    /// List supported resource and data source types
    Types,
    /// Inspect recorded state
    #[command(subcommand)]
    State(StateCommands),
    /// Work with import ids
    #[command(subcommand)]
    Id(IdCommands),
    /// Create parent objects in the sandbox backend
    #[command(subcommand)]
    Sandbox(SandboxCommands),
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum StateCommands {
    /// List recorded resources
    List,
    /// Show one recorded resource
    Show {
        /// Resource address (`type:name`)
        address: String,
    },
    /// Forget a recorded resource without deleting it
    Rm {
        /// Resource address (`type:name`)
        address: String,
    },
}

#[derive(Subcommand)]
pub enum IdCommands {
    /// Validate and normalize an import id
    Parse {
        /// Resource type
        resource_type: String,
        /// Import id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SandboxCommands {
    /// Create a REST API with one deployment
    RestApi { name: String },
    /// Add a deployment to a REST API
    Deployment { rest_api_id: String },
    /// Delete a REST API and its stages
    DeleteRestApi { rest_api_id: String },
    /// Create a Glue database
    GlueDatabase {
        name: String,
        /// Catalog id; defaults to the configured account
        #[arg(long)]
        catalog_id: Option<String>,
    },
    /// Create an IAM user
    IamUser { name: String },
    /// Create a customer managed IAM policy
    IamPolicy { name: String },
    /// Create an AppConfig application
    AppconfigApplication { name: String },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Version needs no project
    if matches!(cli.command, Commands::Version) {
        println!("strata {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let project = Project::open(cli.file.clone())?;

    // Commands that need no backend
    match &cli.command {
        Commands::Types => {
            commands::types::handle(&project);
            return Ok(());
        }
        Commands::Id(IdCommands::Parse { resource_type, id }) => {
            return commands::id::handle_parse(&project, resource_type, id);
        }
        Commands::State(state_cmd) => {
            return commands::state::handle(&project, state_cmd).await;
        }
        _ => {}
    }

    match cli.backend {
        Backend::Sandbox => {
            let cloud = project.open_sandbox().await?;
            let provider = project.provider(cloud);
            let outcome = match cli.command {
                Commands::Sandbox(sandbox_cmd) => {
                    commands::sandbox::handle(&project, provider.client(), sandbox_cmd)
                }
                command => run(&project, &provider, command).await,
            };
            // Persist even when the command failed part way
            project.save_sandbox(provider.client()).await?;
            outcome
        }
        Backend::Aws => run_aws(&project, cli.command).await,
    }
}

#[cfg(feature = "sdk")]
async fn run_aws(project: &Project, command: Commands) -> anyhow::Result<()> {
    if matches!(command, Commands::Sandbox(_)) {
        anyhow::bail!("sandbox commands need --backend sandbox");
    }
    let client = strata_aws::SdkClients::from_settings(&project.settings).await;
    let provider = project.provider(client);
    run(project, &provider, command).await
}

#[cfg(not(feature = "sdk"))]
async fn run_aws(_project: &Project, _command: Commands) -> anyhow::Result<()> {
    eprintln!(
        "{} this build has no AWS SDK backend",
        "Error:".red().bold()
    );
    eprintln!();
    eprintln!("{}", "Hint: rebuild with the sdk feature:".yellow());
    eprintln!("  cargo install --path crates/strata --features sdk");
    std::process::exit(1);
}

async fn run<C: AwsApi + 'static>(
    project: &Project,
    provider: &strata_aws::AwsProvider<C>,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Plan => commands::plan::handle(project, provider).await,
        Commands::Apply { yes } => commands::apply::handle(project, provider, yes).await,
        Commands::Refresh => commands::refresh::handle(project, provider).await,
        Commands::Destroy { address, yes } => {
            commands::destroy::handle(project, provider, address, yes).await
        }
        Commands::Import {
            resource_type,
            name,
            id,
        } => commands::import::handle(project, provider, &resource_type, &name, &id).await,
        Commands::Read {
            data_source_type,
            query,
        } => commands::read::handle(provider, &data_source_type, &query).await,
        Commands::Auth => commands::auth::handle(provider).await,
        Commands::Sandbox(_) => anyhow::bail!("sandbox commands need --backend sandbox"),
        Commands::Types | Commands::State(_) | Commands::Id(_) | Commands::Version => {
            unreachable!("handled before the backend is opened")
        }
    }
}
