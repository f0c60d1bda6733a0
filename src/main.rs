//! stackctl - Portainer stack deployment
//!
//! This is the main CLI entry point for stackctl.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use stackctl::config::{endpoint_from_raw, AgentConfig};
use stackctl::deploy::StackDeployer;
use stackctl::portainer::BearerToken;
use stackctl::stackfile::StackFileParser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// stackctl - create or update Portainer swarm stacks
#[derive(Parser)]
#[command(name = "stackctl")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Create or update Portainer swarm stacks", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Portainer URL
    #[arg(long, global = true)]
    url: Option<String>,
    /// Portainer username
    #[arg(long, global = true)]
    username: Option<String>,
    /// Portainer password
    #[arg(long, global = true)]
    password: Option<String>,
    /// Endpoint id (negative means the first endpoint)
    #[arg(long, global = true, allow_negative_numbers = true)]
    endpoint_id: Option<i64>,
}

impl ConnectionArgs {
    fn apply(self, config: &mut AgentConfig) {
        if let Some(url) = self.url {
            config.portainer.url = url;
        }
        if let Some(username) = self.username {
            config.portainer.username = username;
        }
        if let Some(password) = self.password {
            config.portainer.password = password;
        }
        if let Some(id) = self.endpoint_id {
            config.portainer.endpoint_id = endpoint_from_raw(id);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the stack, or update it if it already exists
    Deploy {
        /// Stack name
        #[arg(short = 'n', long)]
        stack_name: Option<String>,
        /// Compose file (YAML or JSON)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List stacks
    Stacks,

    /// Show the first endpoint id
    Endpoint,

    /// Show the swarm id of an endpoint
    Swarm,
}

async fn login(deployer: &StackDeployer) -> Result<BearerToken> {
    let credentials = deployer.credentials();
    deployer
        .client()
        .authenticate(&credentials.username, &credentials.password)
        .await
        .context("authenticating with Portainer")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = AgentConfig::load_or_default(cli.config.as_deref())
        .context("loading configuration")?;
    config.apply_env()?;
    cli.connection.apply(&mut config);
    config.validate()?;

    let deployer = StackDeployer::from_config(&config.portainer)?;

    match cli.command {
        Commands::Deploy { stack_name, file } => {
            let stack_name = stack_name
                .or(config.stack_name)
                .context("no stack name given (--stack-name or stack_name in config)")?;
            let file = file
                .or(config.stack_file)
                .context("no stack file given (--file or stack_file in config)")?;

            let stack_config = StackFileParser::parse_file(&file)
                .with_context(|| format!("loading stack file {}", file.display()))?;

            let outcome = deployer
                .deploy(&stack_name, &stack_config)
                .await
                .with_context(|| format!("deploying stack {}", stack_name))?;
            println!("{}", outcome);
        }

        Commands::Stacks => {
            let token = login(&deployer).await?;
            let stacks = deployer.client().list_stacks(&token).await?;

            println!("{:<24} NAME", "ID");
            for stack in stacks {
                println!("{:<24} {}", stack.id, stack.name);
            }
        }

        Commands::Endpoint => {
            let token = login(&deployer).await?;
            let id = deployer.client().get_first_endpoint_id(&token).await?;
            println!("{}", id);
        }

        Commands::Swarm => {
            let token = login(&deployer).await?;
            let swarm_id = deployer
                .client()
                .get_swarm_id(&token, config.portainer.endpoint_id)
                .await?;
            println!("{}", swarm_id);
        }
    }

    Ok(())
}
