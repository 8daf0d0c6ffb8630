//! flowcoord node binary

use clap::{Parser, Subcommand, ValueEnum};
use flowcoord::common::auth::TokenService;
use flowcoord::common::config::ClusterRole;
use flowcoord::{Config, Node};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flowcoord")]
#[command(about = "Cluster-aware mutation coordinator", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Coordinator,
    Follower,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node
    Serve {
        /// Config file (defaults to $FLOWCOORD_CONFIG)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Node ID
        #[arg(long)]
        id: Option<String>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<String>,

        /// Public base URL for resource URIs
        #[arg(long)]
        base_url: Option<String>,

        /// Enable clustering with this role
        #[arg(long, value_enum)]
        role: Option<RoleArg>,

        /// Coordinator base URL (followers)
        #[arg(long)]
        coordinator: Option<String>,
    },
    /// Issue a bearer token for a principal
    Token {
        /// HMAC secret shared with the nodes
        #[arg(long, env = "FLOWCOORD_JWT_SECRET")]
        secret: String,

        /// Principal identity
        #[arg(long)]
        principal: String,

        /// Lifetime in seconds
        #[arg(long, default_value = "86400")]
        ttl: u64,
    },
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            id,
            bind,
            base_url,
            role,
            coordinator,
        } => {
            // file and environment first, CLI has priority
            let mut config = Config::load(config.as_deref())?;
            if let Some(id) = id {
                config.node_id = id;
            }
            if let Some(bind) = bind {
                config.bind_addr = bind.parse()?;
            }
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            if let Some(role) = role {
                config.cluster.enabled = true;
                config.cluster.role = match role {
                    RoleArg::Coordinator => ClusterRole::Coordinator,
                    RoleArg::Follower => ClusterRole::Follower,
                };
            }
            if coordinator.is_some() {
                config.cluster.coordinator_url = coordinator;
            }
            config.validate()?;

            init_tracing(&config.log_level);
            Node::new(config)?.serve().await?;
        }
        Commands::Token {
            secret,
            principal,
            ttl,
        } => {
            let tokens = TokenService::new(secret.as_bytes());
            let token = tokens.issue(&principal, Some(Duration::from_secs(ttl)))?;
            println!("{}", token);
        }
    }

    Ok(())
}
