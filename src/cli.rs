//! Command-line surface: argument types and command handlers.

use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_CONFIG_FILE, GatewayConfig};
use crate::introspection::{HttpIntrospectionClient, Introspector};
use crate::persistence::RegistryManager;
use crate::registration::{self, RegistrationRequest};
use crate::router::QueryRouter;
use crate::schema_registry::{SchemaRegistry, ServerRecord};
use crate::{Error, Result, server};

#[derive(Parser, Debug)]
#[command(name = "kastql", version, about = "A single-endpoint GraphQL gateway", long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, env = "KASTQL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Register a GraphQL server for introspection and routing.
    Register {
        /// Unique server ID.
        #[arg(short, long)]
        id: String,

        /// Server name.
        #[arg(short, long)]
        name: String,

        /// GraphQL server endpoint URL.
        #[arg(short, long)]
        endpoint: String,

        /// Server description.
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List registered GraphQL servers and their status.
    List,

    /// Remove a server from the registry.
    Remove {
        #[arg(short, long)]
        id: String,
    },

    /// Make a server eligible for routing again.
    Activate {
        #[arg(short, long)]
        id: String,
    },

    /// Keep a server registered but stop routing to it.
    Deactivate {
        #[arg(short, long)]
        id: String,
    },

    /// Re-introspect a server and replace its stored schema.
    Refresh {
        #[arg(short, long)]
        id: String,
    },

    /// Probe every registered endpoint.
    Status,

    /// Write a default configuration file.
    Init {
        /// Output file path.
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Initialise tracing-based logging.
///
/// `RUST_LOG` wins, then the verbosity flags, then the configured level.
pub fn init_logging(verbose: bool, quiet: bool, log_level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // A subscriber may already be installed (e.g. in tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run(command: Command, config: GatewayConfig) -> Result<()> {
    match command {
        Command::Serve { port, host } => serve(config, port, host).await,
        Command::Register {
            id,
            name,
            endpoint,
            description,
        } => {
            register(
                &config,
                RegistrationRequest {
                    id,
                    name,
                    endpoint,
                    description,
                },
            )
            .await
        }
        Command::List => list(&config).await,
        Command::Remove { id } => {
            mutate(&config, |registry| async move { registry.remove_server(&id).await }).await
        }
        Command::Activate { id } => {
            mutate(&config, |registry| async move { registry.activate_server(&id).await }).await
        }
        Command::Deactivate { id } => {
            mutate(&config, |registry| async move { registry.deactivate_server(&id).await })
                .await
        }
        Command::Refresh { id } => {
            let introspector = HttpIntrospectionClient::with_timeout(config.request_timeout())?;
            mutate(&config, |registry| async move {
                registration::refresh_server(&introspector, registry.as_ref(), &id).await
            })
            .await
        }
        Command::Status => status(&config).await,
        Command::Init { file, force } => init(&file, force),
    }
}

async fn serve(config: GatewayConfig, port: Option<u16>, host: Option<String>) -> Result<()> {
    let manager = RegistryManager::new(&config);
    let registry = Arc::new(manager.load().await?);
    info!(
        servers = registry.server_count().await,
        active = registry.active_server_count().await,
        path = %manager.registry_path().display(),
        "registry loaded"
    );

    let router = Arc::new(QueryRouter::over_http(
        registry,
        config.field_extractor,
        config.request_timeout(),
    )?);

    let host = host.unwrap_or(config.host);
    let port = port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::config(format!("invalid listen address {host}:{port}: {e}")))?;

    let listener = TcpListener::bind(addr).await?;
    info!("KastQL gateway listening on http://{addr}");
    server::serve(listener, router).await?;
    Ok(())
}

async fn register(config: &GatewayConfig, request: RegistrationRequest) -> Result<()> {
    let manager = RegistryManager::new(config);
    let registry = manager.load().await?;
    let introspector = HttpIntrospectionClient::with_timeout(config.request_timeout())?;

    let server = registration::register_server(&introspector, &registry, request).await?;
    manager.save(&registry).await?;

    println!("✓ Successfully registered server '{}' ({})", server.name, server.id);
    println!("  Endpoint: {}", server.endpoint);
    if !server.description.is_empty() {
        println!("  Description: {}", server.description);
    }
    println!("  Registry saved to: {}", manager.registry_path().display());
    print_schema_summary(&server, "  ");
    Ok(())
}

async fn list(config: &GatewayConfig) -> Result<()> {
    let manager = RegistryManager::new(config);
    let registry = manager.load().await?;
    let servers = registry.all_servers().await;
    let total = registry.server_count().await;
    let active = registry.active_server_count().await;

    println!("KastQL Server Registry");
    println!("======================");
    println!("Registry File: {}", manager.registry_path().display());
    println!("Total Servers: {total}");
    println!("Active Servers: {active}");
    println!("Inactive Servers: {}", total - active);
    println!();

    if servers.is_empty() {
        println!("No servers registered.");
        println!("Use 'kastql register' to add a GraphQL server.");
        return Ok(());
    }

    for (i, server) in servers.iter().enumerate() {
        println!("{}. {} ({})", i + 1, server.name, server.id);
        println!("   Endpoint: {}", server.endpoint);
        if !server.description.is_empty() {
            println!("   Description: {}", server.description);
        }
        println!("   Status: {}", status_label(server.is_active));
        println!("   Added: {}", server.added_at.to_rfc3339());
        println!("   Updated: {}", server.updated_at.to_rfc3339());
        if server.schema.is_some() {
            println!("   Schema:");
            print_schema_summary(server, "     ");
        }
        println!();
    }
    Ok(())
}

// Load, apply one registry operation, save.
async fn mutate<F, Fut>(config: &GatewayConfig, op: F) -> Result<()>
where
    F: FnOnce(Arc<dyn SchemaRegistry>) -> Fut,
    Fut: Future<Output = Result<ServerRecord>>,
{
    let manager = RegistryManager::new(config);
    let registry: Arc<dyn SchemaRegistry> = Arc::new(manager.load().await?);

    let server = op(Arc::clone(&registry)).await?;
    manager.save(registry.as_ref()).await?;

    println!(
        "✓ {} ({}): {}",
        server.name,
        server.id,
        status_label(server.is_active)
    );
    Ok(())
}

async fn status(config: &GatewayConfig) -> Result<()> {
    let registry = RegistryManager::new(config).load().await?;
    let introspector = HttpIntrospectionClient::with_timeout(config.request_timeout())?;
    let servers = registry.all_servers().await;

    let probes = servers
        .iter()
        .map(|server| introspector.validate_endpoint(&server.endpoint));
    let results = join_all(probes).await;

    println!("KastQL status: {} server(s) registered", servers.len());
    for (server, result) in servers.iter().zip(results) {
        let reachability = match result {
            Ok(()) => "reachable".to_string(),
            Err(e) => format!("unreachable ({e})"),
        };
        println!(
            "  {} ({}) [{}] {}",
            server.name,
            server.endpoint,
            status_label(server.is_active),
            reachability
        );
    }
    Ok(())
}

fn init(file: &std::path::Path, force: bool) -> Result<()> {
    if file.exists() && !force {
        return Err(Error::config(format!(
            "{} already exists, pass --force to overwrite",
            file.display()
        )));
    }
    GatewayConfig::default().save(file)?;
    println!("✓ Wrote default configuration to {}", file.display());
    Ok(())
}

fn print_schema_summary(server: &ServerRecord, indent: &str) {
    let Some(schema) = &server.schema else {
        return;
    };
    let roots = [
        ("Query", &schema.query_type),
        ("Mutation", &schema.mutation_type),
        ("Subscription", &schema.subscription_type),
    ];
    for (label, root) in roots {
        if let Some(name) = root.as_ref().and_then(|r| r.name.as_deref()) {
            println!("{indent}{label} Type: {name}");
        }
    }
    println!("{indent}Total Types: {}", schema.types.len());
}

fn status_label(is_active: bool) -> &'static str {
    if is_active { "✓ Active" } else { "✗ Inactive" }
}
