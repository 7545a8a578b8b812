//! Warden operator CLI
//!
//! Offline tooling around the provisioning core:
//! - Validate a configuration file and its layered overrides
//! - List the clusters a configuration registers
//! - Render the manifest a request would produce, without applying it

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use warden_observability::init_tracing;
use warden_registry::{ClusterRegistry, InMemoryClusterRegistry};
use warden_types::{
    Environment, NamespaceName, PrincipalId, PrincipalType, PrincipalValidationResult,
    ProvisionRequest, TeamName,
};

use warden_provisioner::{GrantInput, GrantManifestBuilder, WardenConfig};

/// Warden CLI
#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - Namespace access-grant provisioning", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<String>,

    /// Log level, overriding the configured one
    #[arg(long, env = "WARDEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "WARDEN_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration
    CheckConfig,

    /// List configured clusters
    Clusters {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Render the manifest for a provisioning request
    Render {
        /// JSON file holding the request
        #[arg(short, long)]
        request: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = WardenConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let mut logging = config.logging.clone();
    if let Some(level) = &cli.log_level {
        logging.log_level = level.clone();
    }
    if cli.json {
        logging.json_format = true;
    }
    init_tracing(&logging)?;

    match cli.command {
        Commands::CheckConfig => check_config(&config),
        Commands::Clusters { json } => clusters(&config, json),
        Commands::Render { request } => render(&config, &request),
    }
}

fn check_config(config: &WardenConfig) -> Result<()> {
    info!(
        clusters = config.clusters.len(),
        roles = config.roles.len(),
        "Configuration valid"
    );
    println!("configuration ok");
    println!("  clusters:          {}", config.clusters.len());
    println!(
        "  roles:             {} (table {})",
        config.roles.keys().join(", "),
        config.roles.version
    );
    println!("  resource namespace: {}", config.control_plane_namespace);
    println!(
        "  approvers:         {}",
        if config.approval.approvers.is_empty() {
            "-".to_string()
        } else {
            config.approval.approvers.join(", ")
        }
    );
    Ok(())
}

fn clusters(config: &WardenConfig, json: bool) -> Result<()> {
    let registry = InMemoryClusterRegistry::from_configurations(config.cluster_configurations())?;
    let clusters = registry.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&clusters)?);
        return Ok(());
    }

    if clusters.is_empty() {
        println!("no clusters configured");
        return Ok(());
    }
    println!("{:<32} {:<12} {:<16} DEFAULT", "NAME", "ENVIRONMENT", "REGION");
    for cluster in clusters {
        println!(
            "{:<32} {:<12} {:<16} {}",
            cluster.name,
            cluster.environment,
            cluster.region,
            if cluster.is_default { "yes" } else { "" }
        );
    }
    Ok(())
}

fn render(config: &WardenConfig, path: &PathBuf) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read request {}", path.display()))?;
    let request: ProvisionRequest =
        serde_json::from_str(&raw).context("request is not a valid provisioning request")?;

    let namespace = NamespaceName::parse(&request.namespace)?;
    let team = TeamName::parse(&request.team)?;
    let environment: Environment = request.environment.parse()?;
    let principal_id = PrincipalId::parse(&request.principal_id)?;

    let registry = InMemoryClusterRegistry::from_configurations(config.cluster_configurations())?;
    let cluster_name = request
        .cluster_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let cluster = registry.resolve(cluster_name)?;

    // Rendering never contacts the directory.
    let principal_type = request.principal_type.unwrap_or(PrincipalType::User);
    let principal = PrincipalValidationResult::verified(principal_id, principal_type, "")
        .with_note("not looked up: offline render");

    let builder = GrantManifestBuilder::new(config.roles.clone(), config.control_plane_namespace.clone());
    let manifest = builder.build(&GrantInput {
        namespace: &namespace,
        team: &team,
        environment,
        cluster: &cluster,
        principal: &principal,
        role_key: &request.role_key,
    })?;

    if manifest.resources.is_empty() {
        bail!("request produced no resources");
    }

    let rendered = serde_json::json!({
        "grant": manifest.grant,
        "resources": manifest.resources,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}
