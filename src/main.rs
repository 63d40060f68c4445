//! `etcd-bind`: inspect an etcd v2 store and exercise configuration binding.
//!
//! ```text
//! etcd-bind [--config etcd-bind.toml] get <path> [--recursive]
//! etcd-bind watch <path> [--count N]
//! etcd-bind demo-save
//! etcd-bind demo-load
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use etcd_bind::config::load_config;
use etcd_bind::observability::{logging, metrics};
use etcd_bind::{Client, EtcdBindConfig, EtcdClient, Store};

#[derive(Parser)]
#[command(name = "etcd-bind")]
#[command(about = "Bind typed configuration to an etcd v2 store", long_about = None)]
struct Cli {
    /// TOML settings file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node at a path as JSON
    Get {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print changes below a path as they happen
    Watch {
        path: String,
        /// Stop after this many changes (0 = until interrupted)
        #[arg(short = 'n', long, default_value_t = 0)]
        count: u64,
    },
    /// Save the demo service settings under /etcd-bind-demo
    DemoSave,
    /// Load the demo service settings from /etcd-bind-demo and print them
    DemoLoad,
}

#[derive(Debug, Default)]
struct Upstream {
    host: String,
    port: i32,
}

etcd_bind::bind!(Upstream {
    host => "/host",
    port => "/port",
});

#[derive(Debug, Default)]
struct ServiceSettings {
    name: String,
    max_body_bytes: i64,
    debug: bool,
    primary: Upstream,
    replicas: Vec<Upstream>,
    tags: Vec<String>,
    labels: HashMap<String, String>,
}

etcd_bind::bind!(ServiceSettings {
    name => "/name",
    max_body_bytes => "/max_body_bytes",
    debug => "/debug",
    primary => "/primary",
    replicas => "/replicas",
    tags => "/tags",
    labels => "/labels",
});

#[derive(Debug, Default)]
struct DemoRoot {
    service: ServiceSettings,
}

etcd_bind::bind!(DemoRoot { service => "/etcd-bind-demo" });

fn demo_value() -> DemoRoot {
    DemoRoot {
        service: ServiceSettings {
            name: "checkout".to_string(),
            max_body_bytes: 1 << 20,
            debug: false,
            primary: Upstream {
                host: "10.0.0.10".to_string(),
                port: 8080,
            },
            replicas: vec![
                Upstream {
                    host: "10.0.0.11".to_string(),
                    port: 8080,
                },
                Upstream {
                    host: "10.0.0.12".to_string(),
                    port: 8080,
                },
            ],
            tags: vec!["payments".to_string(), "critical".to_string()],
            labels: HashMap::from([
                ("team".to_string(), "billing".to_string()),
                ("zone".to_string(), "eu-west-1".to_string()),
            ]),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_config(path)?,
        None => EtcdBindConfig::default(),
    };

    logging::init(&settings.observability.log_level);
    tracing::info!(
        machines = ?settings.store.machines,
        default_ttl_secs = settings.store.default_ttl_secs,
        "etcd-bind v0.1.0 starting"
    );

    if settings.observability.metrics_enabled {
        if let Ok(addr) = settings.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    match cli.command {
        Commands::Get { path, recursive } => {
            let store = EtcdClient::new(&settings.store, &settings.retries)?;
            let node = store.get(&path, true, recursive).await?;
            println!("{}", serde_json::to_string_pretty(&node)?);
        }
        Commands::Watch { path, count } => {
            let store = EtcdClient::new(&settings.store, &settings.retries)?;
            watch_loop(&store, &path, count).await?;
        }
        Commands::DemoSave => {
            let client = Client::connect(&settings, demo_value())?;
            client.save().await?;
            println!("saved {} fields", client.registry().len());
        }
        Commands::DemoLoad => {
            let client = Client::connect(&settings, DemoRoot::default())?;
            client.load().await?;
            let config = client.config();
            println!("{:#?}", config.lock().await.service);
        }
    }

    Ok(())
}

/// Re-subscribe after every change until `count` changes were printed.
async fn watch_loop(store: &EtcdClient, path: &str, count: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut since = store.get(path, false, true).await?.max_modified_index() + 1;
    let mut seen = 0u64;

    while count == 0 || seen < count {
        let node = tokio::select! {
            result = store.watch(path, Some(since), true) => result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping watch");
                break;
            }
        };
        since = node.modified_index + 1;
        seen += 1;
        println!("{}", serde_json::to_string(&node)?);
    }

    Ok(())
}
