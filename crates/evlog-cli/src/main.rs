//! 🚀 evlog-cli: the front door of evlog.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary loads config, sets up logging, and runs one of three chores:
//! `setup` provisions the cluster, `ingest` pushes an NDJSON file through the
//! whole pipeline, and `query` asks who did what to whom. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use evlog::{
    AppConfig, ClientHandle, EventLogService, FindOptions, OwnerQuery, QueryGateway, QueryResult,
    SchemaProvisioner, SortOrder,
};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "evlog", version, about = "Buffered event logging into Elasticsearch")]
struct Cli {
    /// 🔧 TOML config file. Without one, only EVLOG_* environment variables are read.
    #[arg(long, short, env = "EVLOG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 🏗️ Create the lifecycle policy, index template and write alias if they're missing.
    Setup,
    /// 📥 Log every event in an NDJSON file, then drain and exit.
    Ingest {
        /// One JSON document per line.
        file: PathBuf,
    },
    /// 🔎 Find events by the entity that owns them.
    Query(QueryArgs),
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// Owner type, e.g. `alert`.
    #[arg(long = "type")]
    owner_type: String,
    /// Current owner ids.
    #[arg(long = "id")]
    ids: Vec<String>,
    /// Ids matched only against events written before 8.0.0.
    #[arg(long = "legacy-id")]
    legacy_ids: Vec<String>,
    #[arg(long)]
    namespace: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = 10)]
    per_page: u64,
    /// Inclusive lower bound on @timestamp.
    #[arg(long)]
    start: Option<String>,
    /// Inclusive upper bound on @timestamp.
    #[arg(long)]
    end: Option<String>,
    /// Filter expression in query-string syntax.
    #[arg(long)]
    filter: Option<String>,
    /// Newest first.
    #[arg(long)]
    desc: bool,
}

/// 🚀 main(): where it all begins. The "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = async move {
        // 🔒 a config path that doesn't exist is a typo, not a request for defaults
        if let Some(path) = &cli.config {
            let exists = path.try_exists().with_context(|| {
                format!("💀 Couldn't check whether the configuration file exists: '{}'", path.display())
            })?;
            if !exists {
                bail!(
                    "💀 Configuration file not found: '{}'. If it's a relative path, try an absolute one \
                     to rule out a cwd surprise.",
                    path.display()
                );
            }
        }
        let app_config = evlog::load_config(cli.config.as_deref())
            .context("💀 In evlog-cli, main, we couldn't load the configuration. Take a look at the file and the EVLOG_* variables.")?;
        run(cli.command, app_config).await
    }
    .await;

    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like Elasticsearch isn't reachable. \
                Double-check the url in [backend.elasticsearch] and that the cluster is running. \
                If you're using Docker, `docker ps` will tell you what's up. ☕"
            );
        }

        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Command, app_config: AppConfig) -> Result<()> {
    match command {
        Command::Setup => setup(app_config).await,
        Command::Ingest { file } => ingest(app_config, file).await,
        Command::Query(args) => query(app_config, args).await,
    }
}

async fn setup(app_config: AppConfig) -> Result<()> {
    let client = ClientHandle::connect(app_config.backend);
    let provisioner = SchemaProvisioner::new(client, &app_config.schema);
    provisioner.initialize().await.context("💀 setup failed")?;
    let names = provisioner.names();
    println!("✅ event log ready: write alias {}, policy {}, template {}", names.alias, names.ilm_policy, names.index_template);
    Ok(())
}

async fn ingest(app_config: AppConfig, file: PathBuf) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("💀 couldn't read events from '{}'", file.display()))?;
    let events = evlog::ndjson::parse_events(&bytes)
        .with_context(|| format!("💀 '{}' isn't valid NDJSON", file.display()))?;
    info!("📜 read {} events from {}", events.len(), file.display());

    let service = EventLogService::start(&app_config);
    if !service.wait_until_ready().await {
        service.shutdown().await?;
        bail!("💀 the event log could not be provisioned; nothing was ingested (see the error above)");
    }

    let logger = service.logger();
    for event in events {
        logger.log_event(event);
    }
    service.shutdown().await.context("💀 draining the event buffer failed")?;

    let stats = service.buffer_stats();
    println!(
        "✅ ingested {} events into {} in {} bulk requests",
        stats.submitted,
        logger.index(),
        stats.batches
    );
    Ok(())
}

async fn query(app_config: AppConfig, args: QueryArgs) -> Result<()> {
    if args.ids.is_empty() && args.legacy_ids.is_empty() {
        bail!("💀 give at least one --id or --legacy-id; a query for nobody finds nothing");
    }
    let gateway = QueryGateway::with_query_string_filters(ClientHandle::connect(app_config.backend));
    let owner_query = OwnerQuery {
        // -- every version's indices, not just the current write alias
        index: app_config.schema.names().index_pattern,
        namespace: args.namespace,
        owner_type: args.owner_type,
        ids: args.ids,
        legacy_ids: args.legacy_ids,
        find_options: FindOptions {
            page: args.page,
            per_page: args.per_page,
            start: args.start,
            end: args.end,
            sort_order: if args.desc { SortOrder::Desc } else { SortOrder::Asc },
            filter: args.filter,
            ..FindOptions::default()
        },
    };
    let result = gateway.query_by_owner(&owner_query).await?;
    println!("{}", render_table(&result));
    Ok(())
}

fn render_table(result: &QueryResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["@timestamp", "action", "outcome", "message"]);
    for event in &result.data {
        let field = |pointer: &str| event.pointer(pointer).map(display_value).unwrap_or_default();
        table.add_row(vec![
            Cell::new(field("/@timestamp")),
            Cell::new(field("/event/action")),
            Cell::new(field("/event/outcome")),
            Cell::new(field("/message")),
        ]);
    }
    table.add_row(vec![Cell::new(format!(
        "page {} · {} of {} events",
        result.page,
        result.data.len(),
        result.total
    ))]);
    table
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
