use anyhow::Context as _;
use clap::Parser;
use rmcp::ServiceExt as _;
use std::path::PathBuf;
use tracing::{error, info};
use unrelated_api_adapter::logging::{self, LogFormat};
use unrelated_api_adapter::{AdapterServer, Configuration, ItemService, ToolDispatcher};

/// Expose an external items API as MCP tools over stdio.
#[derive(Debug, Parser)]
#[command(name = "unrelated-api-adapter", version, about)]
struct Args {
    /// Optional dotenv file; process environment variables take precedence.
    #[arg(long, env = "ADAPTER_ENV_FILE", default_value = ".env")]
    env_file: PathBuf,

    /// Log level or filter directive (`RUST_LOG` overrides it).
    #[arg(long, env = "ADAPTER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "ADAPTER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level, args.log_format)?;

    let config = match Configuration::resolve(Some(args.env_file.as_path())) {
        Ok(c) => c,
        Err(e) => {
            error!(category = %e.category(), error = %e, "invalid configuration");
            return Err(e).context("resolve configuration");
        }
    };
    info!(
        endpoint = %config.endpoint,
        page_size = config.page_size,
        max_pages = config.max_pages,
        "configuration resolved"
    );

    let (service, client) = ItemService::connect(&config).context("connect to external API")?;
    let server = AdapterServer::new(ToolDispatcher::new(service));

    let outcome = async {
        let running = server
            .serve(rmcp::transport::stdio())
            .await
            .context("start MCP stdio server")?;
        let reason = running.waiting().await.context("MCP server task failed")?;
        info!(?reason, "MCP session ended");
        anyhow::Ok(())
    }
    .await;

    client.close();
    outcome
}
