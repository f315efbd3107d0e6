mod logging;

use anyhow::{Context as _, Result};
use arc_swap::ArcSwap;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tenantgate_auth::{SessionContext, authorize::build_authorize_url, login::login};
use tenantgate_config::{Config, ConfigWatcher};
use tenantgate_proxy::{AppState, AuthenticatedProxy, QueryTable, build_http_client};
use tenantgate_store::InMemoryCredentialStore;
use tenantgate_types::{GrantKind, HttpMethod, ProxyResult, RequestDescriptor};

const SQL_QUERY_PATH: &str = "/v1/data/query/sql";

#[derive(Parser, Debug)]
#[command(
    name = "tenantgate",
    about = "OAuth 2.0 login and authenticated calls against a tenant API"
)]
struct Cli {
    /// Path to the YAML configuration file. `TENANTGATE_*` env vars override it.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server.
    Serve {
        /// Override the listening port (default: 3000).
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the listening address (default: 127.0.0.1).
        #[arg(long)]
        host: Option<String>,
    },
    /// Log in and print the issued token grant.
    Login {
        #[command(flatten)]
        auth: LoginArgs,
    },
    /// Log in, then forward one call to the tenant API.
    Call {
        /// HTTP method (GET / POST / PUT).
        method: String,
        /// Path under the tenant host, e.g. `/v1/data/model/analytic-objects`.
        url: String,
        /// JSON request body.
        #[arg(long)]
        body: Option<String>,
        /// Extra request header, `Name: value`. Repeatable.
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        #[command(flatten)]
        auth: LoginArgs,
    },
    /// Log in, run a SQL query, and print the result as a table.
    Query {
        /// Query text.
        sql: String,
        /// Ask for CSV instead of JSON rows.
        #[arg(long)]
        csv: bool,
        #[command(flatten)]
        auth: LoginArgs,
    },
    /// Print the authorization URL for the code flow.
    AuthorizeUrl,
}

#[derive(clap::Args, Debug)]
struct LoginArgs {
    /// Grant to log in with (code / password / saml).
    #[arg(long, default_value = "password")]
    grant: String,
    /// File holding the base64 SAML response, for `--grant saml`.
    #[arg(long, value_name = "FILE")]
    assertion: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("config error: {e}"))?;
    logging::init(&config.log)?;

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(cli.config, config, port, host).await,
        Commands::Login { auth } => cmd_login(&config, &auth).await,
        Commands::Call {
            method,
            url,
            body,
            headers,
            auth,
        } => cmd_call(&config, &auth, &method, url, body, &headers).await,
        Commands::Query { sql, csv, auth } => cmd_query(&config, &auth, sql, csv).await,
        Commands::AuthorizeUrl => {
            println!("{}", build_authorize_url(&config.tenant.credentials())?);
            Ok(())
        }
    }
}

async fn cmd_serve(
    config_path: Option<PathBuf>,
    config: Config,
    port: Option<u16>,
    host: Option<String>,
) -> Result<()> {
    let shared = if let Some(path) = config_path {
        let watcher = Arc::new(
            ConfigWatcher::new(path).map_err(|e| anyhow::anyhow!("config error: {e}"))?,
        );
        let shared = watcher.arc();
        watcher.watch();
        shared
    } else {
        Arc::new(ArcSwap::from_pointee(config))
    };

    let snapshot = shared.load();
    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| snapshot.host.clone()),
        port.unwrap_or(snapshot.port)
    );
    if let Err(e) = snapshot.tenant.credentials().validate() {
        tracing::warn!(error = %e, "tenant settings incomplete; OAuth routes will answer 401");
    }
    drop(snapshot);

    let app = tenantgate_proxy::make_router(AppState::in_memory(shared));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "tenantgate listening");
    eprintln!("tenantgate listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Run a login into a fresh in-memory session.
async fn open_session(config: &Config, args: &LoginArgs) -> Result<SessionContext> {
    let kind = args
        .grant
        .parse::<GrantKind>()
        .map_err(|e| anyhow::anyhow!(e))?;
    let assertion = match &args.assertion {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?
                .trim()
                .to_string(),
        ),
        None => None,
    };

    let mut session = SessionContext::new(Arc::new(InMemoryCredentialStore::new()));
    let http = build_http_client(config.proxy_url.as_deref());
    login(kind, config, &mut session, http, assertion)
        .await
        .context("login failed")?;
    Ok(session)
}

async fn cmd_login(config: &Config, args: &LoginArgs) -> Result<()> {
    let session = open_session(config, args).await?;
    let store = session.store();
    let grant = serde_json::json!({
        "config": store.request_config(),
        "authorization": store.auth_header()?,
    });
    println!("{}", serde_json::to_string_pretty(&grant)?);
    Ok(())
}

async fn cmd_call(
    config: &Config,
    args: &LoginArgs,
    method: &str,
    url: String,
    body: Option<String>,
    headers: &[String],
) -> Result<()> {
    let method = method
        .parse::<HttpMethod>()
        .map_err(|e| anyhow::anyhow!(e))?;
    let mut descriptor = RequestDescriptor {
        method,
        url,
        ..RequestDescriptor::default()
    };
    if let Some(raw) = body {
        descriptor.body = Some(serde_json::from_str(&raw).context("--body is not valid JSON")?);
    }
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("header {header:?} is not `Name: value`"))?;
        descriptor = descriptor.with_header(name.trim(), value.trim());
    }

    let data = run(config, args, &descriptor).await?;
    match data {
        serde_json::Value::String(text) => println!("{text}"),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

async fn cmd_query(config: &Config, args: &LoginArgs, sql: String, csv: bool) -> Result<()> {
    let accept = if csv { "text/csv" } else { "application/json" };
    let descriptor = RequestDescriptor::post_query(SQL_QUERY_PATH, sql).with_header("Accept", accept);
    let data = run(config, args, &descriptor).await?;
    let table = QueryTable::parse(&data)?;
    println!("{table}");
    Ok(())
}

/// Log in, execute one descriptor, and return the success payload.
async fn run(
    config: &Config,
    args: &LoginArgs,
    descriptor: &RequestDescriptor,
) -> Result<serde_json::Value> {
    let session = open_session(config, args).await?;
    let proxy = AuthenticatedProxy::new(
        build_http_client(config.proxy_url.as_deref()),
        config.proxy.clone(),
    );
    match proxy
        .execute_session(descriptor, session.store().as_ref())
        .await?
    {
        ProxyResult::Success { data, .. } => Ok(data),
        ProxyResult::Failure(f) => {
            let detail = f.body.map(|b| format!(": {b}")).unwrap_or_default();
            anyhow::bail!("{:?} failure: {}{detail}", f.kind, f.message)
        }
    }
}
