use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use session_gate::{
    AuthStore, FileCache, GateConfig, HttpTransport, Location, MemoryCache, RouteGate, SessionCache, StoreOptions,
    post_login_destination,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] session_gate::ConfigError),
    #[error("{0}")]
    Gate(#[from] session_gate::GateError),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "gate-cli", about = "Session authentication gate driver for the BoardGameConnect API")]
struct Cli {
    /// Backend API base, e.g. `http://127.0.0.1:8080/api`. Overrides `GATE_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// File holding the last-known user. Overrides `GATE_CACHE_PATH`.
    #[arg(long)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the session and print the settled state.
    Whoami,
    /// Sign in and print the user plus where the app would navigate next.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "GATE_PASSWORD", hide_env_values = true)]
        password: String,
        /// Location the visitor was sent away from.
        #[arg(long)]
        from: Option<String>,
    },
    /// Sign out and clear the cached user.
    Logout,
    /// Print the view a route would render after verification.
    Gate { path: String },
    /// Print every session change until interrupted, re-probing when the
    /// backend becomes reachable again.
    Watch {
        #[arg(long, default_value_t = 5000)]
        poll_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(cli.base_url.as_deref(), cli.cache.as_deref())?;
    let store = build_store(&config)?;

    match cli.command {
        Command::Whoami => run_whoami(&store).await,
        Command::Login { email, password, from } => run_login(&store, &config, &email, &password, from).await,
        Command::Logout => run_logout(&store).await,
        Command::Gate { path } => run_gate(store, &config, &path).await,
        Command::Watch { poll_ms } => run_watch(&store, &config, Duration::from_millis(poll_ms)).await,
    }
}

fn load_config(base_url: Option<&str>, cache: Option<&std::path::Path>) -> Result<GateConfig, CliError> {
    let config = GateConfig::from_lookup(|key| match key {
        "GATE_API_BASE_URL" if base_url.is_some() => base_url.map(str::to_owned),
        "GATE_CACHE_PATH" if cache.is_some() => cache.map(|p| p.display().to_string()),
        _ => std::env::var(key).ok(),
    })?;
    Ok(config)
}

fn build_store(config: &GateConfig) -> Result<AuthStore, CliError> {
    let transport = Arc::new(HttpTransport::new(&config.api_base_url, config.timeouts)?);
    let cache: Arc<dyn SessionCache> = match &config.cache_path {
        Some(path) => Arc::new(FileCache::new(path)),
        None => Arc::new(MemoryCache::new()),
    };
    tracing::debug!(base_url = %config.api_base_url, cache = ?config.cache_path, "auth store configured");
    Ok(AuthStore::new(transport, cache, StoreOptions::from(config)))
}

async fn run_whoami(store: &AuthStore) -> Result<(), CliError> {
    store.spawn_init();
    let session = store.settled().await?;
    print_json(&serde_json::to_value(&session)?)?;
    if session.is_authenticated() { Ok(()) } else { Err(CliError::NotAuthenticated) }
}

async fn run_login(
    store: &AuthStore,
    config: &GateConfig,
    email: &str,
    password: &str,
    from: Option<String>,
) -> Result<(), CliError> {
    let user = store.login_with_credentials(email, password).await?;
    let from = from.as_deref().map(Location::parse);
    let next = post_login_destination(from.as_ref(), &config.routes);
    print_json(&json!({ "user": user, "next": next }))
}

async fn run_logout(store: &AuthStore) -> Result<(), CliError> {
    store.logout().await;
    print_json(&json!({ "loggedOut": true }))
}

async fn run_gate(store: AuthStore, config: &GateConfig, path: &str) -> Result<(), CliError> {
    store.spawn_init();
    let gate = RouteGate::mount(store, Location::parse(path), config.routes.clone(), config.route_retry);
    let view = gate.resolved().await;
    print_json(&serde_json::to_value(&view)?)
}

async fn run_watch(store: &AuthStore, config: &GateConfig, poll: Duration) -> Result<(), CliError> {
    let (online, _poller) = session_gate::connectivity::poll_reachability(&config.api_base_url, poll, config.timeouts)?;
    store.watch_connectivity(online);

    let mut sub = store.subscribe();
    store.spawn_init();
    print_json(&serde_json::to_value(sub.current())?)?;

    loop {
        tokio::select! {
            changed = sub.changed() => {
                let Some(session) = changed else {
                    break;
                };
                print_json(&serde_json::to_value(&session)?)?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }
    store.dispose();
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
