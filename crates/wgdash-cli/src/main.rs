//! wgdash - a command-line client for a WireGuard/AmneziaWG dashboard server.
//!
//! Signs in (or uses the active cross-server API key), runs one command and
//! prints the result to stdout. Notifications and redirects go to stderr.

mod console;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wgdash_core::models::SchedulerType;
use wgdash_core::validation;
use wgdash_core::{ApiClient, Config, CrossServer, Dashboard, SessionContext};

use console::Console;

// ============================================================================
// Constants
// ============================================================================

/// Overrides the configured server URL
const SERVER_URL_ENV: &str = "WGDASH_SERVER_URL";

/// Directory for a daily rolling log file, in addition to stderr
const LOG_DIR_ENV: &str = "WGDASH_LOG_DIR";

const LOG_FILE_PREFIX: &str = "wgdash.log";

/// Non-interactive sign-in
const USERNAME_ENV: &str = "WGDASH_USERNAME";
const PASSWORD_ENV: &str = "WGDASH_PASSWORD";
const TOTP_ENV: &str = "WGDASH_TOTP";

/// Default refresh period for `watch` (in seconds)
const DEFAULT_WATCH_SECS: u64 = 10;

const USAGE: &str = "\
Usage: wgdash <command>

Commands:
  dashboard                          Print the dashboard configuration
  configs                            List interface configurations
  watch [SECONDS]                    Poll configurations and follow status changes
  peer IFACE PEER                    Show a peer's settings
  rate-limit get IFACE PEER          Show a peer's rate limit
  rate-limit set IFACE PEER UP DOWN [htb|hfsc|cake]
  rate-limit remove IFACE PEER
  scheduler IFACE                    Show an interface's scheduler
  server list                        List cross-server targets
  server add HOST API_KEY            Add a cross-server target
  server use KEY                     Send requests to a cross-server target
  server clear                       Go back to the local server
  server delete KEY
  signout                            End the session

Environment:
  WGDASH_SERVER_URL, WGDASH_USERNAME, WGDASH_PASSWORD, WGDASH_TOTP,
  WGDASH_LOG_DIR, RUST_LOG";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the log file and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=wgdash_core=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    if args.is_empty() || matches!(args[0], "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;

    // Cross-server management never talks to a server
    if args[0] == "server" {
        return run_server_command(&mut config, &args[1..]);
    }

    let server_url = std::env::var(SERVER_URL_ENV)
        .unwrap_or_else(|_| config.server_url().to_string());
    info!(server_url = %server_url, "wgdash starting");

    let console = Arc::new(Console::new());
    let session = Arc::new(SessionContext::new());
    let client = ApiClient::new(&server_url, session, console.clone(), console.clone())?;
    client.set_remote(config.remote_target());

    // Sign-in prompts already explain an ended session
    console.set_quiet(true);
    let signed_in = ensure_signed_in(&client, &mut config).await;
    console.set_quiet(false);
    console.take_redirect();
    signed_in?;

    let dashboard = Dashboard::new(client);
    run_command(&dashboard, &console, &mut config, &args).await
}

async fn run_command(
    dashboard: &Dashboard,
    console: &Console,
    config: &mut Config,
    args: &[&str],
) -> Result<()> {
    match args {
        ["dashboard"] => {
            let configuration = dashboard.get_configuration().await?;
            println!("{}", serde_json::to_string_pretty(&configuration)?);
        }
        ["configs"] => {
            let configurations = dashboard.get_configurations().await?;
            print_configurations(&configurations);
        }
        ["watch", rest @ ..] => {
            let secs = match rest {
                [] => DEFAULT_WATCH_SECS,
                [secs] => secs.parse().context("watch period must be a number of seconds")?,
                _ => anyhow::bail!("{}", USAGE),
            };
            watch(dashboard, console, Duration::from_secs(secs.max(1))).await?;
        }
        ["peer", interface, peer] => {
            check_peer_key(peer)?;
            let settings = dashboard.get_peer_settings(interface, peer).await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ["rate-limit", "get", interface, peer] => {
            check_peer_key(peer)?;
            let limit = dashboard.fetch_peer_rate_limit(interface, peer).await;
            if let Some(error) = dashboard.state().rate_limit_error {
                anyhow::bail!("{}", error);
            }
            if limit.is_limited() {
                println!("{}", serde_json::to_string_pretty(&limit)?);
            } else {
                println!("{}: unlimited", peer);
            }
        }
        ["rate-limit", "set", interface, peer, upload, download, rest @ ..] => {
            check_peer_key(peer)?;
            let upload: f64 = upload.parse().context("upload rate must be a number")?;
            let download: f64 = download.parse().context("download rate must be a number")?;
            let scheduler = match rest {
                [] => SchedulerType::default(),
                [scheduler] => scheduler.parse().map_err(anyhow::Error::msg)?,
                _ => anyhow::bail!("{}", USAGE),
            };
            dashboard
                .set_peer_rate_limit(interface, peer, upload, download, scheduler)
                .await?;
            println!("Rate limit set for {}", peer);
        }
        ["rate-limit", "remove", interface, peer] => {
            check_peer_key(peer)?;
            dashboard.remove_peer_rate_limit(interface, peer).await?;
            println!("Rate limit removed for {}", peer);
        }
        ["scheduler", interface] => {
            let scheduler = dashboard.get_interface_scheduler(interface).await?;
            let lock = if scheduler.locked { " (locked)" } else { "" };
            println!("{}: {}{}", interface, scheduler.scheduler_type, lock);
        }
        ["signout"] => {
            dashboard.sign_out(config).await;
            config.save()?;
        }
        _ => anyhow::bail!("{}", USAGE),
    }
    Ok(())
}

fn check_peer_key(peer: &str) -> Result<()> {
    if !validation::is_valid_wg_key(peer) {
        anyhow::bail!("Invalid peer key: {}", peer);
    }
    Ok(())
}

/// Sign in unless the session is still valid or an API key is in use.
async fn ensure_signed_in(client: &ApiClient, config: &mut Config) -> Result<()> {
    if client.remote().is_some() {
        return Ok(());
    }
    if client.validate_authentication().await {
        return Ok(());
    }

    let username = match std::env::var(USERNAME_ENV) {
        Ok(username) => username,
        Err(_) => prompt_username(config.last_username.as_deref())?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };
    let totp = std::env::var(TOTP_ENV).ok().filter(|code| !code.is_empty());

    let response = client
        .authenticate(&username, &password, totp.as_deref())
        .await;
    if !response.status {
        anyhow::bail!("Sign in failed: {}", response.message_or("unknown error"));
    }

    config.last_username = Some(username);
    config.save()?;
    Ok(())
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => eprint!("Username [{}]: ", last),
        None => eprint!("Username: "),
    }
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    match (line.is_empty(), last) {
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => anyhow::bail!("Username required"),
        (false, _) => Ok(line.to_string()),
    }
}

/// Keep the configuration list and status map fresh until Ctrl-C or the
/// session ends.
async fn watch(dashboard: &Dashboard, console: &Console, period: Duration) -> Result<()> {
    dashboard.get_configurations().await?;
    dashboard.start_configuration_polling(period);
    dashboard.start_status_stream();

    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        if dashboard.client().session().is_expired() || console.take_redirect() {
            break;
        }

        let state = dashboard.state();
        if let Some(configurations) = &state.configurations {
            print_configurations(configurations);
        }
        for (name, running) in &state.config_statuses {
            println!("  {} {}", name, if *running { "up" } else { "down" });
        }
        println!();
    }

    dashboard.client().session().stop_all_intervals();
    Ok(())
}

fn print_configurations(configurations: &[wgdash_core::models::WireguardConfiguration]) {
    println!(
        "{:<16} {:<10} {:<8} {:<10} {}",
        "NAME", "PROTOCOL", "STATUS", "PEERS", "ADDRESS"
    );
    for configuration in configurations {
        println!(
            "{:<16} {:<10} {:<8} {:<10} {}",
            configuration.name,
            configuration.protocol.display_name(),
            configuration.status_display(),
            configuration.peers_display(),
            configuration.address.as_deref().unwrap_or("-"),
        );
    }
}

fn run_server_command(config: &mut Config, args: &[&str]) -> Result<()> {
    match args {
        ["list"] => {
            for (key, server) in &config.cross_server.server_list {
                let marker = if server.active { "*" } else { " " };
                println!("{} {} {}", marker, key, server.host);
            }
            return Ok(());
        }
        ["add", host, api_key] => {
            let key = config.add_cross_server();
            config.cross_server.server_list.insert(
                key.clone(),
                CrossServer {
                    host: host.to_string(),
                    api_key: api_key.to_string(),
                    active: false,
                },
            );
            println!("{}", key);
        }
        ["use", key] => config.set_active_cross_server(key)?,
        ["clear"] => config.remove_active_cross_server(),
        ["delete", key] => {
            if config.delete_cross_server(key).is_none() {
                anyhow::bail!("Unknown cross-server: {}", key);
            }
        }
        _ => anyhow::bail!("{}", USAGE),
    }
    config.save()
}
