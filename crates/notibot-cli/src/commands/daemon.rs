/// Daemon lifecycle management commands
use anyhow::{Context, Result};
use notibot_core::{
    config::get_data_dir,
    daemon::{LOG_FILE, PID_FILE, SOCKET_FILE},
    ipc::{IpcClient, IpcRequest, IpcResponse},
    Daemon, DaemonConfig, Enqueued, Poller,
};
use notibot_storage::Database;
use std::{
    env, fs,
    path::Path,
    process::Command,
    sync::Arc,
    time::{Duration, Instant},
};
use sysinfo::{Pid, System};

use super::helpers::load_config;

pub fn start_daemon(data_dir: &Path) -> Result<()> {
    let pid_file_path = data_dir.join(PID_FILE);
    let sock_path = data_dir.join(SOCKET_FILE);

    if pid_file_path.exists() {
        match read_pid(&pid_file_path) {
            Ok(pid) if System::new().refresh_process(pid) => {
                log::info!("Daemon is already running (PID: {pid}).");
                return Ok(());
            }
            Ok(pid) => log::warn!("Daemon {pid} is gone, removing its PID file."),
            Err(e) => log::warn!("Removing unreadable PID file: {e:#}"),
        }
        fs::remove_file(&pid_file_path)?;
    }
    if sock_path.exists() {
        log::warn!("Removing socket left by a previous daemon.");
        fs::remove_file(&sock_path)?;
    }

    // A broken config.toml fails here, not inside the detached process
    let config = load_config(data_dir)?;
    fs::create_dir_all(data_dir)?;

    let child = Command::new(env::current_exe()?)
        .arg("daemon-internal-start")
        .current_dir(env::current_dir()?)
        .spawn()
        .context("Failed to spawn the daemon process")?;
    fs::write(&pid_file_path, child.id().to_string())?;

    log::info!(
        "Daemon started (PID: {}), polling every {}s.",
        child.id(),
        config.poll_interval_secs
    );
    Ok(())
}

pub async fn run_daemon_process() -> Result<()> {
    // Detached process: stderr goes nowhere, so log to a file
    if let Err(e) = setup_daemon_logging() {
        eprintln!("Failed to set up daemon logging: {e}");
        return Err(e);
    }
    log::info!("Daemon process started internally.");

    if let Err(e) = daemon_main_logic().await {
        log::error!("Daemon main logic exited with a fatal error: {e:#}");
        return Err(e);
    }

    Ok(())
}

async fn daemon_main_logic() -> Result<()> {
    let data_dir = get_data_dir()?;
    let config = load_config(&data_dir)?;
    let db = Database::new(None)?;
    let poller = Poller::from_config(Arc::new(db), &config)?;

    Daemon::new(poller, config).run_with_signals().await
}

/// Grace period for deliveries after the fetch deadline
const DELIVERY_GRACE: Duration = Duration::from_secs(30);

/// Bound used when the fetch deadline is disabled in `config.toml`
const UNBOUNDED_FETCH_WAIT: Duration = Duration::from_secs(600);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long `stop` waits for an in-flight cycle before killing the daemon
fn shutdown_deadline(config: &DaemonConfig) -> Duration {
    config.fetch_timeout().unwrap_or(UNBOUNDED_FETCH_WAIT) + DELIVERY_GRACE
}

/// Wait until the process is gone or `deadline` elapses; true if it exited
async fn wait_for_exit(pid: Pid, deadline: Duration) -> bool {
    let mut sys = System::new();
    let started = Instant::now();
    while sys.refresh_process(pid) {
        if started.elapsed() >= deadline {
            return false;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
    true
}

fn kill_process(pid: Pid) {
    let mut sys = System::new();
    if sys.refresh_process(pid) {
        if let Some(process) = sys.process(pid) {
            process.kill();
            log::info!("Killed daemon process {pid}.");
        }
    }
}

fn read_pid(pid_file_path: &Path) -> Result<Pid> {
    let raw = fs::read_to_string(pid_file_path)
        .with_context(|| format!("Failed to read {}", pid_file_path.display()))?;
    let pid = raw
        .trim()
        .parse::<usize>()
        .with_context(|| format!("Invalid PID in {}", pid_file_path.display()))?;
    Ok(Pid::from(pid))
}

pub async fn stop_daemon(data_dir: &Path) -> Result<()> {
    let pid_file_path = data_dir.join(PID_FILE);
    let sock_path = data_dir.join(SOCKET_FILE);

    if !pid_file_path.exists() {
        log::info!("Daemon is not running (no PID file).");
        if sock_path.exists() {
            fs::remove_file(&sock_path)?;
        }
        return Ok(());
    }

    let pid = read_pid(&pid_file_path)?;
    let deadline = match load_config(data_dir) {
        Ok(config) => shutdown_deadline(&config),
        Err(e) => {
            log::warn!("Using default shutdown deadline: {e:#}");
            shutdown_deadline(&DaemonConfig::default())
        }
    };

    log::info!("Stopping notibot daemon (PID: {pid})...");
    match IpcClient::new(&sock_path)
        .send_command(IpcRequest::Shutdown)
        .await
    {
        Ok(IpcResponse::Shutdown) => {
            log::info!(
                "Shutdown requested; waiting up to {}s for the current cycle",
                deadline.as_secs()
            );
            if wait_for_exit(pid, deadline).await {
                log::info!("Daemon stopped.");
            } else {
                log::warn!("Daemon still running after {}s, killing it.", deadline.as_secs());
                kill_process(pid);
            }
        }
        Ok(resp) => {
            log::error!("Unexpected response to shutdown: {resp:?}");
            kill_process(pid);
        }
        Err(e) => {
            log::error!("Daemon did not answer the shutdown request: {e}");
            kill_process(pid);
        }
    }

    fs::remove_file(&pid_file_path)?;
    if sock_path.exists() {
        fs::remove_file(&sock_path)?;
    }

    Ok(())
}

pub async fn trigger_poll(data_dir: &Path) -> Result<()> {
    let sock_path = data_dir.join(SOCKET_FILE);
    if !sock_path.exists() {
        anyhow::bail!("Daemon is not running. Start it with: notibot start (or run: notibot poll)");
    }

    let client = IpcClient::new(&sock_path);
    match client.send_command(IpcRequest::Poll).await? {
        IpcResponse::PollQueued(Enqueued::Queued) => println!("Poll queued."),
        IpcResponse::PollQueued(Enqueued::AlreadyPending) => {
            println!("A poll is already pending; it will pick up everything new.");
        }
        IpcResponse::PollQueued(Enqueued::Stopped) => {
            anyhow::bail!("Daemon is shutting down");
        }
        other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
    }
    Ok(())
}

fn setup_daemon_logging() -> Result<()> {
    use std::fs::{create_dir_all, OpenOptions};

    let log_path = get_data_dir()?.join(LOG_FILE);

    if let Some(parent) = log_path.parent() {
        create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Debug)
        .init();

    Ok(())
}
