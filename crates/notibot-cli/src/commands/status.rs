/// Status overview: configuration, watermark, daemon
use std::path::Path;

use anyhow::Result;
use notibot_core::{
    daemon::SOCKET_FILE,
    ipc::{IpcClient, IpcRequest, IpcResponse},
    settings, CycleStatus,
};
use notibot_storage::{Database, SettingsStore};

use super::helpers::local_time;

pub async fn show_status(data_dir: &Path) -> Result<()> {
    let db = Database::new(None)?;
    let stored = db.get_all()?;

    let missing = settings::missing_keys(&stored);
    if missing.is_empty() {
        println!("Configuration: all filled");
    } else {
        println!("Configuration: missing {}", missing.join(", "));
    }

    match settings::load_watermark(&db) {
        Ok(Some(at)) => println!("Watermark: {}", settings::format_watermark(at)),
        Ok(None) => println!("Watermark: none (first poll reports all visible activity)"),
        Err(e) => println!("Watermark: {e}"),
    }

    show_daemon_status(&data_dir.join(SOCKET_FILE)).await
}

async fn show_daemon_status(sock_path: &Path) -> Result<()> {
    if !sock_path.exists() {
        println!("\nDaemon Status: Not running");
        return Ok(());
    }

    let client = IpcClient::new(sock_path);
    match client.send_command(IpcRequest::Status).await {
        Ok(IpcResponse::Status {
            running,
            poll_interval_secs,
            last_cycle,
        }) => {
            println!(
                "\nDaemon Status: {}",
                if running { "Running" } else { "Stopped" }
            );
            println!("  Poll interval: {poll_interval_secs}s");
            match last_cycle {
                Some(cycle) => print_cycle(&cycle),
                None => println!("  Last cycle: none yet"),
            }
        }
        Ok(_) => anyhow::bail!("Unexpected response from daemon"),
        Err(e) => {
            log::error!("Failed to get status: {e}");
            println!("\nDaemon Status: Not running (or not responding)");
        }
    }
    Ok(())
}

fn print_cycle(cycle: &CycleStatus) {
    println!(
        "  Last cycle: {} ({:?})",
        local_time(cycle.finished_at),
        cycle.trigger
    );
    match &cycle.error {
        Some(error) => println!("    Failed: {error}"),
        None => println!(
            "    Fetched {}, delivered {}, failed {}",
            cycle.fetched, cycle.delivered, cycle.failed
        ),
    }
}
