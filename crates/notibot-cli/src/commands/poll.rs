/// Foreground polling
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use notibot_core::{Poller, PreviewItem};
use notibot_storage::Database;
use tabled::{Table, Tabled};

use super::helpers::{load_config, local_time, truncate_str};

#[derive(Tabled)]
struct PreviewRow {
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Link")]
    link: String,
}

impl From<PreviewItem> for PreviewRow {
    fn from(item: PreviewItem) -> Self {
        Self {
            when: local_time(item.occurred_at),
            message: truncate_str(&item.message, 80),
            link: item.link_url,
        }
    }
}

pub async fn poll_command(data_dir: &Path, dry_run: bool) -> Result<()> {
    let config = load_config(data_dir)?;
    let poller = Poller::from_config(Arc::new(Database::new(None)?), &config)?;

    if dry_run {
        let items = poller.preview().await?;
        if items.is_empty() {
            println!("No new activity.");
            return Ok(());
        }

        println!("{} notice(s) would be posted (dry run):", items.len());
        let rows: Vec<PreviewRow> = items.into_iter().map(PreviewRow::from).collect();
        println!("{}", Table::new(rows));
        return Ok(());
    }

    let report = poller.run_cycle().await?;
    if report.fetched == 0 {
        println!("No new activity.");
        return Ok(());
    }

    println!("Poll complete!");
    println!("  Fetched: {}", report.fetched);
    println!("  Delivered: {}", report.delivered);
    println!("  Failed: {}", report.failures.len());
    if let Some(watermark) = report.watermark {
        println!("  Watermark: {}", notibot_core::settings::format_watermark(watermark));
    }
    if !report.failures.is_empty() {
        println!("\nErrors:");
        for error in report.failures {
            println!("  - {error}");
        }
    }

    Ok(())
}
