/// Board listing, doubling as a Trello connection test
use std::path::Path;

use anyhow::Result;
use notibot_core::Credentials;
use notibot_integrations::TrelloClient;
use notibot_storage::Database;
use tabled::{Table, Tabled};

use super::helpers::load_config;

#[derive(Tabled)]
struct BoardRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
}

pub async fn list_boards(data_dir: &Path) -> Result<()> {
    let config = load_config(data_dir)?;
    let db = Database::new(None)?;
    let credentials = Credentials::load(&db)?;
    let client = TrelloClient::new(Some(config.trello_api_url))?;

    println!("Fetching boards from Trello...");
    let mut boards = client.list_boards(&credentials.source).await?;

    if boards.is_empty() {
        println!("No open boards visible to this token.");
        return Ok(());
    }

    boards.sort_by(|a, b| a.name.cmp(&b.name));
    let count = boards.len();
    let rows: Vec<BoardRow> = boards
        .into_iter()
        .map(|b| BoardRow {
            id: b.id,
            name: b.name,
        })
        .collect();

    println!("{}", Table::new(rows));
    println!("\n{count} board(s) will be watched.");
    Ok(())
}
