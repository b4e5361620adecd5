mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use notibot_core::config::get_data_dir;

#[derive(Parser)]
#[command(name = "notibot")]
#[command(about = "Posts Trello board activity into a Grove channel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the polling daemon
    Start,
    /// (Internal) Run the daemon process
    #[command(hide = true)]
    DaemonInternalStart,
    /// Stop the polling daemon
    Stop,
    /// Ask the running daemon to poll now
    Trigger,
    /// Show configuration completeness, watermark and daemon state
    Status,
    /// Run one polling cycle in the foreground
    Poll {
        /// Print what would be posted without posting or moving the watermark
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// List the Trello boards that will be watched
    Boards,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., `trello.app_key`)
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., `grove.channel_token`)
        key: String,
        /// Value to set
        value: String,
    },
    /// List all configuration
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::DaemonInternalStart) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();
    }

    let data_dir = get_data_dir()?;

    match cli.command {
        Commands::Start => commands::daemon::start_daemon(&data_dir),
        Commands::DaemonInternalStart => commands::daemon::run_daemon_process().await,
        Commands::Stop => commands::daemon::stop_daemon(&data_dir).await,
        Commands::Trigger => commands::daemon::trigger_poll(&data_dir).await,
        Commands::Status => commands::status::show_status(&data_dir).await,
        Commands::Poll { dry_run } => commands::poll::poll_command(&data_dir, dry_run).await,
        Commands::Boards => commands::boards::list_boards(&data_dir).await,
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => commands::config::handle_config_get(&key),
            ConfigAction::Set { key, value } => commands::config::handle_config_set(&key, &value),
            ConfigAction::List => commands::config::handle_config_list(),
        },
    }
}
