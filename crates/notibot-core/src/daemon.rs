use crate::{
    config::{get_data_dir, DaemonConfig},
    ipc::{self, DaemonIpcHandler},
    poller::Poller,
    worker::{Enqueued, PollWorker, TriggerSource},
};
use anyhow::{Context, Result};
use std::{future::Future, path::Path, sync::Arc};
use tokio::{
    sync::Notify,
    time::{interval, MissedTickBehavior},
};

pub const SOCKET_FILE: &str = "notibot.sock";
pub const PID_FILE: &str = "notibot.pid";
pub const LOG_FILE: &str = "notibot.log";

pub struct Daemon {
    config: DaemonConfig,
    worker: PollWorker,
    ipc_handler: Arc<DaemonIpcHandler>,
    shutdown_signal: Arc<Notify>,
}

impl Daemon {
    /// Spawn the poll worker; must be called inside a Tokio runtime
    #[must_use]
    pub fn new(poller: Poller, config: DaemonConfig) -> Self {
        let worker = PollWorker::spawn(Arc::new(poller));
        let shutdown_signal = Arc::new(Notify::new());
        let ipc_handler = Arc::new(DaemonIpcHandler::new(
            worker.queue(),
            worker.status(),
            config.poll_interval_secs,
            shutdown_signal.clone(),
        ));

        Self {
            config,
            worker,
            ipc_handler,
            shutdown_signal,
        }
    }

    /// Run until Ctrl-C or an IPC shutdown request
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or socket is unusable
    pub async fn run_with_signals(self) -> Result<()> {
        let sock_path = get_data_dir()?.join(SOCKET_FILE);
        self.run(&sock_path, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => log::info!("Received Ctrl-C, shutting down..."),
                Err(e) => {
                    log::error!("Unable to listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Serve IPC on `sock_path` and poll on every interval tick until `stop`
    /// resolves or a shutdown request arrives
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound
    pub async fn run(self, sock_path: &Path, stop: impl Future<Output = ()>) -> Result<()> {
        let listener = ipc::bind(sock_path)
            .with_context(|| format!("Failed to bind IPC socket {}", sock_path.display()))?;
        let server = tokio::spawn(ipc::serve(self.ipc_handler.clone(), listener));

        let queue = self.worker.queue();
        let mut interval = interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(stop);

        log::info!(
            "Daemon started, polling every {}s",
            self.config.poll_interval_secs
        );

        loop {
            tokio::select! {
                _ = interval.tick() => match queue.request(TriggerSource::Timer) {
                    Enqueued::Queued => {}
                    Enqueued::AlreadyPending => log::debug!("Previous poll still pending, skipping tick"),
                    Enqueued::Stopped => {
                        log::error!("Poll worker is gone, shutting down");
                        break;
                    }
                },
                () = &mut stop => break,
                () = self.shutdown_signal.notified() => {
                    log::info!("Shutdown requested over IPC");
                    break;
                }
            }
        }

        server.abort();
        self.worker.shutdown().await;
        if sock_path.exists() {
            if let Err(e) = std::fs::remove_file(sock_path) {
                log::warn!("Failed to remove socket {}: {e}", sock_path.display());
            }
        }

        log::info!("Daemon shut down gracefully.");
        Ok(())
    }
}
