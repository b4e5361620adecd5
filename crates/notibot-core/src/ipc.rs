use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    sync::{watch, Notify},
};

use crate::worker::{CycleStatus, Enqueued, PollQueue, TriggerSource};

/// IPC request from CLI to daemon
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcRequest {
    Status,
    Poll,
    Shutdown,
}

/// IPC response from daemon to CLI
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum IpcResponse {
    Status {
        running: bool,
        poll_interval_secs: u64,
        last_cycle: Option<CycleStatus>,
    },
    PollQueued(Enqueued),
    Shutdown,
}

#[derive(Debug)]
pub struct IpcClient {
    sock_path: PathBuf,
}

impl IpcClient {
    #[must_use]
    pub fn new(sock_path: &Path) -> Self {
        Self {
            sock_path: sock_path.to_path_buf(),
        }
    }

    /// Send one request and wait for the reply
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable or replies with garbage
    pub async fn send_command(&self, request: IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.sock_path).await?;

        let encoded = bincode::serialize(&request)?;
        stream.write_all(&encoded).await?;
        stream.shutdown().await?;

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await?;
        let response: IpcResponse = bincode::deserialize(&buffer)?;

        Ok(response)
    }
}

pub struct DaemonIpcHandler {
    queue: PollQueue,
    last_cycle: watch::Receiver<Option<CycleStatus>>,
    poll_interval_secs: u64,
    shutdown_signal: Arc<Notify>,
}

impl DaemonIpcHandler {
    #[must_use]
    pub fn new(
        queue: PollQueue,
        last_cycle: watch::Receiver<Option<CycleStatus>>,
        poll_interval_secs: u64,
        shutdown_signal: Arc<Notify>,
    ) -> Self {
        Self {
            queue,
            last_cycle,
            poll_interval_secs,
            shutdown_signal,
        }
    }

    #[must_use]
    pub fn respond(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Status => IpcResponse::Status {
                running: true,
                poll_interval_secs: self.poll_interval_secs,
                last_cycle: self.last_cycle.borrow().clone(),
            },
            IpcRequest::Poll => {
                let outcome = self.queue.request(TriggerSource::Ipc);
                log::info!("Poll requested over IPC: {outcome:?}");
                IpcResponse::PollQueued(outcome)
            }
            IpcRequest::Shutdown => {
                self.shutdown_signal.notify_one();
                IpcResponse::Shutdown
            }
        }
    }

    /// Answer one request on `stream`
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be encoded or written
    pub async fn handle(&self, stream: &mut UnixStream, request: IpcRequest) -> Result<()> {
        let encoded = bincode::serialize(&self.respond(request))?;
        stream.write_all(&encoded).await?;
        Ok(())
    }
}

/// Bind the daemon socket, replacing a stale one
///
/// # Errors
///
/// Returns an error if the old socket cannot be removed or binding fails
pub fn bind(sock_path: &Path) -> io::Result<UnixListener> {
    if sock_path.exists() {
        fs::remove_file(sock_path)?;
    }
    UnixListener::bind(sock_path)
}

/// Accept connections forever, one task per connection
pub async fn serve(handler: Arc<DaemonIpcHandler>, listener: UnixListener) {
    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0; 1024];
                    match stream.read(&mut buf).await {
                        Ok(n) if n > 0 => match bincode::deserialize::<IpcRequest>(&buf[..n]) {
                            Ok(request) => {
                                if let Err(e) = handler.handle(&mut stream, request).await {
                                    log::error!("IPC handle error: {e}");
                                }
                            }
                            Err(e) => {
                                log::error!("IPC deserialize error: {e}");
                            }
                        },
                        Ok(_) => {} // Connection closed
                        Err(e) => {
                            log::error!("IPC read error: {e}");
                        }
                    }
                });
            }
            Err(e) => {
                log::error!("IPC accept error: {e}");
            }
        }
    }
}
