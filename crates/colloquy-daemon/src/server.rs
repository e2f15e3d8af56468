//! Unix socket server for handling client connections.
//!
//! Listens on a Unix domain socket and handles line-delimited JSON
//! requests, one request per line with one response line each.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use colloquy_client::LLMClient;
use colloquy_common::protocol::{ClientRequest, ClientResponse, ErrorKind};

use crate::error::{DaemonError, Result};
use crate::orchestrator::Orchestrator;
use crate::storage::Storage;

/// Maximum size of a single request line (1 MB).
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Daemon server state.
pub struct Server<C> {
    /// Conversation orchestrator
    orchestrator: Arc<Orchestrator<C>>,

    /// Storage backend (socket and PID paths)
    storage: Arc<Storage>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,
}

impl<C: LLMClient + 'static> Server<C> {
    /// Creates a new server.
    pub fn new(
        orchestrator: Arc<Orchestrator<C>>,
        storage: Arc<Storage>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            orchestrator,
            storage,
            shutdown_tx,
        }
    }

    /// Runs the server.
    ///
    /// Binds to the Unix socket and accepts connections until shutdown is
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns an error if socket binding fails.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let socket_path = self.storage.socket_path();

        let pid = std::process::id();
        self.storage.write_pid(pid)?;
        info!(pid = %pid, "daemon started");

        // Remove stale socket from a previous run
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        info!(socket_path = %socket_path.display(), "daemon listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let server = Arc::clone(&self);
                            debug!("client connected");
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    error!(error = %e, "connection handling error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "accept error");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        if socket_path.exists()
            && let Err(e) = std::fs::remove_file(socket_path)
        {
            warn!("failed to remove socket file: {e}");
        }

        if let Err(e) = self.storage.remove_pid() {
            warn!("failed to remove PID file: {e}");
        }

        Ok(())
    }

    /// Handles a single client connection.
    async fn handle_connection(self: Arc<Self>, stream: UnixStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            match Self::read_line_limited(&mut reader, &mut line).await {
                Ok(0) => {
                    debug!("client disconnected");
                    break;
                }
                Ok(_) => {
                    let response = match serde_json::from_str::<ClientRequest>(&line) {
                        Ok(request) => {
                            debug!(request = ?request, "received request");
                            self.handle_request(request).await
                        }
                        Err(e) => {
                            warn!(error = %e, "invalid request JSON");
                            ClientResponse::Error {
                                kind: ErrorKind::InvalidArgument,
                                message: format!("invalid JSON: {e}"),
                            }
                        }
                    };

                    if let Err(e) = Self::write_response(&mut writer, &response).await {
                        error!(error = %e, "failed to write response");
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "read error");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Dispatches a request to the orchestrator, flattening failures into
    /// the wire error shape.
    #[instrument(skip_all)]
    async fn handle_request(&self, request: ClientRequest) -> ClientResponse {
        let result = match request {
            ClientRequest::StartConversation { message } => self
                .orchestrator
                .start_conversation(&message)
                .await
                .map(|started| ClientResponse::ConversationStarted {
                    conversation_id: started.conversation_id,
                    title: started.title,
                    reply: started.reply,
                }),
            ClientRequest::ContinueConversation {
                conversation_id,
                message,
            } => self
                .orchestrator
                .continue_conversation(&conversation_id, &message)
                .await
                .map(|reply| ClientResponse::Reply { reply }),
            ClientRequest::ListConversations => self
                .orchestrator
                .list_conversations()
                .await
                .map(|conversations| ClientResponse::Conversations { conversations }),
            ClientRequest::DescribeConversation { conversation_id } => self
                .orchestrator
                .describe_conversation(&conversation_id)
                .await
                .map(|conversation| ClientResponse::Conversation { conversation }),
            ClientRequest::Ping => Ok(ClientResponse::Pong),
            ClientRequest::Shutdown => {
                info!("shutdown requested by client");
                let _ = self.shutdown_tx.send(());
                Ok(ClientResponse::ShuttingDown)
            }
        };

        result.unwrap_or_else(|e| {
            error!(error = %e, "request handling error");
            e.into()
        })
    }

    /// Writes a response to the client.
    async fn write_response(
        writer: &mut tokio::net::unix::OwnedWriteHalf,
        response: &ClientResponse,
    ) -> Result<()> {
        let json = serde_json::to_string(response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Reads a newline-delimited line with a size limit.
    ///
    /// Returns the number of bytes read (0 = EOF). Errors if the line
    /// exceeds `MAX_REQUEST_SIZE` before a newline is found.
    async fn read_line_limited(
        reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>,
        buf: &mut String,
    ) -> Result<usize> {
        buf.clear();
        let mut total = 0;

        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(total);
            }

            let newline_pos = available.iter().position(|&b| b == b'\n');
            let n = newline_pos.map_or(available.len(), |p| p + 1);

            total += n;
            if total > MAX_REQUEST_SIZE {
                reader.consume(n);
                return Err(DaemonError::Other(format!(
                    "request exceeds {MAX_REQUEST_SIZE} byte limit"
                )));
            }

            let chunk = std::str::from_utf8(&available[..n])
                .map_err(|_| DaemonError::Other("invalid UTF-8 in request".to_string()))?;
            buf.push_str(chunk);
            reader.consume(n);

            if newline_pos.is_some() {
                return Ok(total);
            }
        }
    }
}
