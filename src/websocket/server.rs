use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::config::WebSocketConfig;
use crate::db::MessageStore;
use crate::websocket::connection::Session;
use crate::websocket::events::{ClientEvent, ServerEvent};
use crate::websocket::presence::{DisconnectGuard, PresenceCoordinator};
use crate::websocket::registry::{ConnectionRegistry, ConnectionSender};
use crate::websocket::rooms::RoomManager;
use crate::websocket::router::EventRouter;

pub struct WebSocketServer {
    auth_service: Arc<AuthService>,
    store: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
    router: Arc<EventRouter>,
    coordinator: Arc<PresenceCoordinator>,
    ws_config: WebSocketConfig,
}

impl WebSocketServer {
    pub fn new(
        auth_service: Arc<AuthService>,
        store: Arc<dyn MessageStore>,
        ws_config: WebSocketConfig,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomManager::new());
        let router = Arc::new(EventRouter::new(registry.clone(), rooms.clone()));
        let coordinator = Arc::new(PresenceCoordinator::new(
            registry.clone(),
            rooms.clone(),
            router.clone(),
        ));

        Self {
            auth_service,
            store,
            registry,
            rooms,
            router,
            coordinator,
            ws_config,
        }
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub fn rooms(&self) -> Arc<RoomManager> {
        self.rooms.clone()
    }

    /// Accept loop. Each accepted socket gets its own task; a failed
    /// accept is logged and the loop keeps serving.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_connection(stream, addr).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    pub async fn handle_connection(self: Arc<Self>, raw_stream: TcpStream, addr: SocketAddr) {
        info!("New WebSocket connection from: {}", addr);

        let ws_stream = match tokio_tungstenite::accept_async(raw_stream).await {
            Ok(ws) => ws,
            Err(e) => {
                error!("Error during WebSocket handshake: {}", e);
                return;
            }
        };

        let (ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        // Writer task: drains the connection's channel into the socket.
        // Every delivery in the process goes through this channel, so a
        // slow peer only ever backs up its own queue.
        tokio::spawn(async move {
            let mut ws_sink = ws_sink;
            let mut rx = rx;

            while let Some(message) = rx.recv().await {
                if let Err(e) = ws_sink.send(message).await {
                    warn!("Error sending WebSocket message: {}", e);
                    break;
                }
            }

            let _ = ws_sink.close().await;
        });

        // Identity must resolve before the connection touches any shared
        // state. Sockets that stay silent or fail auth are closed here.
        let authenticated = tokio::time::timeout(
            self.ws_config.auth_timeout(),
            self.await_authentication(&mut ws_stream, &tx),
        )
        .await;

        let (user_id, username) = match authenticated {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                info!("Connection from {} failed authentication", addr);
                return;
            }
            Err(_) => {
                warn!("Connection from {} timed out before authenticating", addr);
                return;
            }
        };

        let connection_id = Uuid::new_v4();
        info!(
            "User {} ({}) online on connection {}",
            user_id, username, connection_id
        );

        self.coordinator
            .connection_online(user_id, connection_id, tx.clone())
            .await;

        let session = Session::new(
            connection_id,
            user_id,
            username.clone(),
            tx.clone(),
            self.store.clone(),
            self.router.clone(),
            self.rooms.clone(),
        );
        let guard = DisconnectGuard::new(self.coordinator.clone(), connection_id, username);

        let mut heartbeat = tokio::time::interval(self.ws_config.heartbeat_interval());
        heartbeat.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                frame = ws_stream.next() => {
                    match frame {
                        Some(Ok(msg)) => {
                            if !session.handle_frame(msg).await {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Error receiving on connection {}: {}", connection_id, e);
                            break;
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    if session.heartbeat_elapsed().await > self.ws_config.heartbeat_timeout() {
                        warn!("Heartbeat timeout for connection {}", connection_id);
                        break;
                    }
                    if tx.send(Message::Ping(Vec::new())).is_err() {
                        break;
                    }
                }
            }
        }

        guard.complete().await;
        info!("Connection {} closed", connection_id);
    }

    /// Reads frames until the client authenticates, answering protocol
    /// pings along the way. Returns the resolved identity, or `None`
    /// if the client sent a bad token or closed first.
    async fn await_authentication(
        &self,
        ws_stream: &mut SplitStream<WebSocketStream<TcpStream>>,
        tx: &ConnectionSender,
    ) -> Option<(Uuid, String)> {
        while let Some(frame) = ws_stream.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Error during authentication: {}", e);
                    return None;
                }
            };

            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::Authenticate { token }) => {
                        return match self
                            .auth_service
                            .validate_token(&token)
                            .and_then(|claims| Ok((claims.user_id()?, claims.username)))
                        {
                            Ok((user_id, username)) => {
                                Self::send_event(
                                    tx,
                                    ServerEvent::AuthResult {
                                        success: true,
                                        error: None,
                                    },
                                );
                                Some((user_id, username))
                            }
                            Err(e) => {
                                Self::send_event(
                                    tx,
                                    ServerEvent::AuthResult {
                                        success: false,
                                        error: Some(e.to_string()),
                                    },
                                );
                                None
                            }
                        };
                    }
                    Ok(_) => {
                        Self::send_event(
                            tx,
                            ServerEvent::Error {
                                message: "Not authenticated".to_string(),
                            },
                        );
                    }
                    Err(e) => {
                        Self::send_event(
                            tx,
                            ServerEvent::Error {
                                message: format!("Invalid message format: {}", e),
                            },
                        );
                    }
                },
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    }

    fn send_event(tx: &ConnectionSender, event: ServerEvent) {
        if let Ok(frame) = event.to_frame() {
            let _ = tx.send(frame);
        }
    }
}
