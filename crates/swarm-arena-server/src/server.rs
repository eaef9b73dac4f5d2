//! WebSocket transport for the query protocol.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::Router;
use log::{debug, info};
use serde_json::Value;
use swarm_arena_core::{ConfigError, ServerConfig, WorldStore};
use tokio::net::TcpListener;

use crate::protocol;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Router upgrading every request path to a query connection.
pub fn router(store: WorldStore) -> Router {
    Router::new().fallback(upgrade).with_state(store)
}

/// Bind the configured listen address.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = config.socket_addr()?;
    Ok(TcpListener::bind(addr).await?)
}

/// Serve query connections on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    store: WorldStore,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr = listener.local_addr()?;
    info!("query server listening on ws://{addr}");
    axum::serve(
        listener,
        router(store).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    info!("query server on {addr} stopped");
    Ok(())
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(store): State<WorldStore>,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, peer, store))
}

async fn handle_connection(mut socket: WebSocket, peer: SocketAddr, store: WorldStore) {
    info!("client {peer} connected");
    let mut requests = 0u64;

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                debug!("client {peer}: receive failed: {err}");
                break;
            }
        };

        // Each request is answered from the snapshot current when it arrives.
        let reply = match &message {
            Message::Text(text) => protocol::respond(text.as_str(), &store.current()),
            Message::Binary(bytes) => protocol::respond_bytes(bytes, &store.current()),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        requests += 1;

        if let Some(reply) = reply {
            if let Err(err) = send_reply(&mut socket, &reply).await {
                debug!("client {peer}: send failed: {err}");
                break;
            }
        }
    }

    info!("client {peer} disconnected after {requests} requests");
}

async fn send_reply(socket: &mut WebSocket, reply: &Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(reply.to_string().into())).await
}
