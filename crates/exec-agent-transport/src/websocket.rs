//! WebSocket listener for the orchestrator.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use exec_agent_core::{CommandRunner, Observation, ObservationEnvelope};
use exec_agent_session::ActionDispatcher;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::protocol::{TransportError, decode_action, encode_observation};

/// WebSocket handler state.
pub struct WsState<R>
where
    R: CommandRunner,
{
    dispatcher: Arc<ActionDispatcher<R>>,
}

impl<R> Clone for WsState<R>
where
    R: CommandRunner,
{
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler<R>(
    ws: WebSocketUpgrade,
    State(state): State<WsState<R>>,
) -> impl IntoResponse
where
    R: CommandRunner + 'static,
{
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket<R>(socket: WebSocket, state: WsState<R>)
where
    R: CommandRunner + 'static,
{
    let connection_id = Uuid::new_v4();
    let span = tracing::info_span!("connection", %connection_id);

    async move {
        tracing::info!("Connection opened");
        let (sender, receiver) = socket.split();
        if let Err(e) = run_connection(&state.dispatcher, receiver, sender).await {
            tracing::error!("Connection failed: {e}");
        }
    }
    .instrument(span)
    .await;
}

/// Serve one connection: receive an action, dispatch it, send the
/// observation back, repeat until the peer goes away.
///
/// # Errors
/// Returns error if the socket fails or an observation cannot be encoded.
pub async fn run_connection<R, I, O, E>(
    dispatcher: &ActionDispatcher<R>,
    mut incoming: I,
    mut outgoing: O,
) -> Result<(), TransportError>
where
    R: CommandRunner,
    I: Stream<Item = Result<Message, E>> + Unpin,
    O: Sink<Message> + Unpin,
    O::Error: std::error::Error + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    while let Some(frame) = incoming.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!("Ignoring binary frame that is not utf-8");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => return Err(TransportError::Socket(Box::new(e))),
        };

        let reply = match decode_action(&text) {
            Ok(envelope) => dispatcher.dispatch(envelope).await,
            Err(e) => {
                tracing::warn!(parent = ?e.parent, "{e}");
                ObservationEnvelope::new(e.parent, Observation::error(e.to_string()))
            }
        };

        let json = encode_observation(&reply)?;
        outgoing
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::Socket(Box::new(e)))?;
    }

    tracing::info!("Connection closed");
    Ok(())
}

/// Create the WebSocket router. Accepts upgrades on `/` and `/ws`.
#[must_use]
pub fn router<R>(dispatcher: Arc<ActionDispatcher<R>>) -> Router
where
    R: CommandRunner + 'static,
{
    Router::new()
        .route("/", get(ws_handler::<R>))
        .route("/ws", get(ws_handler::<R>))
        .layer(TraceLayer::new_for_http())
        .with_state(WsState { dispatcher })
}

/// Listen on `addr` until `shutdown` resolves.
///
/// # Errors
/// Returns error if the address cannot be bound or the server fails.
pub async fn serve<R, S>(
    addr: SocketAddr,
    dispatcher: Arc<ActionDispatcher<R>>,
    shutdown: S,
) -> Result<(), TransportError>
where
    R: CommandRunner + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(TransportError::Bind)?;
    tracing::info!("Listening on ws://{addr}");

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(TransportError::Serve)
}
