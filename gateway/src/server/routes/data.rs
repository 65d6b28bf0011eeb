use crate::server::{
  self,
  downlink,
  error::{bad_request, not_found},
  Shared,
};
use axum::{
  extract::{ws, ConnectInfo, Path, State, WebSocketUpgrade},
  response::Response,
  Json,
};
use common::comm::{ClassifiedPacket, ClientMessage, Role};
use futures_util::{SinkExt, StreamExt};
use jeflog::{pass, warn};
use std::{collections::BTreeMap, net::SocketAddr};

/// Route function which accepts a WebSocket connection, hydrates it with the
/// cached packet of every role, and then forwards live packets. Operator
/// commands sent by the client on the same socket are relayed as downlinks.
pub async fn forward_data(
  ws: WebSocketUpgrade,
  State(shared): State<Shared>,
  ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
  ws.on_upgrade(move |socket| async move {
    let (mut writer, mut reader) = socket.split();
    let mut subscription = shared.dispatcher.connect().await;

    if shared.verbose {
      pass!("Dashboard client \x1b[1m{peer}\x1b[0m connected.");
    }

    // spawn separate task for forwarding while the "main" task reads commands
    // until it can abort this task when the client closes
    let forwarding_handle = tokio::spawn(async move {
      while let Some(frame) = subscription.recv().await {
        let json = match serde_json::to_string(&frame) {
          Ok(json) => json,
          Err(error) => {
            warn!("Failed to serialize packet into JSON: {error}");
            continue;
          }
        };

        // attempt to forward the frame and break if connection is severed.
        if let Err(_error) = writer.send(ws::Message::Text(json)).await {
          warn!(
            "Forwarding connection with peer \x1b[1m{}\x1b[0m severed.",
            peer
          );
          _ = writer.close().await;
          break;
        }
      }
    });

    // read until the client sends a ws::Message::Close or the stream ends
    while let Some(Ok(message)) = reader.next().await {
      match message {
        ws::Message::Text(text) => {
          match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::BuzzerCommand(request)) => {
              // failures are logged by relay_command and never echoed back
              let _ = downlink::relay_command(&shared, request.command()).await;
            }
            Err(error) => {
              warn!("Ignored frame from peer \x1b[1m{peer}\x1b[0m: {error}");
            }
          }
        }
        ws::Message::Close(_) => break,
        _ => {}
      }
    }

    // cancel the forwarding stream upon receipt of a close message
    forwarding_handle.abort();
  })
}

/// Route function returning the cached packet of every role that has one.
pub async fn get_snapshot(
  State(shared): State<Shared>,
) -> Json<BTreeMap<Role, ClassifiedPacket>> {
  let mut snapshot = BTreeMap::new();

  for role in shared.cache.roles().await {
    if let Some(packet) = shared.cache.get(role).await {
      snapshot.insert(role, packet);
    }
  }

  Json(snapshot)
}

/// Route function returning the cached packet of a single role.
pub async fn get_role_snapshot(
  State(shared): State<Shared>,
  Path(role): Path<String>,
) -> server::Result<Json<ClassifiedPacket>> {
  let role = role.parse::<Role>().map_err(bad_request)?;

  shared
    .cache
    .get(role)
    .await
    .map(Json)
    .ok_or(not_found(format!("no packet cached for {role}")))
}
