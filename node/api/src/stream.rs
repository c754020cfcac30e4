// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use landwatch_state::LandUpdate;
use log::{debug, warn};
use serde_json::Value;

use crate::{metrics, AppState};

/// Frame the client sends to start the session.
const READINESS_TOKEN: &str = "1";

pub(crate) async fn lands_states_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        metrics::ACTIVE_STREAM_SESSIONS.inc();
        if let Err(err) = run_session(socket, state).await {
            debug!("state-stream session ended: {err}");
        }
        metrics::ACTIVE_STREAM_SESSIONS.dec();
    })
}

async fn run_session(mut socket: WebSocket, state: AppState) -> Result<(), String> {
    // The client signals readiness with a single "1" frame; everything
    // before it is ignored.
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(frame))) if frame.as_str().trim() == READINESS_TOKEN => break,
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.to_string()),
        }
    }

    // Subscribing before the backfill keeps updates published while the
    // backfill runs from being lost; they queue behind it.
    let updates = state.store.subscribe().await.map_err(|e| e.to_string())?;

    let (tx, rx) = flume::bounded::<String>(state.config.stream_queue.max(1));
    let drain = rx.clone();
    let store = state.store.clone();
    let producer = tokio::spawn(async move {
        // Backfill: one `cached` message per live snapshot.
        let lands = match store.keys().await {
            Ok(lands) => lands,
            Err(err) => {
                warn!("state-stream backfill aborted: {err}");
                return;
            }
        };
        for land_number in lands {
            match store.get(land_number).await {
                Ok(Some(snapshot)) => {
                    let update = LandUpdate::new(land_number, &snapshot);
                    if !push(&tx, &drain, frame("cached", &update)) {
                        return;
                    }
                }
                Ok(None) => {}
                Err(err) => warn!("state-stream backfill skipped land {land_number}: {err}"),
            }
        }
        // Live tail, until the store subscription or the session closes.
        while let Ok(update) = updates.recv_async().await {
            if !push(&tx, &drain, frame("update", &update)) {
                return;
            }
        }
    });

    let result = loop {
        tokio::select! {
            queued = rx.recv_async() => match queued {
                Ok(payload) => {
                    if let Err(err) = socket.send(Message::Text(payload.into())).await {
                        break Err(err.to_string());
                    }
                }
                Err(_) => break Ok(()),
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(err)) => break Err(err.to_string()),
            },
        }
    };
    producer.abort();
    result
}

/// Queues a message for the session, dropping the oldest pending one when
/// the client is too slow to keep up. Returns false once the session is
/// gone.
fn push(tx: &flume::Sender<String>, drain: &flume::Receiver<String>, payload: String) -> bool {
    if tx.is_full() {
        let _ = drain.try_recv();
    }
    tx.try_send(payload).is_ok()
}

/// Wire shape of one stream message.
fn frame(kind: &str, update: &LandUpdate) -> String {
    let mut message = serde_json::to_value(update).unwrap_or_default();
    message["type"] = Value::String(kind.to_string());
    serde_json::json!({ "message": message }).to_string()
}
