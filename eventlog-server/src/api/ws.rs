use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use tokio::time::Instant;

use crate::state::AppState;

/// `GET /ws` — WebSocket event ingest stream.
///
/// Every text (or UTF-8 binary) frame is parsed, validated, stored and
/// answered with exactly one acknowledgment frame. Rejected frames never
/// close the connection; only the client (or the optional idle timeout)
/// does.
pub(super) async fn event_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_event_ws(socket, state))
}

/// What the receive side produced for one loop iteration.
enum Inbound {
    Frame(Message),
    Disconnected,
}

/// Background task that drives a single WebSocket connection.
///
/// 1. Registers the connection (`Open`).
/// 2. Processes inbound frames strictly one at a time, so acknowledgments
///    go out in request order.
/// 3. Between frames, forwards anything broadcast through the registry.
/// 4. On disconnect, deregisters (`Closed`) and exits.
async fn handle_event_ws(mut socket: WebSocket, state: AppState) {
    let pipeline = state.pipeline();
    let idle_timeout = state.server.idle_timeout;
    let mut connection = state.connections.open(state.server.outbound_buffer).await;
    let connection_id = connection.id();
    tracing::info!(connection = %connection_id, "WS: connection opened");

    let mut idle_deadline = idle_timeout.map(|limit| Instant::now() + limit);

    loop {
        tokio::select! {
            inbound = next_inbound(&mut socket) => {
                if let Some(limit) = idle_timeout {
                    idle_deadline = Some(Instant::now() + limit);
                }
                let ack = match inbound {
                    Inbound::Frame(Message::Text(text)) => pipeline.acknowledge(text.as_str().as_bytes()).await,
                    Inbound::Frame(Message::Binary(bytes)) => pipeline.acknowledge(&bytes).await,
                    Inbound::Frame(Message::Ping(_) | Message::Pong(_)) => continue,
                    Inbound::Frame(Message::Close(_)) | Inbound::Disconnected => break,
                };

                if send_json(&mut socket, &ack).await.is_err() {
                    tracing::debug!(connection = %connection_id, "WS: failed to send acknowledgment");
                    break;
                }
            }

            outbound = connection.next_outbound() => {
                if socket.send(Message::Text(outbound.into())).await.is_err() {
                    break;
                }
            }

            // Only inbound frames move the deadline; broadcasts do not.
            _ = idle_expired(idle_deadline) => {
                tracing::info!(connection = %connection_id, "WS: idle timeout");
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "idle timeout".into(),
                    })))
                    .await;
                break;
            }
        }
    }

    connection.close().await;
    tracing::info!(connection = %connection_id, "WS: connection closed");
}

/// Wait for the next frame from the client.
async fn next_inbound(socket: &mut WebSocket) -> Inbound {
    match socket.recv().await {
        Some(Ok(message)) => Inbound::Frame(message),
        Some(Err(e)) => {
            tracing::debug!(error = %e, "WS: transport error");
            Inbound::Disconnected
        }
        None => Inbound::Disconnected,
    }
}

/// Completes at `deadline`; never completes when there is none.
async fn idle_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use crate::api::tests::test_state;
    use crate::server::build_router;
    use crate::state::AppState;
    use eventlog_core::entities::event_records::CountEvents;
    use eventlog_sdk::client::{ClientError, EventQueryClient, EventStreamClient};
    use eventlog_sdk::objects::{Acknowledgment, InboundEvent};
    use kanau::processor::Processor;
    use serde_json::{Map, Value, json};
    use std::collections::HashSet;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use url::Url;

    async fn spawn_server(state: AppState) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> EventStreamClient {
        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
        EventStreamClient::connect(&url).await.unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            unreachable!("expected a JSON object")
        };
        map
    }

    fn sample_event() -> InboundEvent {
        InboundEvent::new(
            "event_1",
            object(json!({"field1": "value1", "field2": "value2"})),
            1638316800.0,
        )
    }

    async fn wait_for_connections(state: &AppState, expected: usize) {
        for _ in 0..100 {
            if state.connections.len().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.connections.len().await, expected);
    }

    #[tokio::test]
    async fn test_valid_events_get_increasing_ids() {
        let addr = spawn_server(test_state(None).await).await;
        let mut client = connect(addr).await;

        let mut last = 0;
        for _ in 0..5 {
            let ack = client.send_event(&sample_event()).await.unwrap();
            let id = ack.event_id().unwrap();
            assert!(id > last);
            last = id;
        }
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_errors_keep_connection_open() {
        let state = test_state(None).await;
        let addr = spawn_server(state.clone()).await;
        let mut client = connect(addr).await;

        let ack = client.send_raw("not json at all").await.unwrap();
        assert!(!ack.is_success());

        let ack = client
            .send_raw(r#"{"type":"event_1","data":{"field1":1,"field2":2}}"#)
            .await
            .unwrap();
        assert_eq!(
            ack,
            Acknowledgment::error("invalid event format: missing 'type', 'data', or 'timestamp'")
        );

        let unknown = InboundEvent::new("event_9", object(json!({"a": 1})), 1.0);
        let ack = client.send_event(&unknown).await.unwrap();
        assert_eq!(ack, Acknowledgment::error("invalid event type: event_9"));

        let partial = InboundEvent::new("event_2", object(json!({"fieldB": 1})), 1.0);
        let ack = client.send_event(&partial).await.unwrap();
        assert_eq!(ack, Acknowledgment::error("missing required fields: fieldA"));

        // The same connection still accepts valid events.
        let ack = client.send_event(&sample_event()).await.unwrap();
        assert!(ack.is_success());

        let stored = state
            .processor()
            .process(CountEvents::default())
            .await
            .unwrap();
        assert_eq!(stored, 1);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_through_query_endpoint() {
        let addr = spawn_server(test_state(None).await).await;
        let mut client = connect(addr).await;
        let ack = client.send_event(&sample_event()).await.unwrap();
        client.close().await.unwrap();

        let query = EventQueryClient::new(Url::parse(&format!("http://{addr}")).unwrap());
        let events = query.list_events(Some("event_1")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(Some(events[0].id), ack.event_id());
        assert_eq!(
            Value::Object(events[0].data.clone()),
            json!({"field1": "value1", "field2": "value2"})
        );
        assert_eq!(events[0].timestamp, 1638316800.0);

        assert!(query.list_events(Some("event_3")).await.unwrap().is_empty());
        assert_eq!(
            query.welcome().await.unwrap().message,
            "Welcome to the Event WebSocket API!"
        );
    }

    #[tokio::test]
    async fn test_concurrent_connections_lose_no_writes() {
        const CONNECTIONS: usize = 6;
        const EVENTS_PER_CONNECTION: usize = 10;

        let state = test_state(None).await;
        let addr = spawn_server(state.clone()).await;

        let mut tasks = Vec::new();
        for writer in 0..CONNECTIONS {
            tasks.push(tokio::spawn(async move {
                let mut client = connect(addr).await;
                let mut ids = Vec::new();
                for n in 0..EVENTS_PER_CONNECTION {
                    let event = InboundEvent::new(
                        "event_5",
                        object(json!({"username": format!("user{writer}"), "action": n})),
                        n as f64,
                    );
                    let ack = client.send_event(&event).await.unwrap();
                    ids.push(ack.event_id().unwrap());
                }
                client.close().await.unwrap();
                ids
            }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            let per_connection = task.await.unwrap();
            assert!(per_connection.windows(2).all(|w| w[0] < w[1]));
            ids.extend(per_connection);
        }
        assert_eq!(ids.len(), CONNECTIONS * EVENTS_PER_CONNECTION);

        let stored = state
            .processor()
            .process(CountEvents::default())
            .await
            .unwrap();
        assert_eq!(stored as usize, CONNECTIONS * EVENTS_PER_CONNECTION);
    }

    #[tokio::test]
    async fn test_registry_tracks_membership_and_broadcasts() {
        let state = test_state(None).await;
        let addr = spawn_server(state.clone()).await;

        let mut first = connect(addr).await;
        let mut second = connect(addr).await;
        wait_for_connections(&state, 2).await;

        assert_eq!(state.connections.broadcast(r#"{"notice":"hello"}"#).await, 2);
        assert_eq!(first.next_text().await.unwrap(), r#"{"notice":"hello"}"#);
        assert_eq!(second.next_text().await.unwrap(), r#"{"notice":"hello"}"#);

        first.close().await.unwrap();
        wait_for_connections(&state, 1).await;

        // Acknowledgments still flow on the remaining connection.
        assert!(second.send_event(&sample_event()).await.unwrap().is_success());
        second.close().await.unwrap();
        wait_for_connections(&state, 0).await;
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_connection() {
        let state = test_state(Some(Duration::from_millis(100))).await;
        let addr = spawn_server(state.clone()).await;
        let mut client = connect(addr).await;

        let err = client.next_text().await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
        wait_for_connections(&state, 0).await;
    }

    #[tokio::test]
    async fn test_broadcasts_do_not_extend_idle_timeout() {
        let state = test_state(Some(Duration::from_millis(200))).await;
        let addr = spawn_server(state.clone()).await;
        let mut client = connect(addr).await;
        wait_for_connections(&state, 1).await;

        let registry = state.connections.clone();
        let broadcaster = tokio::spawn(async move {
            loop {
                registry.broadcast(r#"{"notice":"tick"}"#).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match client.next_text().await {
                    Ok(_) => continue,
                    Err(e) => return e,
                }
            }
        })
        .await;
        broadcaster.abort();

        assert!(matches!(closed, Ok(ClientError::ConnectionClosed)));
        wait_for_connections(&state, 0).await;
    }

    #[tokio::test]
    async fn test_binary_and_ping_frames() {
        let state = test_state(None).await;
        let addr = spawn_server(state.clone()).await;
        let mut client = connect(addr).await;

        let frame = serde_json::to_vec(&sample_event()).unwrap();
        let first = client.send_binary(frame).await.unwrap();
        assert!(first.is_success());

        let ack = client.send_binary(vec![0xff, 0xfe, 0xfd]).await.unwrap();
        let Acknowledgment::Error { error } = ack else {
            unreachable!("expected a parse error, got {ack:?}")
        };
        assert!(error.starts_with("invalid JSON"), "{error}");

        // A ping is answered by the transport only; the next text frame
        // must be the acknowledgment of the following event.
        client.ping(b"keepalive".to_vec()).await.unwrap();
        let last = client.send_event(&sample_event()).await.unwrap();
        assert!(last.event_id().unwrap() > first.event_id().unwrap());

        let stored = state
            .processor()
            .process(CountEvents::default())
            .await
            .unwrap();
        assert_eq!(stored, 2);
        client.close().await.unwrap();
    }
}
