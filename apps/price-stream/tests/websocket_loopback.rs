//! WebSocket Loopback Integration Tests
//!
//! Runs the real tokio-tungstenite transport against a local server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use price_stream::{ConnectionState, PriceStreamClient, StreamConfig};

const WAIT: Duration = Duration::from_secs(10);

/// What the server saw on each accepted connection.
#[derive(Debug, Default, Clone)]
struct Session {
    query: Option<String>,
    subscribes: Vec<String>,
    close_code: Option<CloseCode>,
}

/// Accepts connections forever. Each connection reads one subscribe frame
/// per instrument and replies with one trade. The first connection is then
/// dropped; later ones send a ping and stay open until the client closes.
async fn start_server(
    instruments: usize,
    trades: Vec<&'static str>,
) -> (String, Arc<Mutex<Vec<Session>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sessions: Arc<Mutex<Vec<Session>>> = Arc::default();
    let recorded = Arc::clone(&sessions);

    tokio::spawn(async move {
        let mut index = 0;
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let session_index = index;
            index += 1;
            let trade = trades[session_index.min(trades.len() - 1)];
            let recorded = Arc::clone(&recorded);
            recorded.lock().push(Session::default());

            tokio::spawn(async move {
                let record_query = Arc::clone(&recorded);
                let callback = move |request: &Request,
                                     response: Response|
                      -> Result<Response, ErrorResponse> {
                    record_query.lock()[session_index].query =
                        request.uri().query().map(ToString::to_string);
                    Ok(response)
                };
                let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                    .await
                    .unwrap();

                let mut subscribes = Vec::new();
                while subscribes.len() < instruments {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => subscribes.push(text.to_string()),
                        Some(Ok(_)) => {}
                        _ => return,
                    }
                }
                recorded.lock()[session_index].subscribes = subscribes;

                ws.send(Message::Text(trade.into())).await.unwrap();

                if session_index == 0 {
                    // abrupt drop, no close handshake
                    drop(ws);
                    return;
                }

                ws.send(Message::Ping(Vec::new().into())).await.unwrap();

                let mut close_code = None;
                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Close(frame) = message {
                        close_code = frame.map(|f| f.code);
                        break;
                    }
                }
                recorded.lock()[session_index].close_code = close_code;
            });
        }
    });

    (format!("ws://{addr}"), sessions)
}

fn config(endpoint: String) -> StreamConfig {
    let mut config = StreamConfig::new("loopback-token");
    config.endpoint = endpoint;
    config.instruments = vec!["OANDA:EUR_USD".to_string(), "OANDA:GBP_USD".to_string()];
    config.websocket.reconnect_delay = Duration::from_millis(100);
    config.websocket.reconnect_delay_max = Duration::from_millis(100);
    config
}

fn price_of(client: &PriceStreamClient, symbol: &str) -> f64 {
    client
        .snapshot()
        .into_iter()
        .find(|q| q.instrument.as_str() == symbol)
        .map(|q| q.price)
        .unwrap()
}

#[tokio::test]
async fn streams_reconnects_and_closes_over_real_websocket() {
    let (endpoint, sessions) = start_server(
        2,
        vec![
            r#"{"type":"trade","data":[{"s":"OANDA:EUR_USD","p":1.0842,"t":1718000000000,"v":0}]}"#,
            r#"{"type":"trade","data":[{"s":"OANDA:GBP_USD","p":1.2731,"t":1718000000001,"v":0}]}"#,
        ],
    )
    .await;

    let client = PriceStreamClient::new(&config(endpoint)).unwrap();
    let mut changes = client.changes();
    client.start().unwrap();

    timeout(WAIT, changes.wait_for(|rev| *rev >= 2))
        .await
        .expect("both trades should arrive")
        .unwrap();

    assert_eq!(price_of(&client, "OANDA:EUR_USD"), 1.0842);
    assert_eq!(price_of(&client, "OANDA:GBP_USD"), 1.2731);
    assert!(client.stats().reconnect_attempts >= 1);

    timeout(
        WAIT,
        client
            .state_changes()
            .wait_for(|s| *s == ConnectionState::Streaming),
    )
    .await
    .unwrap()
    .unwrap();

    client.stop().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // let the server observe the close frame
    timeout(WAIT, async {
        while sessions.lock().get(1).and_then(|s| s.close_code).is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server should see a close frame");

    let sessions = sessions.lock().clone();
    let expected = vec![
        r#"{"type":"subscribe","symbol":"OANDA:EUR_USD"}"#.to_string(),
        r#"{"type":"subscribe","symbol":"OANDA:GBP_USD"}"#.to_string(),
    ];

    assert_eq!(sessions[0].query.as_deref(), Some("token=loopback-token"));
    assert_eq!(sessions[0].subscribes, expected);
    assert_eq!(sessions[1].subscribes, expected);
    assert_eq!(sessions[1].close_code, Some(CloseCode::Away));
}

#[tokio::test]
async fn unreachable_endpoint_keeps_retrying_until_stopped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = PriceStreamClient::new(&config(endpoint)).unwrap();
    client.start().unwrap();

    timeout(WAIT, async {
        while client.stats().reconnect_attempts < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("connect failures should be retried");

    assert_ne!(client.state(), ConnectionState::Streaming);
    client.stop().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.stats().sessions_opened, 0);
}
