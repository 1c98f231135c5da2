use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::client::registry::{ConnectionId, Frame, PeerHandle, SharedRegistry};
use crate::client::session::Session;
use crate::config::RelayConfig;
use crate::error::RelayError;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// How long the writer gets to flush its queue once the reader has stopped.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves one client connection from upgrade to close.
///
/// - Performs the WebSocket handshake, rejecting requests for the wrong path.
/// - Spawns a writer task that drains the connection's outbound queue.
/// - Feeds every inbound frame to the connection's [`Session`].
/// - Always runs session cleanup, however the connection ended.
pub async fn handle_connection(
    stream: TcpStream,
    client_addr: SocketAddr,
    connection_id: ConnectionId,
    registry: SharedRegistry,
    config: Arc<RelayConfig>,
) -> Result<(), RelayError> {
    let ws = accept(stream, &config).await?;
    info!("New connection #{} from {}", connection_id, client_addr);

    let (sink, mut source) = ws.split();
    let (tx, rx) = mpsc::channel(config.outbound_buffer);
    let handle = PeerHandle::new(connection_id, tx);
    let mut session = Session::new(
        client_addr,
        handle.clone(),
        registry,
        config.close_superseded,
    );

    let mut writer = tokio::spawn(write_frames(sink, rx, client_addr));

    let result = read_frames(
        &mut source,
        &mut session,
        &handle,
        config.keepalive_interval(),
        client_addr,
    )
    .await;

    session.close().await;

    // The registry no longer holds this handle, so once these go the
    // writer sees the end of its queue.
    handle.deliver(Frame::Close);
    drop(session);
    drop(handle);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        debug!("Writer for {} did not finish, aborting", client_addr);
        writer.abort();
    }

    info!("Connection #{} from {} closed", connection_id, client_addr);
    result
}

async fn accept(
    stream: TcpStream,
    config: &RelayConfig,
) -> Result<WebSocketStream<TcpStream>, RelayError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(config.max_message_size),
        ..WebSocketConfig::default()
    };

    let check_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if config.accepts_path(request.uri().path()) {
            Ok(response)
        } else {
            warn!("Rejecting upgrade for path {}", request.uri().path());
            let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let ws =
        tokio_tungstenite::accept_hdr_async_with_config(stream, check_path, Some(ws_config))
            .await?;
    Ok(ws)
}

async fn read_frames(
    source: &mut WsSource,
    session: &mut Session,
    handle: &PeerHandle,
    keepalive: Option<Duration>,
    client_addr: SocketAddr,
) -> Result<(), RelayError> {
    let mut ticker = keepalive.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            message = source.next() => {
                last_seen = Instant::now();
                match message {
                    Some(Ok(Message::Text(text))) => session.handle_text(&text).await,
                    Some(Ok(Message::Binary(data))) => session.handle_binary(&data).await,
                    Some(Ok(Message::Close(_))) => {
                        debug!("Close frame from {}", client_addr);
                        return Ok(());
                    }
                    // ping/pong replies are handled by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
            _ = tick(&mut ticker) => {
                if let Some(period) = keepalive {
                    if last_seen.elapsed() > period * 2 {
                        warn!(
                            "No traffic from {} for {:?}, closing",
                            client_addr,
                            last_seen.elapsed()
                        );
                        return Ok(());
                    }
                }
                handle.deliver(Frame::Ping);
            }
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn write_frames(mut sink: WsSink, mut rx: mpsc::Receiver<Frame>, client_addr: SocketAddr) {
    while let Some(frame) = rx.recv().await {
        let result = match frame {
            Frame::Text(text) => sink.send(Message::Text(text)).await,
            Frame::Ping => sink.send(Message::Ping(Vec::new())).await,
            Frame::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        };
        if let Err(e) = result {
            debug!("Write to {} failed: {}", client_addr, e);
            break;
        }
    }
    let _ = sink.close().await;
}
