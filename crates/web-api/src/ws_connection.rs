use application::{ChatConnection, ClientEvent, ServerEvent};
use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// 读任务交给写任务的控制帧
#[derive(Debug)]
enum WsCommand {
    SendPong(axum::body::Bytes),
}

/// 单条 WebSocket 连接的传输驱动
///
/// 写任务把连接的发送队列序列化为文本帧；读任务逐条解析入站事件，
/// 并按顺序等待处理完成，保证同一连接的事件有序。
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    credential: Option<String>,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, credential: Option<String>) -> Self {
        Self {
            socket,
            state,
            credential,
        }
    }

    pub async fn run(self) {
        let Self {
            socket,
            state,
            credential,
        } = self;
        let (mut sender, mut incoming) = socket.split();

        let (outbox_tx, outbox_rx) = mpsc::channel::<ServerEvent>(state.outbox_capacity);
        let mut connection = ChatConnection::new(state.coordinator.clone());
        let connection_id = connection.id();

        if let Err(err) = connection.open(credential.as_deref(), outbox_tx).await {
            let (code, reason) = if err.is_connection_fatal() {
                (close_code::POLICY, "unauthorized")
            } else {
                (close_code::ERROR, "internal error")
            };
            tracing::info!(%connection_id, error = %err, code, "closing websocket");
            let frame = CloseFrame {
                code,
                reason: reason.into(),
            };
            if sender.send(WsMessage::Close(Some(frame))).await.is_err() {
                tracing::debug!(%connection_id, "peer gone before close frame");
            }
            return;
        }

        let shutdown = CancellationToken::new();
        let (cmd_tx, cmd_rx) = mpsc::channel::<WsCommand>(8);
        let send_task = tokio::spawn(Self::write_loop(
            sender,
            outbox_rx,
            cmd_rx,
            shutdown.clone(),
        ));

        loop {
            // 只在两条事件之间响应取消，正在处理的事件总能完成
            let frame = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                frame = incoming.next() => frame,
            };

            let message = match frame {
                Some(Ok(message)) => message,
                Some(Err(err)) => {
                    tracing::debug!(%connection_id, error = %err, "websocket read error");
                    break;
                }
                None => break,
            };

            match message {
                WsMessage::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => connection.handle(event).await,
                    Err(err) => {
                        tracing::warn!(%connection_id, error = %err, "ignoring malformed client event");
                    }
                },
                WsMessage::Ping(data) => {
                    if cmd_tx.send(WsCommand::SendPong(data)).await.is_err() {
                        break;
                    }
                }
                WsMessage::Close(_) => {
                    tracing::debug!(%connection_id, "client closed websocket");
                    break;
                }
                WsMessage::Pong(_) | WsMessage::Binary(_) => {}
            }
        }

        shutdown.cancel();
        connection.close().await;
        if let Err(err) = send_task.await {
            tracing::warn!(%connection_id, error = %err, "websocket writer task failed");
        }
        tracing::info!(%connection_id, "websocket disconnected");
    }

    async fn write_loop(
        mut sender: SplitSink<WebSocket, WsMessage>,
        mut outbox: mpsc::Receiver<ServerEvent>,
        mut commands: mpsc::Receiver<WsCommand>,
        shutdown: CancellationToken,
    ) {
        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = outbox.recv() => match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(json) => WsMessage::Text(json.into()),
                        Err(err) => {
                            tracing::warn!(event = event.name(), error = %err, "failed to serialize websocket payload");
                            continue;
                        }
                    },
                    // 会话已从注册表移除
                    None => break,
                },
                Some(command) = commands.recv() => match command {
                    WsCommand::SendPong(data) => WsMessage::Pong(data),
                },
            };

            if sender.send(frame).await.is_err() {
                tracing::debug!("websocket write failed");
                break;
            }
        }

        // 写端结束后通知读循环退出
        shutdown.cancel();
        let _ = sender.close().await;
    }
}
