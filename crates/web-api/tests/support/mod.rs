#![allow(dead_code)]

//! 测试辅助：用内存仓储、真实 JWT 与 bcrypt 启动完整的 HTTP/WebSocket 服务

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::repository::memory::{MemoryMessageRepository, MemoryUserRepository};
use application::{
    BroadcastCoordinator, CoordinatorDependencies, CredentialAuthority, IdentityResolver,
    MessageRepository, PresenceRegistry, SystemClock, UserRepository, UserService,
    UserServiceDependencies,
};
use config::JwtConfig;
use futures_util::{SinkExt, StreamExt};
use infrastructure::{BcryptPasswordHasher, JwtCredentialAuthority};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    _shutdown: oneshot::Sender<()>,
}

pub async fn spawn_server() -> TestServer {
    let users: Arc<dyn UserRepository> = Arc::new(MemoryUserRepository::new());
    let messages: Arc<dyn MessageRepository> = Arc::new(MemoryMessageRepository::new());
    let credentials: Arc<dyn CredentialAuthority> =
        Arc::new(JwtCredentialAuthority::new(&JwtConfig {
            secret: "integration-test-secret-with-enough-length".to_string(),
            expiration_hours: 1,
        }));

    let user_service = Arc::new(UserService::new(UserServiceDependencies {
        user_repository: users.clone(),
        password_hasher: Arc::new(BcryptPasswordHasher::new(Some(4))),
        clock: Arc::new(SystemClock),
    }));
    let coordinator = Arc::new(BroadcastCoordinator::new(CoordinatorDependencies {
        identity_resolver: Arc::new(IdentityResolver::new(credentials.clone(), users.clone())),
        message_repository: messages,
        user_repository: users,
        registry: Arc::new(PresenceRegistry::new()),
    }));

    let app = router(AppState::new(user_service, coordinator, credentials, 64));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        addr,
        client: Client::new(),
        _shutdown: shutdown_tx,
    }
}

impl TestServer {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/api/v1/ws?token={}", self.addr, token)
    }

    /// 注册并登录，返回 token
    pub async fn register_and_login(&self, username: &str, color: &str) -> String {
        let email = format!("{username}@example.com");
        let response = self
            .client
            .post(self.http("/api/v1/auth/register"))
            .json(&json!({
                "username": username,
                "email": email,
                "password": "secret1",
                "color": color,
            }))
            .send()
            .await
            .expect("register");
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let login: Value = self
            .client
            .post(self.http("/api/v1/auth/login"))
            .json(&json!({"email": email, "password": "secret1"}))
            .send()
            .await
            .expect("login")
            .json()
            .await
            .expect("login json");
        login["token"].as_str().expect("token").to_string()
    }

    pub async fn connect(&self, token: &str) -> WsClient {
        let (socket, _) = connect_async(self.ws_url(token)).await.expect("ws connect");
        socket
    }
}

/// 读取下一个 JSON 事件，跳过控制帧
pub async fn next_event(socket: &mut WsClient) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("ws error");
        match frame {
            TungsteniteMessage::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("event json")
            }
            TungsteniteMessage::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// 读取直到出现指定名称的事件
pub async fn next_named(socket: &mut WsClient, name: &str) -> Value {
    loop {
        let event = next_event(socket).await;
        if event["event"] == name {
            return event;
        }
    }
}

pub async fn send_event(socket: &mut WsClient, event: Value) {
    socket
        .send(TungsteniteMessage::Text(event.to_string().into()))
        .await
        .expect("ws send");
}
