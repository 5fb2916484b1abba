use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{ChatService, ChatServiceDependencies, LocalRoomBroadcaster, SystemClock};
use axum::Router;
use infrastructure::InMemoryChatRoomRepository;
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use uuid::Uuid;
use web_api::{router as build_router_fn, AppState, JwtConfig, JwtService};

pub const TEST_JWT_SECRET: &str = "test-secret-key-with-at-least-32-characters";

/// 内存仓储上的完整路由，测试不需要外部数据库。
pub fn build_router() -> (Router, Arc<JwtService>) {
    let broadcaster = Arc::new(LocalRoomBroadcaster::new());

    let chat_service = ChatService::new(ChatServiceDependencies {
        room_repository: Arc::new(InMemoryChatRoomRepository::new()),
        clock: Arc::new(SystemClock),
        broadcaster: broadcaster.clone(),
    });

    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        expiration_hours: 24,
    }));

    let state = AppState::new(Arc::new(chat_service), broadcaster, jwt_service.clone());

    (build_router_fn(state), jwt_service)
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub jwt_service: Arc<JwtService>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// 在随机端口上启动服务，Drop 时触发优雅关闭。
    pub async fn spawn() -> Self {
        let (router, jwt_service) = build_router();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // allow server to start
        sleep(Duration::from_millis(100)).await;

        Self {
            addr,
            jwt_service,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn http_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.jwt_service
            .generate_token(user_id)
            .expect("generate token")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
