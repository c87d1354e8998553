use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use once_cell::sync::OnceCell;
use salvo::prelude::*;
use tracing::info;

use crate::bot::Dispatcher;
use crate::config::Config;
use crate::db::DatabaseManager;
use crate::line::LineClient;

pub mod api;
pub mod callback;
pub mod health;
pub mod metrics;

use api::{checkin, get_checkins, line_reply, list_users, register};
use callback::webhook_callback;
use health::{get_status, health_check};
use metrics::metrics_endpoint;

#[derive(Clone)]
pub struct WebState {
    pub db_manager: Arc<DatabaseManager>,
    pub dispatcher: Arc<Dispatcher>,
    pub line_client: Arc<LineClient>,
    pub started_at: Instant,
}

static WEB_STATE: OnceCell<WebState> = OnceCell::new();

pub fn web_state() -> &'static WebState {
    WEB_STATE
        .get()
        .expect("web state is not initialized before handler execution")
}

#[derive(Clone)]
pub struct WebServer {
    config: Arc<Config>,
}

impl WebServer {
    pub fn new(
        config: Arc<Config>,
        db_manager: Arc<DatabaseManager>,
        dispatcher: Arc<Dispatcher>,
        line_client: Arc<LineClient>,
    ) -> Self {
        let _ = WEB_STATE.set(WebState {
            db_manager,
            dispatcher,
            line_client,
            started_at: Instant::now(),
        });

        Self { config }
    }

    pub async fn start(&self) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        info!("starting web server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor).serve(root_router()).await;

        Ok(())
    }
}

pub fn root_router() -> Router {
    Router::new()
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("status").get(get_status))
        .push(Router::with_path("metrics").get(metrics_endpoint))
        .push(Router::with_path("callback").post(webhook_callback))
        .push(
            Router::with_path("api")
                .push(Router::with_path("checkin").post(checkin))
                .push(Router::with_path("checkins/{user_id}").get(get_checkins))
                .push(Router::with_path("line_reply").post(line_reply))
                .push(Router::with_path("register").post(register))
                .push(Router::with_path("users").get(list_users)),
        )
}

#[cfg(test)]
pub(crate) mod test_harness {
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use async_trait::async_trait;
    use once_cell::sync::Lazy;
    use tempfile::TempDir;

    use super::{WEB_STATE, WebState, web_state};
    use crate::bot::Dispatcher;
    use crate::config::Config;
    use crate::db::DatabaseManager;
    use crate::line::{LineClient, LineError, ProfileResolver, ReplySender};

    pub const RESOLVED_NAME: &str = "Webhook User";

    // The push endpoint points at an unroutable port; handlers treat push
    // failures as non-fatal, which is exactly the behavior under test.
    const TEST_CONFIG_YAML: &str = r#"
line:
  channel_access_token: "handler-test-token"
  channel_secret: "handler-test-secret"
  api_base_url: "http://127.0.0.1:9"
database:
  filename: "unused.db"
"#;

    pub struct CapturingSender {
        replies: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReplySender for CapturingSender {
        async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), LineError> {
            self.replies
                .lock()
                .unwrap()
                .push((reply_token.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct StaticResolver;

    #[async_trait]
    impl ProfileResolver for StaticResolver {
        async fn display_name(&self, _line_user_id: &str) -> Result<String, LineError> {
            Ok(RESOLVED_NAME.to_string())
        }
    }

    static DB_DIR: Lazy<TempDir> = Lazy::new(|| TempDir::new().unwrap());
    static SENDER: Lazy<Arc<CapturingSender>> = Lazy::new(|| {
        Arc::new(CapturingSender {
            replies: Mutex::new(Vec::new()),
        })
    });
    static SERIAL: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

    /// Handler tests share one process-wide `WebState`, so they run one at a
    /// time; otherwise count assertions would interleave.
    pub async fn serial_guard() -> tokio::sync::MutexGuard<'static, ()> {
        SERIAL.lock().await
    }

    pub async fn ensure_state() -> &'static WebState {
        if WEB_STATE.get().is_none() {
            let path = DB_DIR.path().join("web.db").to_string_lossy().into_owned();
            let db = Arc::new(DatabaseManager::new_sqlite(path));
            db.migrate().await.unwrap();

            let config: Config = serde_yaml::from_str(TEST_CONFIG_YAML).unwrap();
            let line_client = Arc::new(LineClient::new(Arc::new(config)).unwrap());
            let dispatcher = Arc::new(Dispatcher::new(
                db.clone(),
                Arc::new(StaticResolver),
                SENDER.clone(),
            ));

            let _ = WEB_STATE.set(WebState {
                db_manager: db,
                dispatcher,
                line_client,
                started_at: Instant::now(),
            });
        }

        web_state()
    }

    pub fn sent_replies() -> Vec<(String, String)> {
        SENDER.replies.lock().unwrap().clone()
    }
}
