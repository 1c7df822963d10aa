//! HTTP API（`/api/v1/media`）
//!
//! アシスタント呼び出しの中継と、ワークブック一括処理のトリガーを提供する。
//! 一括処理は同時に1件だけ実行する。

pub mod error;
mod routes;

pub use error::{ApiError, ApiResult};

use crate::config::Config;
use crate::dispatcher::AssistantClient;
use crate::error::Result;
use crate::pipeline::{ContentPipeline, RemotePipeline};
use axum::http::HeaderValue;
use axum::Router;
use media_tracker_common::Taxonomy;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const API_PREFIX: &str = "/api/v1/media";

/// ハンドラ間で共有する状態
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub taxonomy: Arc<Taxonomy>,
    pub assistants: Arc<AssistantClient>,
    pub pipeline: Arc<dyn ContentPipeline>,
    /// 一括処理の実行中に保持
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        config: Config,
        taxonomy: Taxonomy,
        assistants: Arc<AssistantClient>,
        pipeline: Arc<dyn ContentPipeline>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            taxonomy: Arc::new(taxonomy),
            assistants,
            pipeline,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 設定から実際のアシスタントAPIを使う状態を組み立てる
    pub fn from_config(config: Config) -> Result<Self> {
        let taxonomy = config.load_taxonomy()?;
        let assistants = Arc::new(AssistantClient::new(&config)?);
        let pipeline = Arc::new(RemotePipeline::from_config(&config, assistants.clone())?);
        Ok(Self::new(config, taxonomy, assistants, pipeline))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .nest(API_PREFIX, routes::media_routes(upload_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "invalid CORS origin ignored");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// サーバーを起動（終了まで戻らない）
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.bind_addr.clone();
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
