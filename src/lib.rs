pub mod api;
pub mod bidding;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod mock_dsp;
pub mod model;
pub mod openrtb;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use bidding::dsp_client::DspClient;
use config::partner_registry::PartnerRegistry;

/// 各 HTTP handler 共享的进程状态。
pub struct AppState {
    pub registry: Arc<PartnerRegistry>,
    pub dsp_client: DspClient,
}

/// 业务监听面：auction 入口与存活探针。
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/openrtb2/auction", post(api::handlers::handle_auction))
        .route("/status", get(api::handlers::handle_status))
        .with_state(state)
}

/// 独立的指标监听面。
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(api::handlers::handle_metrics))
}
