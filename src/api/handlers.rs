use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use tracing::error;

use crate::bidding::engine::{conduct_auction, AuctionWinner};
use crate::bidding::targeting::shortlist_dsps;
use crate::logging::bid_logger::get_bid_logger;
use crate::logging::event::{AppSource, AuctionEvent, EventSource, WebSource};
use crate::metrics;
use crate::model::partners::SspInventory;
use crate::openrtb::request::BidRequest;
use crate::AppState;

/// 每次 auction 最多询价的 DSP 数。
const MAX_FANOUT_DSPS: usize = 5;
/// TMax 小于等于该值的请求直接拒绝，毫秒。
const MIN_TMAX_MS: u64 = 120;

#[derive(Deserialize)]
pub struct AuctionParams {
    pub account_code: Option<String>,
}

/// **处理 OpenRTB 竞价请求**
///
/// 线性状态机：校验投放开关 → 认证 SSP → 解析请求 → 入围 DSP →
/// 并发询价 → 返回最高出价。原始请求体原样转发给 DSP 并写入
/// 竞价事件，类型化解析只用于内存判断。
pub async fn handle_auction(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuctionParams>,
    body: Bytes,
) -> Response {
    // 1. 投放总开关
    let cfg = state.registry.get_config();
    let serving = cfg.as_ref().map(|c| c.ad_serving).unwrap_or(false);
    if !serving {
        metrics::AUCTION_COUNTER
            .with_label_values(&["rejected_adserving_disabled"])
            .inc();
        return StatusCode::NO_CONTENT.into_response();
    }

    // 2. 认证：account_code 必须对应一条 SSP 库存
    let Some(account_code) = params.account_code.as_deref() else {
        return (StatusCode::UNAUTHORIZED, "Missing account_code").into_response();
    };
    let Some(ssp) = state.registry.get_ssp_by_inventory_code(account_code) else {
        return (StatusCode::UNAUTHORIZED, "Invalid account_code").into_response();
    };

    metrics::SSP_REQUEST_COUNTER
        .with_label_values(&[
            &ssp.prometheus_identifier,
            &ssp.tenant_identifier,
            &ssp.ssp_identifier,
        ])
        .inc();

    // 3. 解析 BidRequest
    let bid_req: BidRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    // 4. TMax 下限校验
    let tmax = bid_req.tmax.unwrap_or(0);
    if tmax <= MIN_TMAX_MS {
        metrics::AUCTION_COUNTER
            .with_label_values(&["rejected_tmax"])
            .inc();
        ssp_response_marked(&ssp, "error");
        return StatusCode::NO_CONTENT.into_response();
    }

    // 5. 入围 DSP
    let candidates = state.registry.get_dsps_by_tenant(ssp.tenant_id);
    let selected = shortlist_dsps(&bid_req, &candidates, MAX_FANOUT_DSPS);
    if selected.is_empty() {
        ssp_response_marked(&ssp, "no_bid");
        return StatusCode::NO_CONTENT.into_response();
    }

    // 6. 并发询价，选出最高出价
    let winner = conduct_auction(tmax, body.clone(), selected, &state.dsp_client).await;
    let Some(winner) = winner else {
        ssp_response_marked(&ssp, "no_bid");
        return StatusCode::NO_CONTENT.into_response();
    };

    // 7. 序列化获胜响应
    let resp_body = match serde_json::to_vec(&winner.response) {
        Ok(b) => b,
        Err(e) => {
            error!("failed to serialize winning bid response: {e}");
            ssp_response_marked(&ssp, "error");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // 8. 异步记录竞价事件，不阻塞响应
    if let Some(logger) = get_bid_logger() {
        logger.log(build_event(&ssp, &bid_req, &body, &winner, &resp_body));
    }

    // 9. 返回获胜响应
    metrics::AUCTION_COUNTER.with_label_values(&["ok"]).inc();
    ssp_response_marked(&ssp, "ok");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        resp_body,
    )
        .into_response()
}

fn ssp_response_marked(ssp: &SspInventory, status: &str) {
    metrics::SSP_RESPONSE_COUNTER
        .with_label_values(&[
            &ssp.prometheus_identifier,
            &ssp.tenant_identifier,
            &ssp.ssp_identifier,
            status,
        ])
        .inc();
}

fn build_event(
    ssp: &SspInventory,
    bid_req: &BidRequest,
    raw_body: &Bytes,
    winner: &AuctionWinner,
    resp_body: &[u8],
) -> AuctionEvent {
    let source = if let Some(app) = &bid_req.app {
        Some(EventSource::App(AppSource {
            id: app.id.clone().unwrap_or_default(),
            name: app.name.clone().unwrap_or_default(),
            bundle: app.bundle.clone().unwrap_or_default(),
            domain: app.domain.clone().unwrap_or_default(),
        }))
    } else {
        bid_req.site.as_ref().map(|site| {
            EventSource::Web(WebSource {
                domain: site.domain.clone().unwrap_or_default(),
                page: site.page.clone().unwrap_or_default(),
            })
        })
    };

    AuctionEvent {
        tenant_id: ssp.tenant_id,
        ssp_partner_id: ssp.ssp_id,
        ssp_inventory_id: ssp.ssp_inventory_id,
        ssp_partner_auction_id: bid_req.id.clone(),
        dsp_partner_id: winner.dsp.dsp_id,
        dsp_inventory_id: winner.dsp.dsp_inventory_id,
        dsp_price: winner.price,
        bid_request_price: bid_req.imp.first().and_then(|imp| imp.bidfloor).unwrap_or(0.0),
        raw_bid_request: raw_body.to_vec(),
        raw_dsp_response: resp_body.to_vec(),
        source,
        // 主机名与时间戳在入队时由 logger 盖章
        hostname: String::new(),
        timestamp: 0,
    }
}

/// 存活探针：单行文本带当前时间。
pub async fn handle_status() -> String {
    format!(
        "OK. RTB Exchange is running, Current Request Time: {}\n",
        Utc::now().to_rfc3339()
    )
}

/// Prometheus 文本格式导出，挂在独立的监听端口上。
pub async fn handle_metrics() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
        .into_response()
}
