// src/bidding/dsp_client.rs

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::time::Instant;

use crate::model::partners::DspInventory;
use crate::openrtb::response::BidResponse;

/// 单次尝试的硬超时，独立于 auction 的 TMax 截止时间。
const ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);
const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Error)]
pub enum DspCallError {
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("DSP returned status {0}")]
    Status(u16),
    #[error("failed to decode DSP response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("auction deadline exceeded")]
    DeadlineExceeded,
}

/// **DSP 客户端**
/// 向单个 DSP 端点透传 SSP 原始请求体。连接池跨 auction 复用，
/// clone 共享同一个池。
#[derive(Clone)]
pub struct DspClient {
    client: reqwest::Client,
}

impl DspClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// POST 原始请求体到 `dsp.endpoint_url`，在 `deadline` 与单次尝试超时
    /// 二者中较早的时刻放弃。只有 200 且 JSON 可解析才算有响应。
    pub async fn call(
        &self,
        dsp: &DspInventory,
        body: Bytes,
        deadline: Instant,
    ) -> Result<BidResponse, DspCallError> {
        let attempt = async {
            let resp = self
                .client
                .post(&dsp.endpoint_url)
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(DspCallError::Transport)?;

            let status = resp.status();
            if status != StatusCode::OK {
                return Err(DspCallError::Status(status.as_u16()));
            }

            let bytes = resp.bytes().await.map_err(DspCallError::Transport)?;
            serde_json::from_slice(&bytes).map_err(DspCallError::Decode)
        };

        match tokio::time::timeout_at(deadline, attempt).await {
            Ok(result) => result,
            Err(_) => Err(DspCallError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn dsp_at(addr: SocketAddr) -> DspInventory {
        DspInventory {
            endpoint_url: format!("http://{addr}/bid"),
            status: "Active".to_string(),
            ..Default::default()
        }
    }

    fn bid_response_json() -> &'static str {
        r#"{"id":"req-1","seatbid":[{"bid":[{"id":"b1","impid":"1","price":1.5}]}]}"#
    }

    #[tokio::test]
    async fn decodes_valid_response() {
        let addr = serve(Router::new().route(
            "/bid",
            post(|| async { ([("content-type", "application/json")], bid_response_json()) }),
        ))
        .await;

        let client = DspClient::new().unwrap();
        let deadline = Instant::now() + Duration::from_millis(300);
        let resp = client
            .call(&dsp_at(addr), Bytes::from_static(b"{}"), deadline)
            .await
            .unwrap();
        assert!(resp.has_bid());
        assert_eq!(resp.seatbid[0].bid[0].price, 1.5);
    }

    #[tokio::test]
    async fn non_200_is_a_status_error() {
        let addr = serve(Router::new().route(
            "/bid",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;

        let client = DspClient::new().unwrap();
        let deadline = Instant::now() + Duration::from_millis(300);
        let err = client
            .call(&dsp_at(addr), Bytes::from_static(b"{}"), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, DspCallError::Status(500)));
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let addr = serve(Router::new().route("/bid", post(|| async { "not json" }))).await;

        let client = DspClient::new().unwrap();
        let deadline = Instant::now() + Duration::from_millis(300);
        let err = client
            .call(&dsp_at(addr), Bytes::from_static(b"{}"), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, DspCallError::Decode(_)));
    }

    #[tokio::test]
    async fn slow_dsp_hits_the_deadline() {
        let addr = serve(Router::new().route(
            "/bid",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(400)).await;
                bid_response_json()
            }),
        ))
        .await;

        let client = DspClient::new().unwrap();
        let deadline = Instant::now() + Duration::from_millis(100);
        let start = std::time::Instant::now();
        let err = client
            .call(&dsp_at(addr), Bytes::from_static(b"{}"), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, DspCallError::DeadlineExceeded));
        // 截止时间生效，没有等慢 DSP 返回
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let client = DspClient::new().unwrap();
        let dsp = DspInventory {
            endpoint_url: "http://127.0.0.1:1/bid".to_string(),
            ..Default::default()
        };
        let deadline = Instant::now() + Duration::from_millis(300);
        let err = client
            .call(&dsp, Bytes::from_static(b"{}"), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, DspCallError::Transport(_)));
    }
}
