// src/bidding/engine.rs

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::bidding::dsp_client::DspClient;
use crate::metrics;
use crate::model::partners::DspInventory;
use crate::openrtb::response::BidResponse;

/// 竞价胜出结果：响应、对应的 DSP 库存、以及全场最高出价。
pub struct AuctionWinner {
    pub response: BidResponse,
    pub dsp: DspInventory,
    pub price: f64,
}

/// **并发询价并选出最高价**
///
/// 为每个入围 DSP 派生一个任务，在 `tmax_ms` 的截止时间内透传原始请求体。
/// 截止时间挂在后台根上：SSP 客户端断开不会取消进行中的 auction。
/// 部分 DSP 失败是常态，不向上传播；赢家是截止前收到的响应里
/// 价格严格最高的那个 bid，平价按先到先得。
pub async fn conduct_auction(
    tmax_ms: u64,
    raw_body: Bytes,
    shortlisted: Vec<DspInventory>,
    client: &DspClient,
) -> Option<AuctionWinner> {
    let deadline = Instant::now() + Duration::from_millis(tmax_ms);
    let (tx, mut rx) = mpsc::channel::<(BidResponse, DspInventory)>(shortlisted.len().max(1));

    for dsp in shortlisted {
        let client = client.clone();
        let body = raw_body.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            metrics::DSP_REQUEST_COUNTER
                .with_label_values(&[
                    &dsp.prometheus_identifier,
                    &dsp.tenant_identifier,
                    &dsp.dsp_identifier,
                ])
                .inc();

            let start = Instant::now();
            let result = client.call(&dsp, body, deadline).await;
            let latency = start.elapsed().as_secs_f64();

            metrics::DSP_LATENCY_HISTOGRAM
                .with_label_values(&[
                    &dsp.prometheus_identifier,
                    &dsp.tenant_identifier,
                    &dsp.dsp_identifier,
                ])
                .observe(latency);

            match result {
                Err(e) => {
                    debug!(dsp = %dsp.dsp_identifier, "DSP call failed: {e}");
                    metrics::DSP_RESPONSE_COUNTER
                        .with_label_values(&[
                            &dsp.prometheus_identifier,
                            &dsp.tenant_identifier,
                            &dsp.dsp_identifier,
                            "error",
                        ])
                        .inc();
                }
                Ok(resp) => {
                    let status = if resp.has_bid() { "bid" } else { "nobid" };
                    metrics::DSP_RESPONSE_COUNTER
                        .with_label_values(&[
                            &dsp.prometheus_identifier,
                            &dsp.tenant_identifier,
                            &dsp.dsp_identifier,
                            status,
                        ])
                        .inc();
                    // 通道容量等于任务数，send 不会阻塞
                    let _ = tx.send((resp, dsp)).await;
                }
            }
        });
    }
    drop(tx);

    // 所有任务的调用都受 deadline 约束，发送端全部释放后 recv 返回 None，
    // 因此收集循环最迟在截止时间附近结束，迟到的响应不参与选择。
    let mut winner: Option<AuctionWinner> = None;
    let mut max_price = 0.0f64;
    while let Some((resp, dsp)) = rx.recv().await {
        let top = resp
            .seatbid
            .iter()
            .flat_map(|sb| sb.bid.iter())
            .map(|bid| bid.price)
            .fold(f64::MIN, f64::max);
        if top > max_price {
            max_price = top;
            winner = Some(AuctionWinner {
                response: resp,
                dsp,
                price: top,
            });
        }
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openrtb::response::{Bid, SeatBid};
    use axum::routing::post;
    use axum::Router;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn response_with_price(id: &str, price: f64) -> String {
        let resp = BidResponse {
            id: id.to_string(),
            seatbid: vec![SeatBid {
                bid: vec![Bid {
                    id: format!("bid-{id}"),
                    impid: "1".to_string(),
                    price,
                    adm: None,
                    nurl: None,
                    adid: None,
                    adomain: None,
                    cid: None,
                    crid: None,
                    cat: None,
                    attr: None,
                    dealid: None,
                    w: None,
                    h: None,
                    ext: None,
                }],
                seat: None,
                group: None,
            }],
            bidid: None,
            cur: Some("USD".to_string()),
            customdata: None,
            nbr: None,
        };
        serde_json::to_string(&resp).unwrap()
    }

    async fn mock_dsp(price: f64, delay: Duration) -> SocketAddr {
        let body = Arc::new(response_with_price("mock", price));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/bid",
            post(move || {
                let body = Arc::clone(&body);
                async move {
                    tokio::time::sleep(delay).await;
                    ([("content-type", "application/json")], body.to_string())
                }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn dsp_at(addr: SocketAddr, id: u32) -> DspInventory {
        DspInventory {
            dsp_id: id,
            dsp_identifier: format!("dsp_{id}"),
            endpoint_url: format!("http://{addr}/bid"),
            status: "Active".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn picks_the_highest_price() {
        let a = mock_dsp(1.2, Duration::ZERO).await;
        let b = mock_dsp(2.5, Duration::ZERO).await;
        let client = DspClient::new().unwrap();

        let winner = conduct_auction(
            300,
            Bytes::from_static(b"{}"),
            vec![dsp_at(a, 1), dsp_at(b, 2)],
            &client,
        )
        .await
        .unwrap();

        assert_eq!(winner.dsp.dsp_id, 2);
        assert_eq!(winner.price, 2.5);
    }

    #[tokio::test]
    async fn slow_dsp_misses_the_deadline() {
        let fast = mock_dsp(1.0, Duration::from_millis(50)).await;
        let slow = mock_dsp(9.0, Duration::from_millis(400)).await;
        let client = DspClient::new().unwrap();

        let start = std::time::Instant::now();
        let winner = conduct_auction(
            200,
            Bytes::from_static(b"{}"),
            vec![dsp_at(fast, 1), dsp_at(slow, 2)],
            &client,
        )
        .await
        .unwrap();

        // 高价但迟到的 DSP 不参与选择，响应时间贴着截止线
        assert_eq!(winner.dsp.dsp_id, 1);
        assert_eq!(winner.price, 1.0);
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn all_dsps_late_means_no_winner() {
        let a = mock_dsp(2.0, Duration::from_millis(400)).await;
        let b = mock_dsp(3.0, Duration::from_millis(400)).await;
        let client = DspClient::new().unwrap();

        let start = std::time::Instant::now();
        let winner = conduct_auction(
            150,
            Bytes::from_static(b"{}"),
            vec![dsp_at(a, 1), dsp_at(b, 2)],
            &client,
        )
        .await;

        assert!(winner.is_none());
        assert!(start.elapsed() < Duration::from_millis(320));
    }

    #[tokio::test]
    async fn failing_dsps_do_not_fail_the_auction() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bad = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/bid",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let good = mock_dsp(0.8, Duration::ZERO).await;
        let client = DspClient::new().unwrap();
        let winner = conduct_auction(
            300,
            Bytes::from_static(b"{}"),
            vec![dsp_at(bad, 1), dsp_at(good, 2)],
            &client,
        )
        .await
        .unwrap();
        assert_eq!(winner.dsp.dsp_id, 2);
    }

    #[tokio::test]
    async fn empty_shortlist_yields_nothing() {
        let client = DspClient::new().unwrap();
        let winner = conduct_auction(300, Bytes::from_static(b"{}"), Vec::new(), &client).await;
        assert!(winner.is_none());
    }
}
