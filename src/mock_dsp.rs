use axum::serve;
use axum::{routing::post, Json, Router};
use rand::Rng;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::openrtb::request::BidRequest;
use crate::openrtb::response::{Bid, BidResponse, SeatBid};

/// 模拟 DSP 竞价响应
/// 按 impression 类型随机出价，并带上模拟延迟，便于本地观察整条链路。
async fn handle_dsp_bid(Json(request): Json<BidRequest>) -> Json<BidResponse> {
    info!(
        "Mock DSP received BidRequest: id={}, imp_count={}",
        request.id,
        request.imp.len()
    );

    // 模拟 DSP 处理延迟（20 ~ 120 毫秒）
    let delay_ms = rand::thread_rng().gen_range(20..120);
    sleep(Duration::from_millis(delay_ms)).await;

    let mut bids = Vec::new();
    for imp in &request.imp {
        let bid_id = format!("bid-{}", imp.id);
        let bidfloor = imp.bidfloor.unwrap_or(0.1);
        // 视频流量的出价区间高于 banner / native
        let multiplier = if imp.video.is_some() {
            rand::thread_rng().gen_range(1.5..3.0)
        } else if imp.native.is_some() {
            rand::thread_rng().gen_range(0.8..2.0)
        } else {
            rand::thread_rng().gen_range(1.0..2.0)
        };
        let price = bidfloor * multiplier;

        let adm = if imp.video.is_some() {
            format!(
                r#"<VAST version="3.0"><Ad id="{bid_id}"><InLine><AdSystem>Mock DSP</AdSystem><AdTitle>Mock Video Ad</AdTitle></InLine></Ad></VAST>"#
            )
        } else if imp.native.is_some() {
            format!(
                r#"{{"native":{{"assets":[{{"title":{{"text":"Mock Native Ad"}}}}],"link":{{"url":"http://dsp-tracker.local/click?bid={bid_id}"}}}}}}"#
            )
        } else {
            format!(
                "<html><body>Mock DSP Ad<img src=\"http://dsp-tracker.local/impression?bid={bid_id}\" style=\"display:none;\" /></body></html>"
            )
        };

        bids.push(Bid {
            id: bid_id,
            impid: imp.id.clone(),
            price,
            adm: Some(adm),
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
        });
    }

    Json(BidResponse {
        id: request.id.clone(),
        seatbid: vec![SeatBid {
            bid: bids,
            seat: Some("mock_seat".to_string()),
            group: Some(0),
        }],
        bidid: None,
        cur: Some("USD".to_string()),
        customdata: None,
        nbr: None,
    })
}

/// 启动 Mock DSP 服务
/// 监听指定端口，路由为 `/bid`，与合作方配置里的 endpoint_url 对应。
pub async fn start_mock_dsp_server(port: u16) {
    let app = Router::new().route("/bid", post(handle_dsp_bid));

    let addr = format!("0.0.0.0:{}", port);
    info!("Mock DSP running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.expect("bind mock DSP port");
    serve(listener, app).await.expect("serve mock DSP");
}
