// src/metrics.rs

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static SSP_REQUEST_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "rtb_ssp_requests_total",
            "Total number of RTB requests received from SSPs.",
        ),
        &["prometheus_identifier", "tenant_identifier", "ssp_identifier"],
    )
    .unwrap_or_else(|e| panic!("counter_vec: {e}"));
    REGISTRY
        .register(Box::new(c.clone()))
        .unwrap_or_else(|e| panic!("registry: {e}"));
    c
});

/// status 取值：ok / no_bid / error
pub static SSP_RESPONSE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "rtb_ssp_responses_total",
            "Total number of RTB responses returned to SSPs.",
        ),
        &["prometheus_identifier", "tenant_identifier", "ssp_identifier", "status"],
    )
    .unwrap_or_else(|e| panic!("counter_vec: {e}"));
    REGISTRY
        .register(Box::new(c.clone()))
        .unwrap_or_else(|e| panic!("registry: {e}"));
    c
});

pub static DSP_REQUEST_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "rtb_dsp_requests_total",
            "Total number of RTB requests fanned out to DSPs.",
        ),
        &["prometheus_identifier", "tenant_identifier", "dsp_identifier"],
    )
    .unwrap_or_else(|e| panic!("counter_vec: {e}"));
    REGISTRY
        .register(Box::new(c.clone()))
        .unwrap_or_else(|e| panic!("registry: {e}"));
    c
});

/// status 取值：bid / nobid / error（与 SSP 侧的词汇不同）
pub static DSP_RESPONSE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "rtb_dsp_responses_total",
            "Total number of RTB responses received from DSPs.",
        ),
        &["prometheus_identifier", "tenant_identifier", "dsp_identifier", "status"],
    )
    .unwrap_or_else(|e| panic!("counter_vec: {e}"));
    REGISTRY
        .register(Box::new(c.clone()))
        .unwrap_or_else(|e| panic!("registry: {e}"));
    c
});

pub static DSP_LATENCY_HISTOGRAM: Lazy<HistogramVec> = Lazy::new(|| {
    let h = HistogramVec::new(
        HistogramOpts::new(
            "rtb_dsp_latency_seconds",
            "Observed wall-clock latency of DSP bid calls in seconds.",
        )
        .buckets(vec![0.01, 0.02, 0.05, 0.1, 0.2, 0.3, 0.4, 0.5]),
        &["prometheus_identifier", "tenant_identifier", "dsp_identifier"],
    )
    .unwrap_or_else(|e| panic!("histogram_vec: {e}"));
    REGISTRY
        .register(Box::new(h.clone()))
        .unwrap_or_else(|e| panic!("registry: {e}"));
    h
});

/// status 取值：ok / rejected_tmax / rejected_adserving_disabled
pub static AUCTION_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "rtb_auctions_total",
            "Total number of RTB auctions conducted.",
        ),
        &["status"],
    )
    .unwrap_or_else(|e| panic!("counter_vec: {e}"));
    REGISTRY
        .register(Box::new(c.clone()))
        .unwrap_or_else(|e| panic!("registry: {e}"));
    c
});

/// 强制注册所有指标向量。Lazy 保证重复调用是幂等的。
pub fn register_all() {
    Lazy::force(&SSP_REQUEST_COUNTER);
    Lazy::force(&SSP_RESPONSE_COUNTER);
    Lazy::force(&DSP_REQUEST_COUNTER);
    Lazy::force(&DSP_RESPONSE_COUNTER);
    Lazy::force(&DSP_LATENCY_HISTOGRAM);
    Lazy::force(&AUCTION_COUNTER);
}

/// 以 Prometheus 文本格式导出当前注册表内容。
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buf) {
        tracing::error!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_all_is_idempotent() {
        register_all();
        register_all();
        AUCTION_COUNTER.with_label_values(&["ok"]).inc();
        assert!(render().contains("rtb_auctions_total"));
    }

    #[test]
    fn latency_histogram_has_expected_buckets() {
        DSP_LATENCY_HISTOGRAM
            .with_label_values(&["p", "t", "d"])
            .observe(0.03);
        let text = render();
        assert!(text.contains("rtb_dsp_latency_seconds_bucket"));
        assert!(text.contains("le=\"0.05\""));
    }
}
