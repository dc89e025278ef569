use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use rtb_exchange::bidding::dsp_client::DspClient;
use rtb_exchange::config::logger_settings::BidLoggerSettings;
use rtb_exchange::config::partner_registry::PartnerRegistry;
use rtb_exchange::logging::bid_logger::{get_bid_logger, init_bid_logger};
use rtb_exchange::{app_router, metrics, metrics_router, mock_dsp, AppState};

#[derive(Parser, Debug)]
#[command(version, about = "An OpenRTB auction intermediary between SSPs and DSPs")]
struct CliArgs {
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
    #[arg(long, default_value_t = 9100)]
    metrics_port: u16,
    /// 合作方配置文件，每分钟热加载
    #[arg(long, default_value = "static/partners.json")]
    partners_file: PathBuf,
    /// 竞价事件日志的 properties 配置
    #[arg(long, default_value = "static/logging.properties")]
    logging_config: PathBuf,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    /// 指定后在本进程内启动一个 Mock DSP，便于本地联调
    #[arg(long)]
    mock_dsp_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化全局 tracing 日志：按小时轮转的 JSON 文件
    let log_file = rolling::hourly(&args.log_dir, "rtb_exchange.log.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().json().with_writer(non_blocking));
    tracing::subscriber::set_global_default(subscriber)
        .context("unable to set global tracing subscriber")?;
    info!("RTB exchange starting on port {}", args.port);

    // 指标最先注册（幂等），监听开启后立刻可刮取
    metrics::register_all();

    // 竞价事件日志在接收流量之前就绪
    let settings = match BidLoggerSettings::from_properties_file(&args.logging_config) {
        Ok(s) => s,
        Err(e) => {
            warn!("falling back to default bid logger settings: {e}");
            BidLoggerSettings::default()
        }
    };
    init_bid_logger(settings).context("init bid logger")?;

    // 合作方配置：先加载一次，再挂上每分钟的热加载
    let registry = Arc::new(PartnerRegistry::new());
    match registry.load(&args.partners_file) {
        Ok(()) => info!("loaded partners config from {}", args.partners_file.display()),
        // 首次加载失败不退出：注册表为空时请求统一按投放关闭拒绝
        Err(e) => error!("initial partners config load failed: {e}"),
    }
    let shutdown = CancellationToken::new();
    registry.start_reloading(shutdown.clone(), args.partners_file.clone());

    if let Some(port) = args.mock_dsp_port {
        tokio::spawn(mock_dsp::start_mock_dsp_server(port));
    }

    let state = Arc::new(AppState {
        registry: Arc::clone(&registry),
        dsp_client: DspClient::new().context("build DSP http client")?,
    });

    let listener = TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("bind port {}", args.port))?;
    let metrics_listener = TcpListener::bind(("0.0.0.0", args.metrics_port))
        .await
        .with_context(|| format!("bind metrics port {}", args.metrics_port))?;
    info!(
        "auction endpoint at :{}, metrics at :{}",
        args.port, args.metrics_port
    );

    // ctrl_c 触发两个监听面的优雅退出
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    let app_server = serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let metrics_server = serve(metrics_listener, metrics_router())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    let (app_res, metrics_res) = tokio::join!(app_server, metrics_server);
    app_res.context("auction server")?;
    metrics_res.context("metrics server")?;

    // 监听停止后排空竞价事件队列
    if let Some(logger) = get_bid_logger() {
        logger.close().await;
    }
    info!("RTB exchange shut down");
    Ok(())
}
