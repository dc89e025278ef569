// src/logging/bid_logger.rs

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::{self, JoinHandle};
use tracing::{error, warn};

use crate::config::logger_settings::BidLoggerSettings;
use crate::logging::event::AuctionEvent;
use crate::logging::rolling::RollingWriter;

static INSTANCE: OnceCell<BidLogger> = OnceCell::new();

/// 进程级单例。未初始化时返回 None，调用方直接跳过事件记录。
pub fn get_bid_logger() -> Option<&'static BidLogger> {
    INSTANCE.get()
}

/// 初始化竞价事件日志。只有第一次调用生效。
pub fn init_bid_logger(settings: BidLoggerSettings) -> anyhow::Result<()> {
    let logger = BidLogger::start(settings)?;
    if INSTANCE.set(logger).is_err() {
        warn!("bid logger already initialized, ignoring");
    }
    Ok(())
}

/// **异步竞价事件日志**
///
/// 生产者通过有界通道非阻塞投递，唯一的消费者任务把事件编码、
/// hex 化后逐条追加到按大小轮转的文件。通道满时丢弃最新事件，
/// 热路径永不阻塞。
pub struct BidLogger {
    sender: Mutex<Option<Sender<AuctionEvent>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    hostname: String,
}

impl BidLogger {
    fn start(settings: BidLoggerSettings) -> anyhow::Result<Self> {
        let writer = RollingWriter::new(
            settings.path.clone(),
            settings.max_file_size_mb * 1024 * 1024,
            settings.max_backups,
        )?;
        let (sender, receiver) = mpsc::channel(settings.channel_buffer.max(1));
        let consumer = tokio::spawn(Self::consume(receiver, Arc::new(Mutex::new(writer))));

        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            consumer: Mutex::new(Some(consumer)),
            hostname,
        })
    }

    /// 盖章主机名与毫秒时间戳后入队。通道满则丢弃并告警。
    pub fn log(&self, mut event: AuctionEvent) {
        event.hostname = self.hostname.clone();
        event.timestamp = Utc::now().timestamp_millis();

        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return; // 已关闭
        };
        if let Err(TrySendError::Full(dropped)) = sender.try_send(event) {
            warn!(
                auction_id = %dropped.ssp_partner_auction_id,
                "bid logger channel full, dropping event"
            );
        }
    }

    async fn consume(mut receiver: Receiver<AuctionEvent>, writer: Arc<Mutex<RollingWriter>>) {
        while let Some(event) = receiver.recv().await {
            let line = hex::encode(event.encode());
            let writer = Arc::clone(&writer);
            let result = task::spawn_blocking(move || writer.lock().write_line(line.as_bytes()))
                .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("failed to write auction event: {e}"),
                Err(e) => error!("auction event write task failed: {e}"),
            }
        }
        let _ = task::spawn_blocking(move || writer.lock().flush()).await;
    }

    /// 关闭通道并等消费者把剩余事件落盘。重复调用无副作用。
    pub async fn close(&self) {
        let sender = self.sender.lock().take();
        drop(sender);
        let handle = self.consumer.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("bid logger consumer ended abnormally: {e}");
            }
        }
    }
}
