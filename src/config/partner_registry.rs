// src/config/partner_registry.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::model::partners::{DspInventory, PartnersConfig, SspInventory};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read partners file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to unmarshal partners config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// **合作方注册表**
/// 持有当前生效的 PartnersConfig 快照。快照整体替换：写入方构造好新的
/// `Arc<PartnersConfig>` 后一次性发布，读取方每次操作只取一次指针，
/// 因此永远不会读到半新半旧的配置。
pub struct PartnerRegistry {
    config: RwLock<Option<Arc<PartnersConfig>>>,
}

impl PartnerRegistry {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(None),
        }
    }

    /// 从文件加载配置并原子发布。失败时保留之前的快照。
    pub fn load(&self, path: &Path) -> Result<(), ConfigLoadError> {
        let data = std::fs::read(path)?;
        let cfg: PartnersConfig = serde_json::from_slice(&data)?;
        *self.config.write() = Some(Arc::new(cfg));
        Ok(())
    }

    /// 启动后台热加载任务，每分钟重读一次配置文件。
    /// 加载失败只记日志，不影响当前快照；token 取消后立即退出。
    pub fn start_reloading(self: &Arc<Self>, token: CancellationToken, path: PathBuf) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            // 第一次 tick 立即返回，跳过，否则会在启动时多加载一次
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match registry.load(&path) {
                            Ok(()) => info!("reloaded partners config from {}", path.display()),
                            Err(e) => error!("failed to reload partners config: {e}"),
                        }
                    }
                    _ = token.cancelled() => return,
                }
            }
        });
    }

    /// 取当前快照；尚未成功加载过时返回 None。
    pub fn get_config(&self) -> Option<Arc<PartnersConfig>> {
        self.config.read().clone()
    }

    /// 按库存代码查找 SSP 记录，线性扫描，首个精确匹配生效。
    pub fn get_ssp_by_inventory_code(&self, code: &str) -> Option<SspInventory> {
        let cfg = self.get_config()?;
        cfg.ssp_inventories
            .iter()
            .find(|ssp| ssp.inventory_code == code)
            .cloned()
    }

    /// 返回指定租户下所有 Active 状态的 DSP 记录，保持快照内顺序。
    pub fn get_dsps_by_tenant(&self, tenant_id: u32) -> Vec<DspInventory> {
        let Some(cfg) = self.get_config() else {
            return Vec::new();
        };
        cfg.dsp_inventories
            .iter()
            .filter(|dsp| dsp.tenant_id == tenant_id && dsp.is_active())
            .cloned()
            .collect()
    }
}

impl Default for PartnerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
