// src/model/partners.rs

use serde::{Deserialize, Serialize};

/// **SSP 库存记录**
/// 对应租户在某个 SSP 上的一条流量接入配置，加载后不可变。
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SspInventory {
    pub name: String,                  // 展示名称
    pub id: u32,                       // 记录 ID
    pub inventory_name: String,        // 库存名称
    pub status: String,                // 状态（"Active" = 可用）
    pub inventory_code: String,        // 库存代码，auction 请求按此认证
    pub tenant_identifier: String,     // 租户标识符
    pub ssp_identifier: String,        // SSP 标识符
    pub tenant_id: u32,                // 租户 ID
    pub ssp_id: u32,                   // SSP 合作方 ID
    pub ssp_inventory_id: u32,         // SSP 库存 ID
    pub prometheus_identifier: String, // 指标维度用的可读标识
    pub ad_formats: Vec<String>,       // 支持的广告形式
}

/// **DSP 库存记录**
/// 一条 DSP 投放端点配置，包含定向属性，加载后不可变。
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DspInventory {
    pub name: String,                       // 展示名称
    pub dsp_identifier: String,             // DSP 标识符
    pub endpoint_name: String,              // 端点名称
    pub endpoint_url: String,               // DSP 竞价 API 地址
    pub qps: u32,                           // QPS 上限（参考值）
    pub tmax: u32,                          // DSP 建议响应时间（毫秒，参考值）
    pub id: u32,                            // 记录 ID
    pub inventory_code: String,             // 库存代码
    pub status: String,                     // 状态（仅 "Active" 参与竞价）
    pub min_bidfloor: String,               // 最低底价（十进制字符串）
    pub max_bidfloor: String,               // 最高底价（十进制字符串）
    pub ad_formats: Vec<String>,            // 支持的广告形式（banner/video/audio/native）
    pub source: Vec<String>,                // 支持的流量来源（app/web）
    pub country: Vec<String>,               // 国家白名单，"ANY" 表示全部
    pub country_black_list: Vec<String>,    // 国家黑名单
    pub iab_categories: Vec<String>,        // IAB 分类
    pub bundle_ids: Vec<String>,            // 应用包名白名单（大小写敏感）
    pub bundle_ids_black_list: Vec<String>, // 应用包名黑名单（大小写敏感）
    pub ssps: Vec<String>,                  // SSP 白名单
    pub ssps_black_list: Vec<String>,       // SSP 黑名单
    pub publishers: Vec<String>,            // 媒体白名单
    pub publishers_black_list: Vec<String>, // 媒体黑名单
    pub tenant_identifier: String,          // 租户标识符
    pub tenant_id: u32,                     // 租户 ID
    pub dsp_id: u32,                        // DSP 合作方 ID
    pub dsp_inventory_id: u32,              // DSP 库存 ID
    pub prometheus_identifier: String,      // 指标维度用的可读标识
}

impl DspInventory {
    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }
}

/// **合作方配置快照**
/// 整体原子替换，读取方拿到的永远是一个完整的代。
/// 约定：inventory_code 在同一快照内唯一。
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PartnersConfig {
    pub ssp_inventories: Vec<SspInventory>, // SSP 库存列表
    pub dsp_inventories: Vec<DspInventory>, // DSP 库存列表
    pub ad_serving: bool,                   // 投放总开关
    pub ts: String,                         // 快照时间戳（不解析）
}
