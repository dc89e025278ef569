// src/bidding/targeting.rs

use crate::model::partners::DspInventory;
use crate::openrtb::request::BidRequest;

/// **定向匹配**
/// 判断一条 DSP 库存是否接受给定的竞价请求。纯函数，按规则顺序求值，
/// 任一规则不通过即返回 false。
pub fn match_targeting(req: &BidRequest, dsp: &DspInventory) -> bool {
    // 1. 流量来源（App / Web）
    let is_app = req.is_app();
    if !dsp.source.is_empty() {
        let want = if is_app { "app" } else { "web" };
        if !dsp.source.iter().any(|s| s.eq_ignore_ascii_case(want)) {
            return false;
        }
    }

    // 2. 国家：先黑名单，再白名单；白名单含 "ANY" 视为全部放行
    let country = req.country();
    if !country.is_empty() {
        if dsp
            .country_black_list
            .iter()
            .any(|bc| bc.eq_ignore_ascii_case(&country))
        {
            return false;
        }
        if !dsp.country.is_empty() {
            let white_match = dsp
                .country
                .iter()
                .any(|wc| wc.eq_ignore_ascii_case(&country) || wc.eq_ignore_ascii_case("ANY"));
            if !white_match {
                return false;
            }
        }
    }

    // 3. 应用包名（仅 App 流量，大小写敏感）
    if is_app {
        let bundle = req
            .app
            .as_ref()
            .and_then(|a| a.bundle.as_deref())
            .unwrap_or("");
        if !bundle.is_empty() {
            if dsp.bundle_ids_black_list.iter().any(|bb| bb == bundle) {
                return false;
            }
            if !dsp.bundle_ids.is_empty() && !dsp.bundle_ids.iter().any(|wb| wb == bundle) {
                return false;
            }
        }
    }

    // 4. 广告形式：任一 impression 携带 DSP 支持的形式即可
    if !dsp.ad_formats.is_empty() {
        let format_match = req.imp.iter().any(|imp| {
            dsp.ad_formats.iter().any(|f| {
                (imp.banner.is_some() && f.eq_ignore_ascii_case("banner"))
                    || (imp.video.is_some() && f.eq_ignore_ascii_case("video"))
                    || (imp.audio.is_some() && f.eq_ignore_ascii_case("audio"))
                    || (imp.native.is_some() && f.eq_ignore_ascii_case("native"))
            })
        });
        if !format_match {
            return false;
        }
    }

    // 5. IAB 分类：目前只识别 "ANY" 全量放行，其余配置不做排除
    //    TODO: 对接产品侧的分类匹配规则后补全非 ANY 白名单的语义
    let _iab_allow_all = dsp
        .iab_categories
        .iter()
        .any(|c| c.eq_ignore_ascii_case("any"));

    // 6. 媒体名单：仅显式黑名单命中时排除
    let publisher_id = publisher_id(req);
    if !publisher_id.is_empty()
        && dsp
            .publishers_black_list
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&publisher_id))
    {
        return false;
    }

    // 7. 底价区间：读取配置但不据此排除，低于 DSP 底价的请求仍然发出
    if !dsp.min_bidfloor.is_empty() {
        let _ = dsp.min_bidfloor.parse::<f64>();
    }

    true
}

fn publisher_id(req: &BidRequest) -> String {
    let publisher = if let Some(app) = &req.app {
        app.publisher.as_ref()
    } else if let Some(site) = &req.site {
        site.publisher.as_ref()
    } else {
        None
    };
    publisher
        .and_then(|p| p.id.as_deref())
        .unwrap_or("")
        .to_string()
}

/// 按候选顺序应用定向过滤，最多保留 limit 个。不打分、不洗牌。
pub fn shortlist_dsps(
    req: &BidRequest,
    candidates: &[DspInventory],
    limit: usize,
) -> Vec<DspInventory> {
    let mut shortlisted = Vec::new();
    for dsp in candidates {
        if shortlisted.len() >= limit {
            break;
        }
        if match_targeting(req, dsp) {
            shortlisted.push(dsp.clone());
        }
    }
    shortlisted
}
