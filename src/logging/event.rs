// src/logging/event.rs
//
// 竞价事件的二进制编码。每个字段写成 `tag(u8) + len(u32 LE) + payload`，
// 标量 payload 为定宽小端，字符串/字节串为原始内容，App/Web 来源是嵌套
// 的同构记录。解码时跳过未知 tag，新旧版本可以互相读写。

use thiserror::Error;

const TAG_TENANT_ID: u8 = 1;
const TAG_SSP_PARTNER_ID: u8 = 2;
const TAG_SSP_INVENTORY_ID: u8 = 3;
const TAG_SSP_PARTNER_AUCTION_ID: u8 = 4;
const TAG_DSP_PARTNER_ID: u8 = 5;
const TAG_DSP_INVENTORY_ID: u8 = 6;
const TAG_DSP_PRICE: u8 = 7;
const TAG_BID_REQUEST_PRICE: u8 = 8;
const TAG_RAW_BID_REQUEST: u8 = 9;
const TAG_RAW_DSP_RESPONSE: u8 = 10;
const TAG_SOURCE_APP: u8 = 11;
const TAG_SOURCE_WEB: u8 = 12;
const TAG_HOSTNAME: u8 = 13;
const TAG_TIMESTAMP: u8 = 14;

// App 子记录
const TAG_APP_ID: u8 = 1;
const TAG_APP_NAME: u8 = 2;
const TAG_APP_BUNDLE: u8 = 3;
const TAG_APP_DOMAIN: u8 = 4;

// Web 子记录
const TAG_WEB_DOMAIN: u8 = 1;
const TAG_WEB_PAGE: u8 = 2;

#[derive(Debug, Error)]
pub enum EventCodecError {
    #[error("truncated record at offset {0}")]
    Truncated(usize),
    #[error("field {tag} has invalid length {len}")]
    BadLength { tag: u8, len: usize },
}

/// 获胜 auction 的落盘记录。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuctionEvent {
    pub tenant_id: u32,
    pub ssp_partner_id: u32,
    pub ssp_inventory_id: u32,
    pub ssp_partner_auction_id: String,
    pub dsp_partner_id: u32,
    pub dsp_inventory_id: u32,
    pub dsp_price: f64,
    pub bid_request_price: f64,
    pub raw_bid_request: Vec<u8>,
    pub raw_dsp_response: Vec<u8>,
    pub source: Option<EventSource>,
    pub hostname: String,
    pub timestamp: i64, // unix 毫秒，入队时由 logger 盖章
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventSource {
    App(AppSource),
    Web(WebSource),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppSource {
    pub id: String,
    pub name: String,
    pub bundle: String,
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebSource {
    pub domain: String,
    pub page: String,
}

fn put_field(buf: &mut Vec<u8>, tag: u8, payload: &[u8]) {
    buf.push(tag);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
}

fn put_u32(buf: &mut Vec<u8>, tag: u8, v: u32) {
    put_field(buf, tag, &v.to_le_bytes());
}

fn put_f64(buf: &mut Vec<u8>, tag: u8, v: f64) {
    put_field(buf, tag, &v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, tag: u8, v: i64) {
    put_field(buf, tag, &v.to_le_bytes());
}

impl AuctionEvent {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            64 + self.raw_bid_request.len() + self.raw_dsp_response.len(),
        );
        put_u32(&mut buf, TAG_TENANT_ID, self.tenant_id);
        put_u32(&mut buf, TAG_SSP_PARTNER_ID, self.ssp_partner_id);
        put_u32(&mut buf, TAG_SSP_INVENTORY_ID, self.ssp_inventory_id);
        put_field(
            &mut buf,
            TAG_SSP_PARTNER_AUCTION_ID,
            self.ssp_partner_auction_id.as_bytes(),
        );
        put_u32(&mut buf, TAG_DSP_PARTNER_ID, self.dsp_partner_id);
        put_u32(&mut buf, TAG_DSP_INVENTORY_ID, self.dsp_inventory_id);
        put_f64(&mut buf, TAG_DSP_PRICE, self.dsp_price);
        put_f64(&mut buf, TAG_BID_REQUEST_PRICE, self.bid_request_price);
        put_field(&mut buf, TAG_RAW_BID_REQUEST, &self.raw_bid_request);
        put_field(&mut buf, TAG_RAW_DSP_RESPONSE, &self.raw_dsp_response);
        match &self.source {
            Some(EventSource::App(app)) => {
                let mut sub = Vec::new();
                put_field(&mut sub, TAG_APP_ID, app.id.as_bytes());
                put_field(&mut sub, TAG_APP_NAME, app.name.as_bytes());
                put_field(&mut sub, TAG_APP_BUNDLE, app.bundle.as_bytes());
                put_field(&mut sub, TAG_APP_DOMAIN, app.domain.as_bytes());
                put_field(&mut buf, TAG_SOURCE_APP, &sub);
            }
            Some(EventSource::Web(web)) => {
                let mut sub = Vec::new();
                put_field(&mut sub, TAG_WEB_DOMAIN, web.domain.as_bytes());
                put_field(&mut sub, TAG_WEB_PAGE, web.page.as_bytes());
                put_field(&mut buf, TAG_SOURCE_WEB, &sub);
            }
            None => {}
        }
        put_field(&mut buf, TAG_HOSTNAME, self.hostname.as_bytes());
        put_i64(&mut buf, TAG_TIMESTAMP, self.timestamp);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, EventCodecError> {
        let mut event = Self::default();
        for (tag, payload) in FieldIter::new(data) {
            let payload = payload?;
            match tag {
                TAG_TENANT_ID => event.tenant_id = read_u32(tag, payload)?,
                TAG_SSP_PARTNER_ID => event.ssp_partner_id = read_u32(tag, payload)?,
                TAG_SSP_INVENTORY_ID => event.ssp_inventory_id = read_u32(tag, payload)?,
                TAG_SSP_PARTNER_AUCTION_ID => {
                    event.ssp_partner_auction_id = read_string(payload);
                }
                TAG_DSP_PARTNER_ID => event.dsp_partner_id = read_u32(tag, payload)?,
                TAG_DSP_INVENTORY_ID => event.dsp_inventory_id = read_u32(tag, payload)?,
                TAG_DSP_PRICE => event.dsp_price = read_f64(tag, payload)?,
                TAG_BID_REQUEST_PRICE => event.bid_request_price = read_f64(tag, payload)?,
                TAG_RAW_BID_REQUEST => event.raw_bid_request = payload.to_vec(),
                TAG_RAW_DSP_RESPONSE => event.raw_dsp_response = payload.to_vec(),
                TAG_SOURCE_APP => {
                    let mut app = AppSource::default();
                    for (t, p) in FieldIter::new(payload) {
                        let p = p?;
                        match t {
                            TAG_APP_ID => app.id = read_string(p),
                            TAG_APP_NAME => app.name = read_string(p),
                            TAG_APP_BUNDLE => app.bundle = read_string(p),
                            TAG_APP_DOMAIN => app.domain = read_string(p),
                            _ => {}
                        }
                    }
                    event.source = Some(EventSource::App(app));
                }
                TAG_SOURCE_WEB => {
                    let mut web = WebSource::default();
                    for (t, p) in FieldIter::new(payload) {
                        let p = p?;
                        match t {
                            TAG_WEB_DOMAIN => web.domain = read_string(p),
                            TAG_WEB_PAGE => web.page = read_string(p),
                            _ => {}
                        }
                    }
                    event.source = Some(EventSource::Web(web));
                }
                TAG_HOSTNAME => event.hostname = read_string(payload),
                TAG_TIMESTAMP => event.timestamp = read_i64(tag, payload)?,
                _ => {} // 未知字段：跳过，保证向前兼容
            }
        }
        Ok(event)
    }
}

fn read_string(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

fn read_u32(tag: u8, payload: &[u8]) -> Result<u32, EventCodecError> {
    let bytes: [u8; 4] = payload.try_into().map_err(|_| EventCodecError::BadLength {
        tag,
        len: payload.len(),
    })?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_f64(tag: u8, payload: &[u8]) -> Result<f64, EventCodecError> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| EventCodecError::BadLength {
        tag,
        len: payload.len(),
    })?;
    Ok(f64::from_le_bytes(bytes))
}

fn read_i64(tag: u8, payload: &[u8]) -> Result<i64, EventCodecError> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| EventCodecError::BadLength {
        tag,
        len: payload.len(),
    })?;
    Ok(i64::from_le_bytes(bytes))
}

/// 顺序遍历 `tag + len + payload` 字段序列。
struct FieldIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldIter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = (u8, Result<&'a [u8], EventCodecError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        if self.data.len() - start < 5 {
            self.pos = self.data.len();
            return Some((0, Err(EventCodecError::Truncated(start))));
        }
        let tag = self.data[start];
        let len = u32::from_le_bytes(
            self.data[start + 1..start + 5]
                .try_into()
                .unwrap_or([0; 4]),
        ) as usize;
        let payload_start = start + 5;
        if self.data.len() - payload_start < len {
            self.pos = self.data.len();
            return Some((tag, Err(EventCodecError::Truncated(start))));
        }
        self.pos = payload_start + len;
        Some((tag, Ok(&self.data[payload_start..payload_start + len])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> AuctionEvent {
        AuctionEvent {
            tenant_id: 7,
            ssp_partner_id: 3,
            ssp_inventory_id: 11,
            ssp_partner_auction_id: "auction-42".to_string(),
            dsp_partner_id: 9,
            dsp_inventory_id: 21,
            dsp_price: 2.5,
            bid_request_price: 0.5,
            raw_bid_request: b"{\"id\":\"auction-42\"}".to_vec(),
            raw_dsp_response: b"{\"id\":\"auction-42\",\"seatbid\":[]}".to_vec(),
            source: Some(EventSource::App(AppSource {
                id: "app-1".to_string(),
                name: "News".to_string(),
                bundle: "com.example.news".to_string(),
                domain: "news.example.com".to_string(),
            })),
            hostname: "exchange-01".to_string(),
            timestamp: 1_717_000_000_123,
        }
    }

    #[test]
    fn round_trips_app_source() {
        let event = sample_event();
        let decoded = AuctionEvent::decode(&event.encode()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn round_trips_web_source() {
        let mut event = sample_event();
        event.source = Some(EventSource::Web(WebSource {
            domain: "example.com".to_string(),
            page: "https://example.com/article".to_string(),
        }));
        let decoded = AuctionEvent::decode(&event.encode()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let event = sample_event();
        let mut data = event.encode();
        // 追加一个未来版本的字段
        data.push(200);
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"xxxx");
        let decoded = AuctionEvent::decode(&data).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn truncated_record_is_an_error() {
        let data = sample_event().encode();
        assert!(AuctionEvent::decode(&data[..data.len() - 3]).is_err());
    }

    #[test]
    fn scalar_length_mismatch_is_an_error() {
        let mut data = Vec::new();
        data.push(super::TAG_TENANT_ID);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(b"ab");
        assert!(matches!(
            AuctionEvent::decode(&data),
            Err(EventCodecError::BadLength { .. })
        ));
    }
}
