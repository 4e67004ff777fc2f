//! 底图提供方抽象与 Mapbox 静态图实现。

use std::time::Duration;

use tracing::{debug, info};

use crate::errors::AssemblyError;

/// WGS84 经纬度包围盒，西南角在前。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBBox {
    /// 静态图 API 路径段使用的 `[minlon,minlat,maxlon,maxlat]` 形式。
    pub fn to_query(&self) -> String {
        format!(
            "[{},{},{},{}]",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// 按地理包围盒与像素尺寸取回一幅底图的字节流。
pub trait ImageProvider {
    fn fetch(&self, bbox: &GeoBBox, width: u32, height: u32) -> Result<Vec<u8>, AssemblyError>;
}

/// Mapbox Static Images API。同步阻塞调用，一次组装只取一张图。
pub struct MapboxStaticProvider {
    client: reqwest::blocking::Client,
    style: String,
    token: String,
}

impl MapboxStaticProvider {
    pub fn new(style: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
            style: style.into(),
            token: token.into(),
        }
    }

    fn url(&self, bbox: &GeoBBox, width: u32, height: u32) -> String {
        format!(
            "https://api.mapbox.com/styles/v1/mapbox/{}/static/{}/{}x{}?access_token={}",
            self.style,
            bbox.to_query(),
            width,
            height,
            self.token
        )
    }
}

impl ImageProvider for MapboxStaticProvider {
    fn fetch(&self, bbox: &GeoBBox, width: u32, height: u32) -> Result<Vec<u8>, AssemblyError> {
        debug!(style = %self.style, bbox = %bbox.to_query(), width, height, "请求底图");
        let response = self.client.get(self.url(bbox, width, height)).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AssemblyError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes()?.to_vec();
        info!(len = bytes.len(), "底图获取完成");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_query_orders_southwest_first() {
        let bbox = GeoBBox {
            min_lon: -79.5,
            min_lat: 43.6,
            max_lon: -79.3,
            max_lat: 43.7,
        };
        assert_eq!(bbox.to_query(), "[-79.5,43.6,-79.3,43.7]");
    }

    #[test]
    fn request_url_embeds_style_bbox_and_size() {
        let provider = MapboxStaticProvider::new("streets-v12", "pk.test");
        let bbox = GeoBBox {
            min_lon: -79.5,
            min_lat: 43.6,
            max_lon: -79.3,
            max_lat: 43.7,
        };
        let url = provider.url(&bbox, 1280, 640);
        assert_eq!(
            url,
            "https://api.mapbox.com/styles/v1/mapbox/streets-v12/static/[-79.5,43.6,-79.3,43.7]/1280x640?access_token=pk.test"
        );
    }
}
