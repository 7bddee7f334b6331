//! LRCLIB 歌词源
//!
//! `/api/get` 只返回一个标准匹配结果，因此不支持通过 offset 查找其他候选。
//! API 文档: https://lrclib.net/docs

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use super::{ensure_success, http_client, synced_only};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult};
use crate::lyrics::{LyricsProvider, MetadataProvider, SongMetadata};

const USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION")
);

/// LRCLIB API 响应
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct LrclibResponse {
    id: i64,
    track_name: Option<String>,
    artist_name: Option<String>,
    synced_lyrics: Option<String>,
}

impl LrclibResponse {
    fn into_metadata(self) -> SongMetadata {
        SongMetadata {
            title: self.track_name,
            artist: self.artist_name,
            cover_url: None,
            track_link: Some(self.id.to_string()),
        }
    }
}

pub struct LrclibProvider {
    client: reqwest::Client,
    base_url: String,
}

impl LrclibProvider {
    pub fn new(config: &Config) -> ProviderResult<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.sources.lrclib.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> ProviderResult<LrclibResponse> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .inspect_err(|e| error!("LRCLIB 请求失败: {}", e))?;

        Ok(ensure_success(resp)?.json().await?)
    }
}

#[async_trait]
impl MetadataProvider for LrclibProvider {
    fn name(&self) -> &str {
        "lrclib"
    }

    fn supports_offset(&self) -> bool {
        false
    }

    async fn lookup(&self, title: &str, artist: &str, offset: u32) -> ProviderResult<SongMetadata> {
        if offset > 0 {
            // 只有一个标准结果
            return Err(ProviderError::NotFound);
        }

        debug!("LRCLIB 查询: {} - {}", title, artist);
        let url = format!("{}/get", self.base_url);
        let response = self
            .get(&url, &[("track_name", title.trim()), ("artist_name", artist.trim())])
            .await?;
        Ok(response.into_metadata())
    }
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &str {
        "lrclib"
    }

    async fn fetch_synced(&self, track_link: &str) -> ProviderResult<String> {
        debug!("获取 LRCLIB 歌词, ID: {}", track_link);
        let url = format!("{}/get/{}", self.base_url, track_link);
        let response = self.get(&url, &[]).await?;
        synced_only(response.synced_lyrics.as_deref())
    }
}
