mod lrclib;
mod netease;
mod qqmusic;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ProviderError, ProviderResult};
use crate::lyrics::{LyricsProvider, MetadataProvider, Query, SongMetadata};
use crate::utils::{string_similarity, LrcParser};

pub use lrclib::LrclibProvider;
pub use netease::NeteaseProvider;
pub use qqmusic::QQMusicProvider;

/// 同一个歌词源同时提供歌曲搜索和歌词获取
#[derive(Clone)]
pub struct ProviderHandle {
    pub metadata: Arc<dyn MetadataProvider>,
    pub lyrics: Arc<dyn LyricsProvider>,
}

impl ProviderHandle {
    fn of<P>(provider: P) -> Self
    where
        P: MetadataProvider + LyricsProvider + 'static,
    {
        let provider = Arc::new(provider);
        Self {
            metadata: provider.clone(),
            lyrics: provider,
        }
    }
}

/// 根据名称创建歌词源
pub fn get_provider(name: &str, config: &Config) -> Result<ProviderHandle> {
    debug!("加载歌词源: {}", name);

    let handle = match name {
        "netease" => ProviderHandle::of(NeteaseProvider::new(config)?),
        "qqmusic" | "qq" => ProviderHandle::of(QQMusicProvider::new(config)?),
        "lrclib" => ProviderHandle::of(LrclibProvider::new(config)?),
        _ => bail!("未知的歌词源: {}", name),
    };

    info!(
        "使用歌词源: {} (支持换一个: {})",
        handle.metadata.name(),
        handle.metadata.supports_offset()
    );
    Ok(handle)
}

/// 带配置超时的 HTTP 客户端
pub(crate) fn http_client(config: &Config) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ProviderError::other(format!("创建 HTTP 客户端失败: {}", e)))
}

/// 非 2xx 响应转换为对应的错误
pub(crate) fn ensure_success(resp: reqwest::Response) -> ProviderResult<reqwest::Response> {
    match ProviderError::from_status(resp.status()) {
        Some(err) => Err(err),
        None => Ok(resp),
    }
}

/// 只接受带时间轴的歌词
pub(crate) fn synced_only(text: Option<&str>) -> ProviderResult<String> {
    match text {
        Some(text) if LrcParser::is_synced(text) => Ok(text.to_string()),
        _ => Err(ProviderError::NotFound),
    }
}

/// 搜索结果中的一首候选歌曲
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub cover_url: Option<String>,
}

impl Candidate {
    /// 与查询的匹配分数 (标题权重高一些)
    fn score(&self, query: &Query) -> f64 {
        let title_score = string_similarity(&query.title, &self.title);
        let artist_score = self
            .artists
            .iter()
            .map(|artist| string_similarity(&query.artist, artist))
            .fold(0.0, f64::max);
        title_score * 2.0 + artist_score
    }

    pub fn into_metadata(self) -> SongMetadata {
        SongMetadata {
            title: Some(self.title),
            artist: Some(self.artists.join(", ")),
            cover_url: self.cover_url,
            track_link: Some(self.id).filter(|id| !id.is_empty()),
        }
    }
}

/// 按匹配分数从高到低排序后取第 offset 个候选
pub(crate) fn pick_candidate(
    source: &str,
    candidates: Vec<Candidate>,
    query: &Query,
) -> ProviderResult<Candidate> {
    if candidates.is_empty() {
        debug!("{} 未找到匹配歌曲", source);
        return Err(ProviderError::NotFound);
    }

    let mut scored: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|c| (c.score(query), c))
        .collect();
    // 分数相同时保持歌词源原有顺序
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (i, (score, song)) in scored.iter().enumerate().take(5) {
        debug!(
            "{} 候选 #{}: ID: {}, 标题: '{}', 艺术家: '{}', 评分: {:.2}",
            source,
            i + 1,
            song.id,
            song.title,
            song.artists.join(", "),
            score
        );
    }

    let total = scored.len();
    match scored.into_iter().nth(query.offset as usize) {
        Some((score, song)) => {
            info!(
                "{} 第 {} 个匹配: {} - {} (ID: {}, 评分: {:.2})",
                source,
                query.offset + 1,
                song.title,
                song.artists.join(", "),
                song.id,
                score
            );
            Ok(song)
        }
        None => {
            info!("{} 只有 {} 个候选结果，没有更多匹配", source, total);
            Err(ProviderError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str, artist: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: title.to_string(),
            artists: vec![artist.to_string()],
            cover_url: None,
        }
    }

    #[test]
    fn test_pick_candidate_ranks_by_similarity() {
        let candidates = vec![
            candidate("1", "稻香 (Live)", "某翻唱"),
            candidate("2", "稻香", "周杰伦"),
            candidate("3", "晴天", "周杰伦"),
        ];
        let query = Query::new("稻香", "周杰伦");

        let best = pick_candidate("test", candidates.clone(), &query).unwrap();
        assert_eq!(best.id, "2");

        let second =
            pick_candidate("test", candidates.clone(), &query.clone().with_offset(1)).unwrap();
        assert_eq!(second.id, "3");

        let third =
            pick_candidate("test", candidates.clone(), &query.clone().with_offset(2)).unwrap();
        assert_eq!(third.id, "1");

        assert_eq!(
            pick_candidate("test", candidates, &query.with_offset(3)).unwrap_err(),
            ProviderError::NotFound
        );
    }

    #[test]
    fn test_pick_candidate_empty() {
        assert_eq!(
            pick_candidate("test", vec![], &Query::new("a", "b")).unwrap_err(),
            ProviderError::NotFound
        );
    }

    #[test]
    fn test_synced_only() {
        assert!(synced_only(Some("[00:01.00]hi")).is_ok());
        assert_eq!(synced_only(Some("plain text")), Err(ProviderError::NotFound));
        assert_eq!(synced_only(None), Err(ProviderError::NotFound));
    }

    #[test]
    fn test_http_client_uses_config() {
        let config = Config::parse("request_timeout_secs = 3").unwrap();
        assert!(http_client(&config).is_ok());
    }

    #[test]
    fn test_get_provider() {
        let config = Config::default();
        assert!(get_provider("netease", &config).unwrap().metadata.supports_offset());
        assert!(get_provider("qq", &config).unwrap().metadata.supports_offset());
        assert!(!get_provider("lrclib", &config).unwrap().metadata.supports_offset());
        assert!(get_provider("spotify", &config).is_err());
    }
}
