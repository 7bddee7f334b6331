mod session;
mod state;
pub mod providers;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

pub use session::LyricsSearchSession;
pub use state::{FailureKind, LyricsState, SessionSnapshot, SessionState};

/// 一次搜索的查询条件
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Query {
    /// 歌曲标题
    pub title: String,
    /// 艺术家
    pub artist: String,
    /// 在候选结果中的位置，"换一个"时加一
    pub offset: u32,
}

impl Query {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// 标题和艺术家都为空
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.artist.trim().is_empty()
    }

    /// 搜索关键词: 标题 艺术家
    pub fn keyword(&self) -> String {
        let title = self.title.trim();
        let artist = self.artist.trim();
        if artist.is_empty() {
            title.to_string()
        } else if title.is_empty() {
            artist.to_string()
        } else {
            format!("{} {}", title, artist)
        }
    }

    /// 从本地音频文件名推断查询条件
    ///
    /// 文件名形如 `艺术家 - 标题.mp3` 时拆分为艺术家和标题，否则整个文件名作为标题。
    pub fn from_file_name(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        match stem.split_once(" - ") {
            Some((artist, title)) => Query::new(title.trim(), artist.trim()),
            None => Query::new(stem.trim(), ""),
        }
    }
}

/// 歌词源返回的歌曲信息
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SongMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// 封面地址
    pub cover_url: Option<String>,
    /// 获取歌词时使用的歌曲标识
    pub track_link: Option<String>,
}

/// 歌曲信息查询接口
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// 获取提供者名称
    fn name(&self) -> &str;

    /// 是否支持通过 offset 获取其他候选结果
    fn supports_offset(&self) -> bool;

    /// 按标题和艺术家查找第 offset 个匹配结果
    async fn lookup(&self, title: &str, artist: &str, offset: u32) -> ProviderResult<SongMetadata>;
}

/// 同步歌词获取接口
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// 获取带时间轴的歌词文本
    async fn fetch_synced(&self, track_link: &str) -> ProviderResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_query_from_file_name() {
        let query = Query::from_file_name(&PathBuf::from("/music/周杰伦 - 稻香.flac"));
        assert_eq!(query, Query::new("稻香", "周杰伦"));

        let query = Query::from_file_name(&PathBuf::from("track01.mp3"));
        assert_eq!(query, Query::new("track01", ""));
    }

    #[test]
    fn test_query_keyword() {
        assert_eq!(Query::new("Song", "Artist").keyword(), "Song Artist");
        assert_eq!(Query::new("Song", " ").keyword(), "Song");
        assert_eq!(Query::new("", "Artist").keyword(), "Artist");
        assert!(Query::new(" ", "").is_empty());
    }
}
