use async_trait::async_trait;
use reqwest::header::{REFERER, USER_AGENT};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{ensure_success, http_client, pick_candidate, synced_only, Candidate};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult};
use crate::lyrics::{LyricsProvider, MetadataProvider, Query, SongMetadata};

const SEARCH_URL: &str = "https://u.y.qq.com/cgi-bin/musicu.fcg";
const LYRIC_URL: &str = "https://i.y.qq.com/lyric/fcgi-bin/fcg_query_lyric_new.fcg";

/// QQ音乐歌词源
pub struct QQMusicProvider {
    client: reqwest::Client,
    search_limit: u32,
}

impl QQMusicProvider {
    pub fn new(config: &Config) -> ProviderResult<Self> {
        Ok(Self {
            client: http_client(config)?,
            search_limit: config.sources.qqmusic.search_limit.max(1),
        })
    }

    /// 搜索歌曲
    async fn search(&self, keyword: &str) -> ProviderResult<Value> {
        debug!("QQ音乐搜索关键词: '{}'", keyword);

        let body = json!({
          "comm": {
            "ct": 19,
            "cv": "1845",
            "v": "1003006",
            "os_ver": "12",
            "phonetype": "0",
            "devicelevel": "31",
            "tmeAppID": "qqmusiclight",
            "nettype": "NETWORK_WIFI"
          },
          "req": {
            "module": "music.search.SearchCgiService",
            "method": "DoSearchForQQMusicLite",
            "param": {
              "query": keyword,
              "search_type": 0,
              "num_per_page": self.search_limit,
              "page_num": 0,
              "nqc_flag": 0,
              "grp": 0
            }
          }
        });

        let resp = self
            .client
            .post(SEARCH_URL)
            .json(&body)
            .header(
                USER_AGENT,
                "Mozilla/5.0 (compatible; MSIE 9.0; Windows NT 6.1; WOW64; Trident/5.0)",
            )
            .send()
            .await
            .inspect_err(|e| error!("QQ音乐搜索请求失败: {}", e))?;

        Ok(ensure_success(resp)?.json().await?)
    }

    /// 获取歌词
    async fn get_lyric(&self, mid: &str) -> ProviderResult<Value> {
        let params = [
            ("songmid", mid),
            ("g_tk", "5381"),
            ("format", "json"),
            ("inCharset", "utf8"),
            ("outCharset", "utf-8"),
            ("nobase64", "1"),
        ];

        debug!("获取QQ音乐歌词, MID: {}", mid);

        let resp = self
            .client
            .get(LYRIC_URL)
            .query(&params)
            .header(REFERER, "https://y.qq.com")
            .send()
            .await
            .inspect_err(|e| error!("QQ音乐歌词请求失败: {}", e))?;

        Ok(ensure_success(resp)?.json().await?)
    }
}

/// 从搜索结果中提取候选歌曲
fn parse_candidates(data: &Value) -> ProviderResult<Vec<Candidate>> {
    if data.pointer("/req/code").and_then(Value::as_i64) == Some(2001) {
        // 搜索过于频繁时返回 2001
        return Err(ProviderError::RateLimited);
    }

    let Some(songs) = data.pointer("/req/data/body/item_song") else {
        return Ok(Vec::new());
    };
    let songs = songs
        .as_array()
        .ok_or_else(|| ProviderError::other("QQ音乐返回的 item_song 不是数组"))?;

    Ok(songs
        .iter()
        .filter_map(|song| {
            let mid = song["mid"].as_str().filter(|mid| !mid.is_empty())?;
            let artists: Vec<String> = song["singer"]
                .as_array()
                .map(|singers| {
                    singers
                        .iter()
                        .filter_map(|s| s["name"].as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            let cover_url = song["album"]["mid"]
                .as_str()
                .filter(|mid| !mid.is_empty())
                .map(|mid| {
                    format!("https://y.gtimg.cn/music/photo_new/T002R300x300M000{}.jpg", mid)
                });
            Some(Candidate {
                id: mid.to_string(),
                title: song["name"]
                    .as_str()
                    .or_else(|| song["songname"].as_str())
                    .unwrap_or_default()
                    .to_string(),
                artists,
                cover_url,
            })
        })
        .collect())
}

fn parse_lyric(data: &Value) -> ProviderResult<String> {
    synced_only(data.pointer("/lyric").and_then(Value::as_str))
}

#[async_trait]
impl MetadataProvider for QQMusicProvider {
    fn name(&self) -> &str {
        "qqmusic"
    }

    fn supports_offset(&self) -> bool {
        true
    }

    async fn lookup(&self, title: &str, artist: &str, offset: u32) -> ProviderResult<SongMetadata> {
        let query = Query::new(title, artist).with_offset(offset);
        let data = self.search(&query.keyword()).await?;
        let candidates = parse_candidates(&data)?;
        debug!("QQ音乐搜索结果数量: {}", candidates.len());
        Ok(pick_candidate("QQ音乐", candidates, &query)?.into_metadata())
    }
}

#[async_trait]
impl LyricsProvider for QQMusicProvider {
    fn name(&self) -> &str {
        "qqmusic"
    }

    async fn fetch_synced(&self, track_link: &str) -> ProviderResult<String> {
        let data = self.get_lyric(track_link).await?;
        parse_lyric(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidates() {
        let data = json!({
            "req": {
                "code": 0,
                "data": {
                    "body": {
                        "item_song": [
                            {
                                "mid": "0039MnYb0qxYhV",
                                "name": "晴天",
                                "singer": [{"name": "周杰伦"}],
                                "album": {"mid": "000MkMni19ClKG"}
                            },
                            {"mid": "", "name": "skipped"}
                        ]
                    }
                }
            }
        });

        let candidates = parse_candidates(&data).unwrap();
        assert_eq!(candidates.len(), 1);
        let metadata = candidates[0].clone().into_metadata();
        assert_eq!(metadata.track_link.as_deref(), Some("0039MnYb0qxYhV"));
        assert_eq!(metadata.artist.as_deref(), Some("周杰伦"));
        assert_eq!(
            metadata.cover_url.as_deref(),
            Some("https://y.gtimg.cn/music/photo_new/T002R300x300M000000MkMni19ClKG.jpg")
        );
    }

    #[test]
    fn test_parse_candidates_rate_limited() {
        let data = json!({"req": {"code": 2001}});
        assert_eq!(parse_candidates(&data).unwrap_err(), ProviderError::RateLimited);
    }

    #[test]
    fn test_parse_lyric() {
        assert_eq!(
            parse_lyric(&json!({"retcode": 0, "lyric": "[00:01.00]hi"})).unwrap(),
            "[00:01.00]hi"
        );
        assert_eq!(
            parse_lyric(&json!({"retcode": -1901})),
            Err(ProviderError::NotFound)
        );
    }
}
