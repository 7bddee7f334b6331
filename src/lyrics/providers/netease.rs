use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use openssl::rsa::{Padding, Rsa};
use openssl::symm::{encrypt, Cipher};
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{ensure_success, http_client, pick_candidate, synced_only, Candidate};
use crate::config::Config;
use crate::error::{ProviderError, ProviderResult};
use crate::lyrics::{LyricsProvider, MetadataProvider, Query, SongMetadata};

// 常量
const BASE62_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const WEAPI_PRESET_KEY: &[u8] = b"0CoJUm6Qyw8W8jud";
const WEAPI_IV: &[u8] = b"0102030405060708";
const WEAPI_PUBKEY: &[u8] = b"-----BEGIN PUBLIC KEY-----\nMIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDgtQn2JZ34ZC28NWYpAUd98iZ37BUrX/aKzmFbt7clFSs6sXqHauqKWqdtLkF2KexO40H1YTX8z2lSgBBOAxLsvaklV8k4cBFK9snQXE9/DDaFt6Rr7iVZMldczhC0JNgTz+SHXT6CBHuX3e9SdB1Ua44oncaTWz7OBGLbCiK45wIDAQAB\n-----END PUBLIC KEY-----";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_1_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.87 Safari/537.36";

/// 网易云返回 "操作频繁" 时使用的业务码
const RATE_LIMITED_CODES: [i64; 2] = [405, -447];

// get 16 length secret from base62
fn get_secret() -> [u8; 16] {
    let mut key = [0; 16];
    let mut rng = rand::rng();
    for byte in key.iter_mut() {
        *byte = BASE62_CHARSET[rng.random_range(0..BASE62_CHARSET.len())];
    }
    key
}

fn aes_128_cbc_b64(data: &[u8], key: &[u8], iv: &[u8]) -> ProviderResult<String> {
    let enc_data = encrypt(Cipher::aes_128_cbc(), key, Some(iv), data)
        .map_err(|e| ProviderError::other(format!("AES 加密失败: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(enc_data))
}

fn do_rsa_with_reverse_secret(data: &[u8]) -> ProviderResult<[u8; 128]> {
    let rsa = Rsa::public_key_from_pem(WEAPI_PUBKEY)
        .map_err(|e| ProviderError::other(format!("RSA 公钥无效: {}", e)))?;

    // pad data to 128 bytes
    let extend_data = [vec![0; 128 - data.len()], data.to_vec()].concat();

    let mut to = [0; 128];
    rsa.public_encrypt(&extend_data, &mut to, Padding::NONE)
        .map_err(|e| ProviderError::other(format!("RSA 加密失败: {}", e)))?;
    Ok(to)
}

fn weapi_encrypt(data: Value) -> ProviderResult<WeApiReqForm> {
    let mut secret = get_secret();

    let data = data.to_string().into_bytes();
    let params = aes_128_cbc_b64(
        aes_128_cbc_b64(&data, WEAPI_PRESET_KEY, WEAPI_IV)?.as_bytes(),
        secret.as_ref(),
        WEAPI_IV,
    )?;

    secret.reverse();
    let enc_sec_key = do_rsa_with_reverse_secret(secret.as_ref())?;

    Ok(WeApiReqForm {
        params,
        enc_sec_key: hex::encode(enc_sec_key),
    })
}

#[derive(Serialize, Debug)]
struct WeApiReqForm {
    params: String,
    #[serde(rename = "encSecKey")]
    enc_sec_key: String,
}

/// 网易云音乐歌词源
pub struct NeteaseProvider {
    client: reqwest::Client,
    search_limit: u32,
}

impl NeteaseProvider {
    pub fn new(config: &Config) -> ProviderResult<Self> {
        Ok(Self {
            client: http_client(config)?,
            search_limit: config.sources.netease.search_limit.max(1),
        })
    }

    async fn weapi(&self, url: &str, data: Value) -> ProviderResult<Value> {
        let req_form = weapi_encrypt(data)?;

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Referer", "https://music.163.com/")
            .header("User-Agent", USER_AGENT)
            .form(&req_form)
            .send()
            .await
            .inspect_err(|e| error!("网易云音乐请求失败: {}", e))?;

        let json: Value = ensure_success(resp)?.json().await?;

        match json["code"].as_i64() {
            Some(code) if RATE_LIMITED_CODES.contains(&code) => Err(ProviderError::RateLimited),
            _ => Ok(json),
        }
    }

    /// 搜索歌曲
    async fn search(&self, keyword: &str) -> ProviderResult<Value> {
        debug!("网易云音乐搜索关键词: '{}'", keyword);
        let data = json!({
            "s": keyword,
            "type": 1,
            "offset": 0,
            "total": true,
            "limit": self.search_limit,
        });
        self.weapi("https://music.163.com/weapi/cloudsearch/pc", data)
            .await
    }

    /// 获取歌词
    async fn get_lyric(&self, song_id: &str) -> ProviderResult<Value> {
        debug!("获取网易云音乐歌词, ID: {}", song_id);
        let data = json!({
            "id": song_id,
            "lv": -1,
            "kv": -1,
            "tv": -1,
            "os": "osx",
        });
        self.weapi("https://music.163.com/weapi/song/lyric", data)
            .await
    }
}

/// 从搜索结果中提取候选歌曲
fn parse_candidates(data: &Value) -> ProviderResult<Vec<Candidate>> {
    let Some(songs) = data.pointer("/result/songs") else {
        // 没有结果时网易云不返回 songs 字段
        return Ok(Vec::new());
    };
    let songs = songs
        .as_array()
        .ok_or_else(|| ProviderError::other("网易云音乐返回的 /result/songs 不是数组"))?;

    Ok(songs
        .iter()
        .filter_map(|song| {
            let id = song["id"].as_u64()?;
            let artists: Vec<String> = song["ar"]
                .as_array()
                .map(|artists| {
                    artists
                        .iter()
                        .filter_map(|a| a["name"].as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            Some(Candidate {
                id: id.to_string(),
                title: song["name"].as_str().unwrap_or_default().to_string(),
                artists,
                cover_url: song.pointer("/al/picUrl").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect())
}

/// 从歌词接口响应中提取同步歌词
fn parse_lyric(data: &Value) -> ProviderResult<String> {
    if data["nolyric"].as_bool() == Some(true) || data["uncollected"].as_bool() == Some(true) {
        return Err(ProviderError::NotFound);
    }
    synced_only(data.pointer("/lrc/lyric").and_then(Value::as_str))
}

#[async_trait]
impl MetadataProvider for NeteaseProvider {
    fn name(&self) -> &str {
        "netease"
    }

    fn supports_offset(&self) -> bool {
        true
    }

    async fn lookup(&self, title: &str, artist: &str, offset: u32) -> ProviderResult<SongMetadata> {
        let query = Query::new(title, artist).with_offset(offset);
        let data = self.search(&query.keyword()).await?;
        let candidates = parse_candidates(&data)?;
        debug!("网易云音乐搜索结果数量: {}", candidates.len());
        Ok(pick_candidate("网易云音乐", candidates, &query)?.into_metadata())
    }
}

#[async_trait]
impl LyricsProvider for NeteaseProvider {
    fn name(&self) -> &str {
        "netease"
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
            "code": 200,
            "result": {
                "songs": [
                    {
                        "id": 186016,
                        "name": "晴天",
                        "ar": [{"name": "周杰伦"}],
                        "al": {"picUrl": "https://p1.music.126.net/cover.jpg"}
                    },
                    {"name": "no id"}
                ]
            }
        });

        let candidates = parse_candidates(&data).unwrap();
        assert_eq!(candidates.len(), 1);

        let metadata = candidates[0].clone().into_metadata();
        assert_eq!(metadata.title.as_deref(), Some("晴天"));
        assert_eq!(metadata.artist.as_deref(), Some("周杰伦"));
        assert_eq!(metadata.track_link.as_deref(), Some("186016"));
        assert_eq!(
            metadata.cover_url.as_deref(),
            Some("https://p1.music.126.net/cover.jpg")
        );

        assert!(parse_candidates(&json!({"code": 200, "result": {}}))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_lyric() {
        let data = json!({"lrc": {"lyric": "[00:00.00]故事的小黄花\n"}});
        assert_eq!(parse_lyric(&data).unwrap(), "[00:00.00]故事的小黄花\n");

        assert_eq!(
            parse_lyric(&json!({"nolyric": true})),
            Err(ProviderError::NotFound)
        );
        assert_eq!(
            parse_lyric(&json!({"lrc": {"lyric": "纯音乐，请欣赏"}})),
            Err(ProviderError::NotFound)
        );
    }

    #[test]
    fn test_weapi_encrypt() {
        let form = weapi_encrypt(json!({"id": "1"})).unwrap();
        assert!(!form.params.is_empty());
        assert_eq!(form.enc_sec_key.len(), 256);
    }
}
