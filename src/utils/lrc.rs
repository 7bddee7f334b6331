use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, trace};

// 匹配时间标签: [mm:ss.xx] 或 [mm:ss]
static TIME_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d{2,}):(\d{2})(?:[.:](\d{1,3}))?]").expect("invalid time regex"));

// 匹配元数据: [ar:艺术家]
static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([a-zA-Z]+):(.*?)]$").expect("invalid meta regex"));

/// LRC歌词解析器，用于解析常见的LRC格式歌词
pub struct LrcParser;

impl LrcParser {
    /// 解析LRC格式的歌词，返回按时间排序的歌词行和元数据
    pub fn parse(content: &str) -> Result<(Vec<(u64, String)>, Vec<(String, String)>)> {
        let mut time_lyrics = Vec::new();
        let mut metadata = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // 检查是否为元数据
            if let Some(cap) = META_TAG.captures(line) {
                metadata.push((cap[1].to_string(), cap[2].trim().to_string()));
                continue;
            }

            // 提取时间标签和对应的歌词文本
            let mut timestamps = Vec::new();
            let mut max_tag_end = 0;

            for cap in TIME_TAG.captures_iter(line) {
                let mins = cap[1].parse::<u64>()?;
                let secs = cap[2].parse::<u64>()?;
                let millis = match cap.get(3).map(|m| m.as_str()) {
                    None => 0,
                    // 处理毫秒，需要进行补齐
                    Some(ms) if ms.len() == 1 => ms.parse::<u64>()? * 100,
                    Some(ms) if ms.len() == 2 => ms.parse::<u64>()? * 10,
                    Some(ms) => ms.parse::<u64>()?,
                };

                timestamps.push(mins * 60 * 1000 + secs * 1000 + millis);
                if let Some(tag) = cap.get(0) {
                    max_tag_end = max_tag_end.max(tag.end());
                }
            }

            if !timestamps.is_empty() {
                let text = line[max_tag_end..].trim().to_string();
                trace!("LRC解析: 原始行='{}', 提取文本='{}'", line, text);
                for timestamp in timestamps {
                    time_lyrics.push((timestamp, text.clone()));
                }
            }
        }

        // 按时间排序
        time_lyrics.sort_by_key(|&(time, _)| time);

        Ok((time_lyrics, metadata))
    }

    /// 歌词是否带有时间轴：至少有一行带时间标签且文本非空
    pub fn is_synced(content: &str) -> bool {
        match Self::parse(content) {
            Ok((time_lyrics, _)) => time_lyrics.iter().any(|(_, text)| !text.is_empty()),
            Err(e) => {
                debug!("LRC解析失败: {}", e);
                false
            }
        }
    }
}
