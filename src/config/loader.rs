use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 使用的歌词源: netease / qqmusic / lrclib
    pub provider: String,

    /// 写入 .lrc 文件 `[by:]` 标签的内容
    pub generator_tag: String,

    /// 歌词文件默认保存目录
    pub save_dir: String,

    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,

    /// 歌词源特定配置
    pub sources: SourcesConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SourcesConfig {
    /// 网易云音乐API配置
    pub netease: NeteaseConfig,

    /// QQ音乐API配置
    pub qqmusic: QQMusicConfig,

    /// LRCLIB 配置
    pub lrclib: LrclibConfig,
}

/// 网易云音乐配置
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NeteaseConfig {
    /// 每次搜索取回的候选数量
    pub search_limit: u32,
}

impl Default for NeteaseConfig {
    fn default() -> Self {
        Self { search_limit: 50 }
    }
}

/// QQ音乐配置
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct QQMusicConfig {
    pub search_limit: u32,
}

impl Default for QQMusicConfig {
    fn default() -> Self {
        Self { search_limit: 50 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LrclibConfig {
    pub base_url: String,
}

impl Default for LrclibConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lrclib.net/api".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let pkg_name = env!("CARGO_PKG_NAME");
        let default_save_dir = dirs::audio_dir()
            .or_else(dirs::home_dir)
            .map(|p| p.join("Lyrics"))
            .unwrap_or_else(|| PathBuf::from("lyrics"));

        Config {
            provider: "netease".to_string(),
            generator_tag: pkg_name.to_string(),
            save_dir: default_save_dir.to_string_lossy().to_string(),
            request_timeout_secs: 10,
            sources: SourcesConfig::default(),
        }
    }
}

impl Config {
    /// 加载配置，支持从指定路径或默认路径加载
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let pkg_name = env!("CARGO_PKG_NAME");
        let config_path = path.unwrap_or_else(|| {
            dirs::config_dir()
                .map(|p| p.join(pkg_name).join("config.toml"))
                .unwrap_or_else(|| PathBuf::from(format!("{}-config.toml", pkg_name)))
        });

        debug!("尝试从 {:?} 加载配置文件", config_path);

        if !config_path.exists() {
            debug!("配置文件 {:?} 不存在，将创建默认配置", config_path);
            let default_config = Config::default();
            let toml = toml::to_string_pretty(&default_config)?;

            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
                debug!("已确保目录 {:?} 存在", parent);
            }

            fs::write(&config_path, toml)?;
            info!("已创建默认配置文件: {:?}", config_path);
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path)?;
        let config = Self::parse(&content).unwrap_or_else(|e| {
            error!("解析配置文件 {:?} 失败: {}", config_path, e);
            warn!("由于解析错误，将加载默认配置");
            Config::default()
        });

        debug!("已成功加载配置文件");
        Ok(config)
    }

    /// 从 TOML 文本解析配置，缺省字段使用默认值
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 处理保存目录中的 ~
    pub fn save_dir(&self) -> PathBuf {
        if let Some(rest) = self.save_dir.strip_prefix("~/") {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home.join(rest)
        } else {
            PathBuf::from(&self.save_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
provider = "lrclib"

[sources.netease]
search_limit = 10
"#,
        )
        .unwrap();

        assert_eq!(config.provider, "lrclib");
        assert_eq!(config.generator_tag, env!("CARGO_PKG_NAME"));
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.sources.netease.search_limit, 10);
        assert_eq!(config.sources.qqmusic.search_limit, 50);
        assert_eq!(config.sources.lrclib.base_url, "https://lrclib.net/api");
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let config = Config::load(Some(path.clone())).unwrap();
        assert!(path.exists());
        assert_eq!(config.provider, "netease");

        fs::write(&path, "provider = [broken").unwrap();
        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.provider, "netease");
    }

    #[test]
    fn test_save_dir_expands_home() {
        let config = Config {
            save_dir: "~/Music/Lyrics".to_string(),
            ..Config::default()
        };
        assert!(config.save_dir().ends_with("Music/Lyrics"));
        assert!(!config.save_dir().starts_with("~"));
    }
}
