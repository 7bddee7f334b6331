use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::lyrics::SongMetadata;

/// 生成 .lrc 文件内容：标题、艺术家、生成者标签，之后是原始歌词
pub fn lrc_payload(metadata: &SongMetadata, lyrics: &str, generator_tag: &str) -> String {
    format!(
        "[ti:{}]\n[ar:{}]\n[by:{}]\n{}",
        metadata.title.as_deref().unwrap_or_default(),
        metadata.artist.as_deref().unwrap_or_default(),
        generator_tag,
        lyrics
    )
}

/// 默认歌词文件名: `艺术家 - 标题.lrc`
pub fn lrc_file_name(metadata: &SongMetadata) -> String {
    let title = metadata.title.as_deref().map(str::trim).unwrap_or_default();
    let artist = metadata.artist.as_deref().map(str::trim).unwrap_or_default();

    let stem = match (artist.is_empty(), title.is_empty()) {
        (false, false) => format!("{} - {}", artist, title),
        (true, false) => title.to_string(),
        (false, true) => artist.to_string(),
        (true, true) => "lyrics".to_string(),
    };

    let stem: String = stem
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    format!("{}.lrc", stem.trim_matches('.'))
}

/// 歌词文件的存储接口
pub trait Persistence: Send + Sync {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// 直接写入本地文件系统
#[derive(Debug, Default, Clone)]
pub struct FsPersistence;

impl Persistence for FsPersistence {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建目录 {:?}", parent))?;
            debug!("已确保目录 {:?} 存在", parent);
        }

        fs::write(path, bytes).with_context(|| format!("写入歌词文件 {:?} 失败", path))?;
        info!("已保存歌词文件: {:?} ({} 字节)", path, bytes.len());
        Ok(())
    }
}

/// 目标是否指向歌词文件本身：已存在的文件或以 `.lrc` 结尾的路径
fn is_file_target(target: &Path) -> bool {
    target.is_file()
        || target
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("lrc"))
}

/// 生成歌词内容并写入目标位置
///
/// 目标为目录（包括尚未创建的目录）时使用默认文件名。
pub fn save_lyrics(
    persistence: &dyn Persistence,
    target: &Path,
    metadata: &SongMetadata,
    lyrics: &str,
    generator_tag: &str,
) -> Result<PathBuf> {
    let path = if is_file_target(target) {
        target.to_path_buf()
    } else {
        target.join(lrc_file_name(metadata))
    };

    let payload = lrc_payload(metadata, lyrics, generator_tag);
    persistence.write(&path, payload.as_bytes())?;
    Ok(path)
}
