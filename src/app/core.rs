use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::lyrics::providers::{self, ProviderHandle};
use crate::lyrics::{
    FailureKind, LyricsSearchSession, LyricsState, Query, SessionSnapshot, SessionState,
    SongMetadata,
};
use crate::persistence::{save_lyrics, FsPersistence, Persistence};

/// 一次命令行搜索请求
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: Query,
    /// 查询是否来自本地文件名
    pub from_file: bool,
    /// 覆盖配置中的歌词源
    pub provider: Option<String>,
    /// 保存路径，目录或文件
    pub output: Option<PathBuf>,
    /// 打印到标准输出而不保存
    pub print: bool,
    /// 没有歌词时最多再尝试几个候选
    pub extra_tries: u32,
}

/// 搜索结束后的结果
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub metadata: SongMetadata,
    pub lyrics: String,
    pub saved_to: Option<PathBuf>,
}

pub struct App {
    config: Arc<Config>,
    persistence: Box<dyn Persistence>,
}

enum Step {
    Wait,
    Done(SongMetadata, String),
}

impl App {
    /// 创建新应用实例
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            persistence: Box::new(FsPersistence),
        }
    }

    /// 运行一次搜索
    pub async fn run(&self, request: SearchRequest) -> Result<SearchOutcome> {
        let provider_name = request
            .provider
            .clone()
            .unwrap_or_else(|| self.config.provider.clone());
        let handle = providers::get_provider(&provider_name, &self.config)?;

        let session = self.start_session(&handle, &request)?;
        let (metadata, lyrics) = self.drive(&session, request.extra_tries).await?;

        if request.print {
            println!("{}", lyrics);
            return Ok(SearchOutcome {
                metadata,
                lyrics,
                saved_to: None,
            });
        }

        let target = request.output.clone().unwrap_or_else(|| self.config.save_dir());
        let path = save_lyrics(
            self.persistence.as_ref(),
            &target,
            &metadata,
            &lyrics,
            &self.config.generator_tag,
        )?;

        Ok(SearchOutcome {
            metadata,
            lyrics,
            saved_to: Some(path),
        })
    }

    fn start_session(
        &self,
        handle: &ProviderHandle,
        request: &SearchRequest,
    ) -> Result<LyricsSearchSession> {
        let metadata = Arc::clone(&handle.metadata);
        let lyrics = Arc::clone(&handle.lyrics);

        if request.from_file {
            debug!("使用从文件名推断的查询: {:?}", request.query);
            return Ok(LyricsSearchSession::seeded(
                metadata,
                lyrics,
                request.query.clone(),
            )?);
        }

        let session = LyricsSearchSession::new(metadata, lyrics);
        session.submit(request.query.clone())?;
        Ok(session)
    }

    /// 等待会话结束，没有歌词时按需换下一个候选
    async fn drive(
        &self,
        session: &LyricsSearchSession,
        mut tries_left: u32,
    ) -> Result<(SongMetadata, String)> {
        let mut updates = session.subscribe();
        let mut snapshot = updates.borrow_and_update().clone();

        loop {
            match self.step(session, &snapshot, &mut tries_left)? {
                Step::Done(metadata, lyrics) => return Ok((metadata, lyrics)),
                Step::Wait => {}
            }
            snapshot = next_snapshot(&mut updates).await?;
        }
    }

    fn step(
        &self,
        session: &LyricsSearchSession,
        snapshot: &SessionSnapshot,
        tries_left: &mut u32,
    ) -> Result<Step> {
        match &snapshot.state {
            SessionState::NotSubmitted | SessionState::Pending { .. } => Ok(Step::Wait),
            SessionState::NoConnection => bail!("网络不可用，请检查网络连接"),
            SessionState::Failed { failure } => Err(match failure {
                FailureKind::EmptyQuery => anyhow!("请输入歌曲标题或艺术家"),
                FailureKind::NoTrackFound => anyhow!("没有找到匹配的歌曲"),
                FailureKind::RateLimited => {
                    anyhow!("请求过于频繁，可以使用 --provider 切换到其他歌词源")
                }
                FailureKind::Other(details) => anyhow!("搜索失败: {}", details),
            }),
            SessionState::Success { metadata, lyrics } => {
                let reason = match lyrics {
                    LyricsState::NotSubmitted => return Ok(Step::Wait),
                    LyricsState::Present(text) => {
                        info!(
                            "找到歌词: {} - {}",
                            metadata.title.as_deref().unwrap_or_default(),
                            metadata.artist.as_deref().unwrap_or_default()
                        );
                        return Ok(Step::Done(metadata.clone(), text.clone()));
                    }
                    LyricsState::Absent => "该歌曲没有同步歌词".to_string(),
                    LyricsState::Errored(details) => format!("获取歌词失败: {}", details),
                };

                if *tries_left > 0 && session.can_retry() {
                    *tries_left -= 1;
                    warn!("{}，尝试下一个候选结果", reason);
                    session.retry()?;
                    return Ok(Step::Wait);
                }
                bail!("{}", reason)
            }
        }
    }
}

/// 等待下一次状态变化，Ctrl-C 时中止
async fn next_snapshot(updates: &mut watch::Receiver<SessionSnapshot>) -> Result<SessionSnapshot> {
    tokio::select! {
        changed = updates.changed() => {
            changed.map_err(|_| anyhow!("会话已关闭"))?;
            Ok(updates.borrow_and_update().clone())
        }
        _ = tokio::signal::ctrl_c() => bail!("已取消"),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::{ProviderError, ProviderResult};
    use crate::lyrics::{LyricsProvider, MetadataProvider};

    /// 第 n 个候选的链接为 n，只有链接 "1" 有歌词
    struct Catalog;

    #[async_trait]
    impl MetadataProvider for Catalog {
        fn name(&self) -> &str {
            "catalog"
        }

        fn supports_offset(&self) -> bool {
            true
        }

        async fn lookup(&self, title: &str, artist: &str, offset: u32) -> ProviderResult<SongMetadata> {
            Ok(SongMetadata {
                title: Some(title.to_string()),
                artist: Some(artist.to_string()),
                cover_url: None,
                track_link: Some(offset.to_string()),
            })
        }
    }

    #[async_trait]
    impl LyricsProvider for Catalog {
        fn name(&self) -> &str {
            "catalog"
        }

        async fn fetch_synced(&self, track_link: &str) -> ProviderResult<String> {
            match track_link {
                "1" => Ok("[00:01.00]la la la".to_string()),
                _ => Err(ProviderError::NotFound),
            }
        }
    }

    fn app() -> App {
        App::new(Arc::new(Config::default()))
    }

    fn handle() -> ProviderHandle {
        let catalog = Arc::new(Catalog);
        ProviderHandle {
            metadata: catalog.clone(),
            lyrics: catalog,
        }
    }

    fn request(extra_tries: u32) -> SearchRequest {
        SearchRequest {
            query: Query::new("Song", "Artist"),
            from_file: false,
            provider: None,
            output: None,
            print: true,
            extra_tries,
        }
    }

    #[tokio::test]
    async fn test_drive_tries_next_candidate() {
        let app = app();
        let session = app.start_session(&handle(), &request(1)).unwrap();

        let (metadata, lyrics) = app.drive(&session, 1).await.unwrap();
        assert_eq!(metadata.track_link.as_deref(), Some("1"));
        assert_eq!(lyrics, "[00:01.00]la la la");
        assert_eq!(session.query().map(|q| q.offset), Some(1));
    }

    #[tokio::test]
    async fn test_drive_gives_up_without_tries() {
        let app = app();
        let session = app.start_session(&handle(), &request(0)).unwrap();

        let err = app.drive(&session, 0).await.unwrap_err();
        assert!(err.to_string().contains("没有同步歌词"));
    }

    #[tokio::test]
    async fn test_drive_reports_empty_query() {
        let app = app();
        let mut req = request(0);
        req.query = Query::new("", "");
        req.from_file = true;
        let session = app.start_session(&handle(), &req).unwrap();

        let err = app.drive(&session, 0).await.unwrap_err();
        assert!(err.to_string().contains("请输入"));
    }
}
