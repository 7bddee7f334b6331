use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ProviderResult, SessionError};
use crate::lyrics::state::{FailureKind, LyricsState, SessionSnapshot, SessionState};
use crate::lyrics::{LyricsProvider, MetadataProvider, Query, SongMetadata};

/// 一次"搜索歌曲 → 获取歌词"流程的会话
///
/// 每次 `submit`/`retry`/`edit`/`dismiss_error` 都会让会话代数加一，
/// 异步调用完成时只有代数一致的结果才会写入状态。
#[derive(Clone)]
pub struct LyricsSearchSession {
    inner: Arc<Inner>,
}

struct Inner {
    metadata_provider: Arc<dyn MetadataProvider>,
    lyrics_provider: Arc<dyn LyricsProvider>,
    core: Mutex<Core>,
    notifier: watch::Sender<SessionSnapshot>,
}

#[derive(Default)]
struct Core {
    generation: u64,
    state: SessionState,
    /// 最近一次提交的查询
    query: Option<Query>,
    /// 当前 Success 状态是否已经发起过歌词请求
    lyrics_requested: bool,
}

impl Core {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            state: self.state.clone(),
        }
    }

    fn reject(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            operation,
            state: self.state.name(),
        }
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.state = SessionState::NotSubmitted;
        self.lyrics_requested = false;
    }
}

impl LyricsSearchSession {
    /// 创建未提交状态的会话
    pub fn new(
        metadata_provider: Arc<dyn MetadataProvider>,
        lyrics_provider: Arc<dyn LyricsProvider>,
    ) -> Self {
        let (notifier, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                metadata_provider,
                lyrics_provider,
                core: Mutex::new(Core::default()),
                notifier,
            }),
        }
    }

    /// 用已有的查询（例如从本地文件推断）创建会话并立即开始搜索
    ///
    /// 需要在 Tokio 运行时中调用，否则返回 [`SessionError::NoRuntime`]。
    pub fn seeded(
        metadata_provider: Arc<dyn MetadataProvider>,
        lyrics_provider: Arc<dyn LyricsProvider>,
        query: Query,
    ) -> Result<Self, SessionError> {
        let runtime = current_runtime()?;
        let session = Self::new(metadata_provider, lyrics_provider);
        {
            let mut core = session.lock();
            session.begin(&mut core, query, &runtime);
        }
        Ok(session)
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.notifier.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// 最近一次提交的查询，用于编辑时回填
    pub fn query(&self) -> Option<Query> {
        self.lock().query.clone()
    }

    /// 当前是否可以"换一个"
    pub fn can_retry(&self) -> bool {
        let core = self.lock();
        matches!(core.state, SessionState::Success { .. })
            && self.inner.metadata_provider.supports_offset()
    }

    /// 提交查询，仅在未提交状态下有效
    pub fn submit(&self, query: Query) -> Result<(), SessionError> {
        let mut core = self.lock();
        if !matches!(core.state, SessionState::NotSubmitted) {
            return Err(core.reject("submit"));
        }
        let runtime = current_runtime()?;
        self.begin(&mut core, query, &runtime);
        Ok(())
    }

    /// 以 offset + 1 重新搜索同一首歌，仅在成功状态下有效
    pub fn retry(&self) -> Result<(), SessionError> {
        let mut core = self.lock();
        if !matches!(core.state, SessionState::Success { .. }) {
            return Err(core.reject("retry"));
        }
        if !self.inner.metadata_provider.supports_offset() {
            debug!(
                "歌词源 {} 不支持 offset，忽略重试",
                self.inner.metadata_provider.name()
            );
            return Err(SessionError::RetryUnsupported(
                self.inner.metadata_provider.name().to_string(),
            ));
        }
        let Some(previous) = core.query.clone() else {
            return Err(core.reject("retry"));
        };
        let runtime = current_runtime()?;

        let next = Query {
            offset: previous.offset.saturating_add(1),
            ..previous
        };
        info!("查找下一个候选结果: offset={}", next.offset);
        self.start_lookup(&mut core, next, &runtime);
        Ok(())
    }

    /// 回到未提交状态，正在进行的请求结果会被忽略
    pub fn edit(&self) -> Result<(), SessionError> {
        let mut core = self.lock();
        match core.state {
            SessionState::Success { .. }
            | SessionState::Failed { .. }
            | SessionState::NoConnection => {
                core.reset();
                self.publish(&core);
                Ok(())
            }
            _ => Err(core.reject("edit")),
        }
    }

    /// 关闭错误提示
    pub fn dismiss_error(&self) -> Result<(), SessionError> {
        let mut core = self.lock();
        match core.state {
            SessionState::Failed { .. } | SessionState::NoConnection => {
                core.reset();
                self.publish(&core);
                Ok(())
            }
            _ => Err(core.reject("dismiss_error")),
        }
    }

    /// 为当前成功结果获取歌词
    ///
    /// 同一个成功状态只会发起一次请求，返回本次调用是否真正发起了请求。
    pub fn request_lyrics(&self) -> bool {
        let mut core = self.lock();
        self.start_lyrics_fetch(&mut core)
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.inner
            .core
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, core: &Core) {
        debug!(
            "会话状态变更: generation={}, state={}",
            core.generation,
            core.state.name()
        );
        self.inner.notifier.send_replace(core.snapshot());
    }

    fn begin(&self, core: &mut Core, query: Query, runtime: &Handle) {
        if query.is_empty() {
            warn!("标题和艺术家均为空，不发起搜索");
            core.generation += 1;
            core.query = Some(query);
            core.lyrics_requested = false;
            core.state = SessionState::Failed {
                failure: FailureKind::EmptyQuery,
            };
            self.publish(core);
            return;
        }
        self.start_lookup(core, query, runtime);
    }

    fn start_lookup(&self, core: &mut Core, query: Query, runtime: &Handle) {
        core.generation += 1;
        core.query = Some(query.clone());
        core.lyrics_requested = false;
        core.state = SessionState::Pending {
            query: query.clone(),
        };
        self.publish(core);

        let generation = core.generation;
        let provider = Arc::clone(&self.inner.metadata_provider);
        let session = self.clone();

        info!(
            "开始从 {} 搜索: {} - {} (offset={})",
            provider.name(),
            query.title,
            query.artist,
            query.offset
        );

        runtime.spawn(async move {
            let result = provider
                .lookup(&query.title, &query.artist, query.offset)
                .await;
            session.complete_lookup(generation, result);
        });
    }

    fn complete_lookup(&self, generation: u64, result: ProviderResult<SongMetadata>) {
        let mut core = self.lock();
        if core.generation != generation || !matches!(core.state, SessionState::Pending { .. }) {
            debug!(
                "丢弃过期的搜索结果: generation={}, 当前={}",
                generation, core.generation
            );
            return;
        }

        match &result {
            Ok(metadata) => info!(
                "匹配到歌曲: {} - {}",
                metadata.title.as_deref().unwrap_or_default(),
                metadata.artist.as_deref().unwrap_or_default()
            ),
            Err(e) => warn!("搜索失败: {}", e),
        }

        core.state = SessionState::from_lookup(result);
        self.publish(&core);
        self.start_lyrics_fetch(&mut core);
    }

    fn start_lyrics_fetch(&self, core: &mut Core) -> bool {
        let track_link = match &core.state {
            SessionState::Success { metadata, lyrics } => {
                if core.lyrics_requested || lyrics.is_resolved() {
                    return false;
                }
                metadata
                    .track_link
                    .clone()
                    .filter(|link| !link.trim().is_empty())
            }
            _ => return false,
        };
        core.lyrics_requested = true;

        let Some(track_link) = track_link else {
            debug!("匹配结果没有歌曲链接，视为无歌词");
            self.set_lyrics(core, LyricsState::Absent);
            return true;
        };

        let runtime = match current_runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("无法获取歌词: {}", e);
                self.set_lyrics(core, LyricsState::Errored(e.to_string()));
                return true;
            }
        };

        let generation = core.generation;
        let provider = Arc::clone(&self.inner.lyrics_provider);
        let session = self.clone();

        debug!("从 {} 获取歌词: {}", provider.name(), track_link);
        runtime.spawn(async move {
            let result = provider.fetch_synced(&track_link).await;
            session.complete_lyrics(generation, result);
        });
        true
    }

    fn complete_lyrics(&self, generation: u64, result: ProviderResult<String>) {
        let mut core = self.lock();
        if core.generation != generation {
            debug!(
                "丢弃过期的歌词结果: generation={}, 当前={}",
                generation, core.generation
            );
            return;
        }

        let lyrics = LyricsState::from_fetch(result);
        match &lyrics {
            LyricsState::Present(text) => info!("获取歌词成功, 共{}行", text.lines().count()),
            LyricsState::Absent => info!("歌词源没有同步歌词"),
            LyricsState::Errored(details) => warn!("获取歌词失败: {}", details),
            LyricsState::NotSubmitted => {}
        }
        self.set_lyrics(&mut core, lyrics);
    }

    fn set_lyrics(&self, core: &mut Core, value: LyricsState) {
        if let SessionState::Success { lyrics, .. } = &mut core.state {
            *lyrics = value;
            self.publish(core);
        }
    }
}

fn current_runtime() -> Result<Handle, SessionError> {
    Handle::try_current().map_err(|_| SessionError::NoRuntime)
}
