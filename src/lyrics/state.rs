use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::lyrics::{Query, SongMetadata};

/// 搜索失败的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureKind {
    /// 标题和艺术家都为空
    EmptyQuery,
    NoTrackFound,
    /// 被歌词源限流，可以建议用户切换歌词源
    RateLimited,
    Other(String),
}

/// 匹配成功后歌词的获取状态
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum LyricsState {
    #[default]
    NotSubmitted,
    Present(String),
    /// 歌词源没有这首歌的同步歌词
    Absent,
    /// 获取失败，附带错误详情
    Errored(String),
}

impl LyricsState {
    /// 歌词是否已有结果
    pub fn is_resolved(&self) -> bool {
        !matches!(self, LyricsState::NotSubmitted)
    }

    pub(crate) fn from_fetch(result: Result<String, ProviderError>) -> Self {
        match result {
            Ok(text) => LyricsState::Present(text),
            Err(ProviderError::NotFound) => LyricsState::Absent,
            Err(e) => {
                let details = e.to_string();
                if details.trim().is_empty() {
                    LyricsState::Errored(format!("{:?}", e))
                } else {
                    LyricsState::Errored(details)
                }
            }
        }
    }
}

/// 搜索会话的当前状态
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NotSubmitted,
    Pending {
        query: Query,
    },
    Success {
        metadata: SongMetadata,
        lyrics: LyricsState,
    },
    Failed {
        failure: FailureKind,
    },
    /// 网络不可用，与普通失败分开处理
    NoConnection,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::NotSubmitted => "NotSubmitted",
            SessionState::Pending { .. } => "Pending",
            SessionState::Success { .. } => "Success",
            SessionState::Failed { .. } => "Failed",
            SessionState::NoConnection => "NoConnection",
        }
    }

    pub(crate) fn from_lookup(result: Result<SongMetadata, ProviderError>) -> Self {
        match result {
            Ok(metadata) => SessionState::Success {
                metadata,
                lyrics: LyricsState::NotSubmitted,
            },
            Err(ProviderError::Connection(_)) => SessionState::NoConnection,
            Err(ProviderError::NotFound) => SessionState::Failed {
                failure: FailureKind::NoTrackFound,
            },
            Err(ProviderError::RateLimited) => SessionState::Failed {
                failure: FailureKind::RateLimited,
            },
            Err(ProviderError::Other(details)) => SessionState::Failed {
                failure: FailureKind::Other(details),
            },
        }
    }
}

/// 发给观察者的状态快照
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// 产生此状态的会话代数
    pub generation: u64,
    pub state: SessionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_classification() {
        assert_eq!(
            SessionState::from_lookup(Err(ProviderError::Connection("dns".into()))),
            SessionState::NoConnection
        );
        assert_eq!(
            SessionState::from_lookup(Err(ProviderError::NotFound)),
            SessionState::Failed {
                failure: FailureKind::NoTrackFound
            }
        );
        assert_eq!(
            SessionState::from_lookup(Err(ProviderError::RateLimited)),
            SessionState::Failed {
                failure: FailureKind::RateLimited
            }
        );
    }

    #[test]
    fn test_lyrics_classification() {
        assert_eq!(
            LyricsState::from_fetch(Err(ProviderError::NotFound)),
            LyricsState::Absent
        );
        match LyricsState::from_fetch(Err(ProviderError::other(""))) {
            LyricsState::Errored(details) => assert!(!details.is_empty()),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[test]
    fn test_state_serializes_as_tagged_variant() {
        let state = SessionState::Failed {
            failure: FailureKind::Other("boom".to_string()),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["failure"]["kind"], "other");

        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
