use reqwest::StatusCode;
use thiserror::Error;

/// 歌词源调用失败的分类
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// 网络不可用（DNS 解析失败、连接失败、超时）
    #[error("网络连接不可用: {0}")]
    Connection(String),

    /// 没有匹配的歌曲或歌词
    #[error("未找到结果")]
    NotFound,

    /// 请求过于频繁
    #[error("请求被限流")]
    RateLimited,

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// 根据 HTTP 状态码分类，成功状态返回 None
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }
        Some(match status {
            StatusCode::NOT_FOUND => ProviderError::NotFound,
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            _ => ProviderError::Other(format!("HTTP {}", status)),
        })
    }

    pub fn other(message: impl Into<String>) -> Self {
        ProviderError::Other(message.into())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            return ProviderError::Connection(e.to_string());
        }
        if let Some(err) = e.status().and_then(ProviderError::from_status) {
            return err;
        }
        ProviderError::Other(e.to_string())
    }
}

/// 会话操作被拒绝的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("当前状态 {state} 下不允许执行 {operation}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    /// 歌词源只返回唯一结果，无法换一个
    #[error("歌词源 {0} 不支持查找其他匹配结果")]
    RetryUnsupported(String),

    /// 发起请求需要 Tokio 运行时
    #[error("当前线程没有可用的 Tokio 运行时")]
    NoRuntime,
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
