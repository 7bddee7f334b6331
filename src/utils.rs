// 工具函数模块

mod lrc;
mod string;

pub use lrc::LrcParser;
pub use string::{sanitize_string, string_similarity};
