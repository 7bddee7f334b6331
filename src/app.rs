// 应用流程

mod core;

pub use self::core::{App, SearchOutcome, SearchRequest};
