use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use lyrics_finder::app::{App, SearchRequest};
use lyrics_finder::config::Config;
use lyrics_finder::lyrics::Query;

/// 为歌曲查找同步歌词并保存为 .lrc 文件
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// 歌曲标题
    #[arg(short, long)]
    title: Option<String>,

    /// 艺术家
    #[arg(short, long)]
    artist: Option<String>,

    /// 从本地音频文件名推断标题和艺术家 (`艺术家 - 标题.mp3`)
    #[arg(short, long, conflicts_with_all = ["title", "artist"])]
    file: Option<PathBuf>,

    /// 使用第几个候选结果
    #[arg(long, default_value_t = 0)]
    offset: u32,

    /// 没有歌词时最多再尝试几个候选结果
    #[arg(long, default_value_t = 0)]
    tries: u32,

    /// 歌词源: netease / qqmusic / lrclib
    #[arg(short, long)]
    provider: Option<String>,

    /// 保存路径 (目录或文件)，默认使用配置中的保存目录
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 打印歌词而不保存
    #[arg(long)]
    print: bool,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_request(self) -> Result<SearchRequest> {
        let (query, from_file) = match &self.file {
            Some(path) => (Query::from_file_name(path), true),
            None => {
                if self.title.is_none() && self.artist.is_none() {
                    bail!("请通过 --title/--artist 或 --file 指定歌曲");
                }
                (
                    Query::new(
                        self.title.clone().unwrap_or_default(),
                        self.artist.clone().unwrap_or_default(),
                    ),
                    false,
                )
            }
        };

        Ok(SearchRequest {
            query: query.with_offset(self.offset),
            from_file,
            provider: self.provider,
            output: self.output,
            print: self.print,
            extra_tries: self.tries,
        })
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lyrics_finder={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Arc::new(Config::load(args.config.clone())?);
    debug!("配置: {:?}", config);

    let request = args.into_request()?;
    let app = App::new(config);

    match app.run(request).await {
        Ok(outcome) => {
            if let Some(path) = outcome.saved_to {
                info!("歌词已保存到 {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}
