use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use media_coverage_tracker::{cli, config, dispatcher, pipeline, server};
use media_tracker_common::classify;
use std::sync::Arc;

use cli::{Cli, Commands};
use config::Config;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // 初期化は読み込みより先に行う
    if let Commands::Config { init: true, .. } = &cli.command {
        let path = Config::default().save(cli.config.as_deref())?;
        println!("✔ デフォルト設定を書き出しました: {}", path.display());
    }

    let config = Config::load(cli.config.as_deref()).context("設定の読み込みに失敗しました")?;

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            server::serve(config).await?;
        }

        Commands::Process { sheet, workbook, taxonomy } => {
            let mut config = config;
            if let Some(path) = workbook {
                config.excel_file_path = path;
            }
            if let Some(path) = taxonomy {
                config.taxonomy_path = Some(path);
            }

            let taxonomy = config.load_taxonomy()?;
            let assistants = Arc::new(dispatcher::AssistantClient::new(&config)?);
            let remote = pipeline::RemotePipeline::from_config(&config, assistants)?;

            let progress = ProgressBar::new(0);
            progress.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );

            let summary =
                pipeline::process_hyperlinks(&config, &taxonomy, &remote, &sheet, &progress)
                    .await
                    .with_context(|| format!("{} の処理に失敗しました", config.excel_file_path.display()))?;

            println!("✔ {}行を読み込み、{}行を書き込みました", summary.rows_read, summary.rows_written);
            if summary.failed_rows > 0 {
                println!("  取得に失敗した行: {}", summary.failed_rows);
            }
            println!(
                "  所要時間: {}秒",
                (summary.finished_at - summary.started_at).num_seconds()
            );
        }

        Commands::Classify { url } => {
            println!("{}", classify(&url).as_str());
        }

        Commands::Config { show, init } => {
            if show || !init {
                println!("{}", serde_json::to_string_pretty(&config)?);
                println!(
                    "  APIトークン: {}",
                    if config.api_token().is_ok() { "設定済み" } else { "未設定" }
                );
            }
        }
    }

    Ok(())
}
