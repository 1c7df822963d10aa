use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "media-tracker")]
#[command(about = "メディア掲載リンクの分類・スコアカード書き込みツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 設定ファイル（デフォルト: ~/.config/media-tracker/config.json）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTPサーバーを起動
    Serve {
        /// 待ち受けアドレス（例: 127.0.0.1:8002）
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// ワークブックのリンクを一括処理して結果を書き込む
    Process {
        /// リンクを読むシート名
        #[arg(short, long, required = true)]
        sheet: String,

        /// 対象ワークブック（デフォルト: 設定の excel_file_path）
        #[arg(short, long)]
        workbook: Option<PathBuf>,

        /// カテゴリ体系JSONファイル
        #[arg(short, long)]
        taxonomy: Option<PathBuf>,
    },

    /// URLを画像/記事に分類して表示
    Classify {
        #[arg(required = true)]
        url: String,
    },

    /// 設定を表示・初期化
    Config {
        /// 現在の設定を表示
        #[arg(long)]
        show: bool,

        /// デフォルト設定をファイルに書き出す
        #[arg(long)]
        init: bool,
    },
}
