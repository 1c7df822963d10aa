//! media-coverage-tracker
//!
//! メディア掲載リンクを画像/記事に分類し、アシスタントAPIの応答から
//! カテゴリを判定してスコアカードシートへ書き込む。

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod reader;
pub mod server;
pub mod writer;
