//! Media Tracker Common Library
//!
//! CLIとHTTPサーバーで共有される型と判定ロジック（I/Oなし）

pub mod types;
pub mod error;
pub mod taxonomy;
pub mod classifier;
pub mod matcher;

pub use types::{AssistantReply, ClassificationRequest, LinkRow, Payload};
pub use error::{Error, Result};
pub use taxonomy::{Taxonomy, DEFAULT_TAXONOMY, LINK_FIELD};
pub use classifier::{classify, is_image_url, LinkKind};
pub use matcher::{match_categories, match_payload, CategoryFlags, CategoryMark, FailedPayloadPolicy};
