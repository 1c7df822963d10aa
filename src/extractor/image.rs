use super::Extractor;
use crate::dispatcher::{AssistantClient, ImageUpload, UploadOutcome};
use media_tracker_common::Payload;
use tracing::{debug, warn};
use uuid::Uuid;

impl Extractor {
    /// 画像を取得してアップロードし、blob URL を返す
    ///
    /// アップロードごとに新しいセッションIDを使う。
    pub async fn process_image_link(
        &self,
        url: &str,
        assistants: &AssistantClient,
        assistant_id: &str,
    ) -> Payload {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "image fetch failed");
                return Payload::Failed(format!("Error: {}", e));
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(url, status = status.as_u16(), "image fetch returned non-200");
            return Payload::Failed(format!("Failed to retrieve image: {}", status.as_u16()));
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = match response.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => return Payload::Failed(format!("Error: {}", e)),
        };

        let upload = ImageUpload {
            file_name: file_name_from_url(url),
            content_type: sniff_content_type(&bytes).or(header_type),
            bytes,
        };
        let session_id = Uuid::new_v4().to_string();
        debug!(url, session_id, size = upload.bytes.len(), "uploading image");

        match assistants.upload_image(assistant_id, &session_id, upload).await {
            Ok(outcome) => match outcome.blob_url() {
                Some(blob) => Payload::Text(blob.to_string()),
                None => match outcome {
                    UploadOutcome::Rejected { message, .. } => Payload::Failed(message),
                    UploadOutcome::Uploaded(_) => Payload::Failed("No blob URL found".into()),
                },
            },
            Err(e) => Payload::Failed(format!("Error: {}", e)),
        }
    }
}

/// URL末尾のパス要素（クエリは除く）
fn file_name_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

/// 先頭バイトから画像形式を判定
fn sniff_content_type(bytes: &[u8]) -> Option<String> {
    ::image::guess_format(bytes)
        .ok()
        .map(|f| f.to_mime_type().to_string())
}
