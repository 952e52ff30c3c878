use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{info, warn};

use rangelink_core::config::UploadConfig;
use rangelink_core::model::{RoundId, SessionId};
use rangelink_core::{Error, Result};

use crate::recorder::FinalizedRecording;

use super::VideoUploader;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Uploader backed by the processing service's HTTP API.
///
/// `POST {base}/upload-pose-video/{round_id}` takes a multipart form with
/// the video blob and the recording start timestamp;
/// `POST {base}/process-target/{round_id}` re-runs failed processing.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    session_id: SessionId,
}

impl HttpUploader {
    pub fn new(config: &UploadConfig, session_id: impl Into<SessionId>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            session_id: session_id.into(),
        })
    }

    /// Filename the processing service stores the blob under; it is keyed by
    /// session, the round travels in the URL.
    fn video_file_name(&self) -> String {
        format!("session_{}.webm", self.session_id)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl VideoUploader for HttpUploader {
    async fn upload_pose_video(
        &self,
        round_id: &RoundId,
        recording: &FinalizedRecording,
    ) -> Result<()> {
        // An empty blob means stop raced start; the service would accept
        // and then fail processing, so reject it before the network.
        if recording.is_empty() {
            return Err(Error::upload(round_id, "empty recording"));
        }

        let url = format!("{}/upload-pose-video/{}", self.base_url, round_id);
        let video = Part::bytes(recording.data.to_vec())
            .file_name(self.video_file_name())
            .mime_str("video/webm")
            .map_err(|e| Error::upload(round_id, e.to_string()))?;
        let form = Form::new().part("video", video).text(
            "recording_start_timestamp",
            recording.started_at_ms.to_string(),
        );

        info!(
            %round_id,
            bytes = recording.data.len(),
            chunks = recording.chunk_count,
            "uploading recording"
        );

        let response = self
            .authorize(self.client.post(&url).multipart(form))
            .send()
            .await
            .map_err(|e| Error::upload(round_id, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%round_id, %status, "upload rejected");
            return Err(Error::upload(
                round_id,
                format!("server returned {status}: {body}"),
            ));
        }
        Ok(())
    }

    async fn retry_processing(&self, round_id: &RoundId) -> Result<()> {
        let url = format!("{}/process-target/{}", self.base_url, round_id);
        let response = self
            .authorize(self.client.post(&url))
            .send()
            .await
            .map_err(|e| Error::processing(round_id, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::processing(
                round_id,
                format!("server returned {}", response.status()),
            ));
        }
        info!(%round_id, "processing retry accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn empty_recording() -> FinalizedRecording {
        FinalizedRecording {
            data: Bytes::new(),
            chunk_count: 0,
            duration: Duration::ZERO,
            started_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn empty_recording_is_rejected_without_network() {
        let uploader = HttpUploader::new(&UploadConfig::default(), "s1").unwrap();
        let err = uploader
            .upload_pose_video(&"r1".to_string(), &empty_recording())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UploadFailed { .. }));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let uploader = HttpUploader::new(
            &UploadConfig {
                base_url: "https://range.example/api/".to_string(),
                auth_token: None,
            },
            "s1",
        )
        .unwrap();
        assert_eq!(uploader.base_url, "https://range.example/api");
    }

    #[test]
    fn video_file_name_is_keyed_by_session() {
        let uploader = HttpUploader::new(&UploadConfig::default(), "sess42").unwrap();
        assert_eq!(uploader.video_file_name(), "session_sess42.webm");
    }
}
