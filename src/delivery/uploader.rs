//! Uploader: one network request per batch.
//!
//! An uploader never retries on its own. Retrying is the delivery controller's
//! job (via the next scheduled flush), so the system has exactly one retry
//! policy.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::error_handling::{categorize_reqwest_error, InitializationError, UploadError};
use crate::initialization::init_client;

/// A serialized batch addressed to a collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub endpoint: Url,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// What the collector answered on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
}

/// Performs the network call for one batch.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Sends `request` once. Any 2xx answer is success; every other status
    /// and every transport error is a failure.
    async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, UploadError>;
}

/// HTTP POST uploader built on `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
}

impl HttpUploader {
    pub fn new(client: reqwest::Client) -> Self {
        HttpUploader { client }
    }

    /// Builds an uploader with its own client and the given request timeout.
    pub fn with_timeout(timeout_seconds: u64) -> Result<Self, InitializationError> {
        Ok(Self::new(init_client(timeout_seconds)?))
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
        // reqwest sets Content-Length for fixed-size bodies
        let response = self
            .client
            .post(request.endpoint)
            .header(CONTENT_TYPE, request.content_type)
            .body(request.body)
            .send()
            .await
            .map_err(|e| categorize_reqwest_error(&e))?;

        let status = response.status();
        if status.is_success() {
            Ok(UploadResponse {
                status: status.as_u16(),
            })
        } else {
            Err(UploadError::Status(status.as_u16()))
        }
    }
}
