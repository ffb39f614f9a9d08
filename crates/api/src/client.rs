//! reqwest implementation of the [`Remote`] trait.
//!
//! All control-plane endpoints are HTTPS GETs with query-string parameters
//! returning the JSON envelope. Transport failures and HTTP
//! 429/500/502/503/504/509 are retried under the client's control pacer;
//! everything else surfaces to the caller.

use std::sync::RwLock;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use serde::de::DeserializeOwned;
use tokio_util::io::{ReaderStream, StreamReader};

use linkbox_common::pacer::Attempt;
use linkbox_common::{ByteReader, Pacer};

use crate::error::{retryable_http_status, ApiError};
use crate::remote::{ByteRange, Remote};
use crate::types::{
    BindResponse, CommonResponse, FileSearchResponse, FolderCreateResponse, LoginResponse,
    UploadSessionResponse, UploadUrlResponse,
};

/// Default control-plane root.
pub const DEFAULT_BASE_URL: &str = "https://www.linkbox.to/api";

/// Authenticated REST client for the Linkbox control plane and signed-URL
/// data plane.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    account_token: RwLock<Option<String>>,
    pacer: Pacer,
}

impl RestClient {
    /// Create a client for the production endpoint.
    ///
    /// # Arguments
    /// * `token` - API token used by the open endpoints
    /// * `user_agent` - User agent sent on every request
    pub fn new(token: impl Into<String>, user_agent: &str) -> Result<Self, ApiError> {
        Self::with_base_url(token, user_agent, DEFAULT_BASE_URL)
    }

    /// Create a client against an alternate control-plane root.
    pub fn with_base_url(
        token: impl Into<String>,
        user_agent: &str,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http: reqwest::Client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::transport(e.to_string(), false))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            account_token: RwLock::new(None),
            pacer: Pacer::control(),
        })
    }

    fn account_token(&self) -> String {
        self.account_token
            .read()
            .unwrap()
            .clone()
            .unwrap_or_default()
    }

    /// One classified GET attempt; the pacer drives the retry loop.
    async fn attempt_get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Attempt<String, ApiError> {
        let response = match self.http.get(url).query(query).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(ApiError::transport(e.to_string(), true)),
        };

        let code: u16 = response.status().as_u16();
        if response.status().is_success() {
            match response.text().await {
                Ok(body) => Attempt::Done(body),
                Err(e) => Attempt::Retry(ApiError::transport(e.to_string(), true)),
            }
        } else if retryable_http_status(code) {
            Attempt::Retry(ApiError::transport(format!("http status {code}"), true))
        } else {
            Attempt::Fatal(ApiError::transport(format!("http status {code}"), false))
        }
    }

    /// GET `path` under the API root and decode the JSON envelope.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url: String = format!("{}/{}", self.base_url, path);
        let url: &str = url.as_str();
        let body: String = self.pacer.call(|| self.attempt_get(url, query)).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Remote for RestClient {
    async fn file_search(
        &self,
        name: &str,
        pid: i64,
        page_no: u32,
        page_size: u32,
    ) -> Result<FileSearchResponse, ApiError> {
        self.get_json(
            "open/file_search",
            &[
                ("name", name.to_string()),
                ("pid", pid.to_string()),
                ("token", self.token.clone()),
                ("pageNo", page_no.to_string()),
                ("pageSize", page_size.to_string()),
            ],
        )
        .await
    }

    async fn folder_create(&self, name: &str, pid: i64) -> Result<FolderCreateResponse, ApiError> {
        self.get_json(
            "open/folder_create",
            &[
                ("token", self.token.clone()),
                ("name", name.to_string()),
                ("pid", pid.to_string()),
                ("isShare", "0".to_string()),
                ("canInvite", "1".to_string()),
                ("canShare", "1".to_string()),
                ("withBodyImg", "1".to_string()),
                ("desc", String::new()),
            ],
        )
        .await
    }

    async fn folder_delete(&self, dir_id: i64) -> Result<CommonResponse, ApiError> {
        self.get_json(
            "open/folder_del",
            &[
                ("dirIds", dir_id.to_string()),
                ("token", self.token.clone()),
            ],
        )
        .await
    }

    async fn folder_rename(&self, dir_id: i64, name: &str) -> Result<CommonResponse, ApiError> {
        self.get_json(
            "open/folder_edit",
            &[
                ("dirId", dir_id.to_string()),
                ("name", name.to_string()),
                ("token", self.token.clone()),
                ("canShare", "1".to_string()),
                ("canInvite", "1".to_string()),
                ("change_avatar", "0".to_string()),
                ("desc", String::new()),
            ],
        )
        .await
    }

    async fn folder_move(&self, dir_id: i64, new_pid: i64) -> Result<CommonResponse, ApiError> {
        self.get_json(
            "open/folder_move",
            &[
                ("dirIds", dir_id.to_string()),
                ("pid", new_pid.to_string()),
                ("token", self.token.clone()),
            ],
        )
        .await
    }

    async fn file_rename(&self, item_id: &str, name: &str) -> Result<CommonResponse, ApiError> {
        self.get_json(
            "open/file_rename",
            &[
                ("itemId", item_id.to_string()),
                ("name", name.to_string()),
                ("token", self.token.clone()),
            ],
        )
        .await
    }

    async fn file_move(&self, item_id: &str, new_pid: i64) -> Result<CommonResponse, ApiError> {
        self.get_json(
            "open/file_move",
            &[
                ("itemIds", item_id.to_string()),
                ("pid", new_pid.to_string()),
                ("token", self.token.clone()),
            ],
        )
        .await
    }

    async fn file_delete(&self, item_id: &str) -> Result<CommonResponse, ApiError> {
        self.get_json(
            "open/file_del",
            &[
                ("itemIds", item_id.to_string()),
                ("token", self.token.clone()),
            ],
        )
        .await
    }

    async fn upload_url(&self, prefix_md5: &str, size: u64) -> Result<UploadUrlResponse, ApiError> {
        self.get_json(
            "open/get_upload_url",
            &[
                ("fileMd5ofPre10m", prefix_md5.to_string()),
                ("fileSize", size.to_string()),
                ("token", self.token.clone()),
            ],
        )
        .await
    }

    async fn bind_upload(
        &self,
        prefix_md5: &str,
        size: u64,
        pid: i64,
        name: &str,
    ) -> Result<BindResponse, ApiError> {
        self.get_json(
            "open/folder_upload_file",
            &[
                ("fileMd5ofPre10m", prefix_md5.to_string()),
                ("fileSize", size.to_string()),
                ("pid", pid.to_string()),
                ("diyName", name.to_string()),
                ("token", self.token.clone()),
            ],
        )
        .await
    }

    async fn upload_session(&self, vgroup: &str) -> Result<UploadSessionResponse, ApiError> {
        self.get_json(
            "file/get_file_upload_session",
            &[
                ("scene", "common".to_string()),
                ("vgroupType", "md5_10m".to_string()),
                ("vgroup", vgroup.to_string()),
                ("token", self.account_token()),
            ],
        )
        .await
    }

    async fn create_item(
        &self,
        vgroup: &str,
        pid: i64,
        name: &str,
    ) -> Result<BindResponse, ApiError> {
        self.get_json(
            "file/create_item",
            &[
                ("diyName", name.to_string()),
                ("filename", name.to_string()),
                ("pid", pid.to_string()),
                ("vgroup", vgroup.to_string()),
                ("vgroupType", "md5_10m".to_string()),
                ("token", self.account_token()),
            ],
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.get_json(
            "user/login_email",
            &[
                ("email", email.to_string()),
                ("pwd", password.to_string()),
            ],
        )
        .await
    }

    fn set_account_token(&self, token: Option<String>) {
        *self.account_token.write().unwrap() = token;
    }

    async fn upload_signed(&self, url: &str, size: u64, body: ByteReader) -> Result<(), ApiError> {
        let stream = ReaderStream::new(body);
        let response = self
            .http
            .put(url)
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string(), false))?;

        let code: u16 = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ApiError::transport(
                format!("signed upload failed with http status {code}"),
                retryable_http_status(code),
            ));
        }

        // Drain the acknowledgement body so the connection can be reused.
        response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(e.to_string(), false))?;
        Ok(())
    }

    async fn download(&self, url: &str, range: Option<ByteRange>) -> Result<ByteReader, ApiError> {
        let mut request = self.http.get(url);
        if let Some(range) = range {
            request = request.header(RANGE, format!("bytes={}-{}", range.start, range.end));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string(), true))?;

        let code: u16 = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ApiError::transport(
                format!("download failed with http status {code}"),
                retryable_http_status(code),
            ));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .boxed();
        Ok(Box::new(StreamReader::new(stream)))
    }
}
