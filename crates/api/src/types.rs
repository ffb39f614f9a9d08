//! Wire types for the Linkbox control plane.
//!
//! Every endpoint returns a JSON envelope `{status, msg, data}`. Status `1`
//! is success; `1501` means "already exists" on create/rename/move and is
//! success for idempotent callers; `600` on the two upload handshakes means
//! the content is already present server-side and no bytes need transfer.

use serde::Deserialize;

use crate::error::ApiError;

/// Envelope status: success.
pub const STATUS_OK: i64 = 1;
/// Envelope status on create/rename/move: the target already exists.
pub const STATUS_ALREADY_EXISTS: i64 = 1501;
/// Envelope status on upload handshakes: content already present, skip transfer.
pub const STATUS_CONTENT_PRESENT: i64 = 600;

/// Return an error unless `status` is success.
pub fn check_status(status: i64, msg: &str) -> Result<(), ApiError> {
    if status == STATUS_OK {
        Ok(())
    } else {
        Err(ApiError::Status {
            status,
            msg: msg.to_string(),
        })
    }
}

/// Like [`check_status`] but accepts "already exists" as success.
pub fn check_status_idempotent(status: i64, msg: &str) -> Result<(), ApiError> {
    if status == STATUS_OK || status == STATUS_ALREADY_EXISTS {
        Ok(())
    } else {
        Err(ApiError::Status {
            status,
            msg: msg.to_string(),
        })
    }
}

/// A file or directory record from the search endpoint.
///
/// Names arrive in the remote's transport encoding; callers normalise them
/// through the name codec before comparison. The signed `url` is transient
/// and may be empty in list responses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Entity {
    /// Type tag: `file`, `dir`, `sdir`, `doc`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Subtype: `txt`, `png`, ...
    #[serde(rename = "sub_type", default)]
    pub sub_type: String,
    /// Display name, server-encoded.
    #[serde(default)]
    pub name: String,
    /// Transient signed download URL; may be empty.
    #[serde(default)]
    pub url: String,
    /// Creation timestamp, seconds since epoch.
    #[serde(default)]
    pub ctime: i64,
    /// Size in bytes.
    #[serde(default)]
    pub size: i64,
    /// Stable numeric ID.
    #[serde(default)]
    pub id: i64,
    /// Parent directory's numeric ID.
    #[serde(default)]
    pub pid: i64,
    /// String handle for file-scoped mutations (rename, move, delete).
    #[serde(rename = "item_id", default)]
    pub item_id: String,
}

impl Entity {
    /// Whether this record describes a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == "dir" || self.kind == "sdir"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchData {
    #[serde(rename = "list", default)]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileSearchResponse {
    #[serde(default)]
    pub data: SearchData,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}

/// Envelope shared by mutation endpoints that return no payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonResponse {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderCreateData {
    #[serde(rename = "dirId", default)]
    pub dir_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderCreateResponse {
    #[serde(default)]
    pub data: FolderCreateData,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadUrlData {
    #[serde(rename = "signUrl", default)]
    pub sign_url: String,
}

/// Response of `get_upload_url`: either a signed PUT target (status 1) or
/// "content already present" (status 600).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadUrlResponse {
    #[serde(default)]
    pub data: UploadUrlData,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemData {
    #[serde(rename = "itemId", default)]
    pub item_id: String,
}

/// Response of `folder_upload_file` and `create_item`: binds uploaded
/// content to a name and yields the new item's handle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindResponse {
    #[serde(default)]
    pub data: ItemData,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}

/// Credential bundle for the backing object store, issued per upload
/// attempt by `get_file_upload_session`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSessionData {
    #[serde(rename = "ak", default)]
    pub access_key: String,
    #[serde(rename = "sk", default)]
    pub secret_key: String,
    #[serde(rename = "sToken", default)]
    pub security_token: String,
    /// Object-store endpoint host or URL.
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub bucket: String,
    /// Object key assigned to receive the multipart parts.
    #[serde(rename = "poolPath", default)]
    pub pool_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSessionResponse {
    #[serde(default)]
    pub data: UploadSessionData,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginUserInfo {
    #[serde(rename = "size_cap", default)]
    pub size_cap: i64,
    #[serde(rename = "size_curr", default)]
    pub size_curr: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub token: String,
    #[serde(rename = "userInfo", default)]
    pub user_info: LoginUserInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub data: LoginData,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub msg: String,
}
