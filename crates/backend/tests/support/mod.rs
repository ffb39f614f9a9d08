#![allow(dead_code)]

//! In-memory remote for integration tests.
//!
//! `FakeRemote` implements the `Remote` trait over a flat entry table,
//! reproducing the server quirks the backend must cope with: name filters
//! match substrings across all directories, freshly bound or freshly
//! renamed/moved entities can be held invisible for a configurable number
//! of searches, and duplicate content is deduplicated by vgroup. Every
//! call is appended to a log so tests can assert on the exact API
//! sequence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use linkbox_api::types::{
    BindResponse, CommonResponse, Entity, FileSearchResponse, FolderCreateData,
    FolderCreateResponse, ItemData, LoginData, LoginResponse, LoginUserInfo, SearchData,
    UploadSessionData, UploadSessionResponse, UploadUrlData, UploadUrlResponse,
};
use linkbox_api::{ApiError, ByteRange, Remote};
use linkbox_backend::{LinkboxFs, Options};
use linkbox_common::ByteReader;
use linkbox_storage::{
    ObjectStoreClient, ObjectStoreFactory, PartRecord, TransferError, UploadSession,
};

const ACCOUNT_TOKEN: &str = "account-token";

#[derive(Clone)]
struct FakeEntry {
    id: i64,
    pid: i64,
    item_id: String,
    name: String,
    kind: String,
    content: Vec<u8>,
    ctime: i64,
}

impl FakeEntry {
    fn to_entity(&self) -> Entity {
        Entity {
            kind: self.kind.clone(),
            sub_type: String::new(),
            name: self.name.clone(),
            url: if self.kind == "file" {
                format!("fake://item/{}", self.id)
            } else {
                String::new()
            },
            ctime: self.ctime,
            size: self.content.len() as i64,
            id: self.id,
            pid: self.pid,
            item_id: self.item_id.clone(),
        }
    }
}

struct Account {
    email: String,
    password: String,
    size_cap: i64,
    size_curr: i64,
}

#[derive(Default)]
struct State {
    next_id: i64,
    entries: Vec<FakeEntry>,
    /// Content the server already knows, keyed by vgroup.
    vgroup_content: HashMap<String, Vec<u8>>,
    /// Bytes PUT to a signed URL, awaiting their bind call.
    pending_signed: HashMap<String, Vec<u8>>,
    /// Assembled multipart objects, keyed by pool path.
    pool_objects: HashMap<String, Vec<u8>>,
}

pub struct FakeRemote {
    state: Mutex<State>,
    calls: Mutex<Vec<String>>,
    account: Mutex<Option<Account>>,
    /// Remaining searches that must come back empty.
    blackout: AtomicU32,
    /// Blackout installed after every bind, emulating search lag.
    bind_blackout: AtomicU32,
    /// Blackout installed after every rename/move, emulating search lag.
    mutation_blackout: AtomicU32,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                next_id: 1,
                ..Default::default()
            }),
            calls: Mutex::new(Vec::new()),
            account: Mutex::new(None),
            blackout: AtomicU32::new(0),
            bind_blackout: AtomicU32::new(0),
            mutation_blackout: AtomicU32::new(0),
        })
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    /// Make every search after a bind return empty `times` times.
    pub fn set_bind_blackout(&self, times: u32) {
        self.bind_blackout.store(times, Ordering::SeqCst);
    }

    /// Make every search after a rename or move return empty `times` times.
    pub fn set_mutation_blackout(&self, times: u32) {
        self.mutation_blackout.store(times, Ordering::SeqCst);
    }

    fn arm_mutation_lag(&self) {
        let lag: u32 = self.mutation_blackout.load(Ordering::SeqCst);
        if lag > 0 {
            self.blackout.store(lag, Ordering::SeqCst);
        }
    }

    pub fn set_account(&self, email: &str, password: &str, size_cap: i64, size_curr: i64) {
        *self.account.lock().unwrap() = Some(Account {
            email: email.to_string(),
            password: password.to_string(),
            size_cap,
            size_curr,
        });
    }

    pub fn add_dir(&self, pid: i64, name: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id: i64 = state.next_id;
        state.next_id += 1;
        state.entries.push(FakeEntry {
            id,
            pid,
            item_id: String::new(),
            name: name.to_string(),
            kind: "dir".to_string(),
            content: Vec::new(),
            ctime: 1_700_000_000 + id,
        });
        id
    }

    pub fn add_file(&self, pid: i64, name: &str, content: Vec<u8>) -> i64 {
        let mut state = self.state.lock().unwrap();
        Self::insert_file(&mut state, pid, name, content).0
    }

    fn insert_file(state: &mut State, pid: i64, name: &str, content: Vec<u8>) -> (i64, String) {
        let id: i64 = state.next_id;
        state.next_id += 1;
        let item_id: String = format!("it_{id}");
        state.entries.push(FakeEntry {
            id,
            pid,
            item_id: item_id.clone(),
            name: name.to_string(),
            kind: "file".to_string(),
            content,
            ctime: 1_700_000_000 + id,
        });
        (id, item_id)
    }

    /// Store an assembled multipart object (called by the mock store).
    pub fn put_pool_object(&self, key: &str, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .pool_objects
            .insert(key.to_string(), bytes);
    }

    fn bind_entry(&self, vgroup: &str, content: Vec<u8>, pid: i64, name: &str) -> BindResponse {
        let item_id: String = {
            let mut state = self.state.lock().unwrap();
            state
                .vgroup_content
                .insert(vgroup.to_string(), content.clone());
            Self::insert_file(&mut state, pid, name, content).1
        };
        self.blackout
            .store(self.bind_blackout.load(Ordering::SeqCst), Ordering::SeqCst);
        BindResponse {
            data: ItemData { item_id },
            status: 1,
            msg: "ok".to_string(),
        }
    }

    fn subtree_ids(entries: &[FakeEntry], root: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = vec![root];
        let mut frontier: Vec<i64> = vec![root];
        while let Some(current) = frontier.pop() {
            for entry in entries.iter().filter(|e| e.pid == current) {
                ids.push(entry.id);
                frontier.push(entry.id);
            }
        }
        ids
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn file_search(
        &self,
        name: &str,
        pid: i64,
        page_no: u32,
        page_size: u32,
    ) -> Result<FileSearchResponse, ApiError> {
        self.log(format!("file_search(name={name}, pid={pid}, page={page_no})"));

        if self.blackout.load(Ordering::SeqCst) > 0 {
            self.blackout.fetch_sub(1, Ordering::SeqCst);
            return Ok(FileSearchResponse {
                data: SearchData::default(),
                status: 1,
                msg: "ok".to_string(),
            });
        }

        let state = self.state.lock().unwrap();
        // With a filter the real server matches the substring across every
        // directory; without one it lists the requested parent.
        let matched: Vec<Entity> = if name.is_empty() {
            state
                .entries
                .iter()
                .filter(|e| e.pid == pid)
                .map(FakeEntry::to_entity)
                .collect()
        } else {
            state
                .entries
                .iter()
                .filter(|e| e.name.contains(name))
                .map(FakeEntry::to_entity)
                .collect()
        };

        let start: usize = ((page_no - 1) * page_size) as usize;
        let page: Vec<Entity> = matched
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(FileSearchResponse {
            data: SearchData { entities: page },
            status: 1,
            msg: "ok".to_string(),
        })
    }

    async fn folder_create(&self, name: &str, pid: i64) -> Result<FolderCreateResponse, ApiError> {
        self.log(format!("folder_create({name}, pid={pid})"));
        let mut state = self.state.lock().unwrap();
        if state
            .entries
            .iter()
            .any(|e| e.pid == pid && e.name == name && e.kind == "dir")
        {
            return Ok(FolderCreateResponse {
                data: FolderCreateData::default(),
                status: 1501,
                msg: "dir exist".to_string(),
            });
        }
        let id: i64 = state.next_id;
        state.next_id += 1;
        state.entries.push(FakeEntry {
            id,
            pid,
            item_id: String::new(),
            name: name.to_string(),
            kind: "dir".to_string(),
            content: Vec::new(),
            ctime: 1_700_000_000 + id,
        });
        Ok(FolderCreateResponse {
            data: FolderCreateData { dir_id: id },
            status: 1,
            msg: "ok".to_string(),
        })
    }

    async fn folder_delete(&self, dir_id: i64) -> Result<CommonResponse, ApiError> {
        self.log(format!("folder_delete({dir_id})"));
        let mut state = self.state.lock().unwrap();
        let doomed: Vec<i64> = Self::subtree_ids(&state.entries, dir_id);
        state.entries.retain(|e| !doomed.contains(&e.id));
        Ok(CommonResponse {
            status: 1,
            msg: "ok".to_string(),
        })
    }

    async fn folder_rename(&self, dir_id: i64, name: &str) -> Result<CommonResponse, ApiError> {
        self.log(format!("folder_rename({dir_id}, {name})"));
        let mut state = self.state.lock().unwrap();
        match state.entries.iter_mut().find(|e| e.id == dir_id) {
            Some(entry) => {
                entry.name = name.to_string();
                self.arm_mutation_lag();
                Ok(CommonResponse {
                    status: 1,
                    msg: "ok".to_string(),
                })
            }
            None => Ok(CommonResponse {
                status: 0,
                msg: "no such dir".to_string(),
            }),
        }
    }

    async fn folder_move(&self, dir_id: i64, new_pid: i64) -> Result<CommonResponse, ApiError> {
        self.log(format!("folder_move({dir_id}, pid={new_pid})"));
        let mut state = self.state.lock().unwrap();
        match state.entries.iter_mut().find(|e| e.id == dir_id) {
            Some(entry) => {
                entry.pid = new_pid;
                self.arm_mutation_lag();
                Ok(CommonResponse {
                    status: 1,
                    msg: "ok".to_string(),
                })
            }
            None => Ok(CommonResponse {
                status: 0,
                msg: "no such dir".to_string(),
            }),
        }
    }

    async fn file_rename(&self, item_id: &str, name: &str) -> Result<CommonResponse, ApiError> {
        self.log(format!("file_rename({item_id}, {name})"));
        let mut state = self.state.lock().unwrap();
        match state.entries.iter_mut().find(|e| e.item_id == item_id) {
            Some(entry) => {
                entry.name = name.to_string();
                self.arm_mutation_lag();
                Ok(CommonResponse {
                    status: 1,
                    msg: "ok".to_string(),
                })
            }
            None => Ok(CommonResponse {
                status: 0,
                msg: "no such item".to_string(),
            }),
        }
    }

    async fn file_move(&self, item_id: &str, new_pid: i64) -> Result<CommonResponse, ApiError> {
        self.log(format!("file_move({item_id}, pid={new_pid})"));
        let mut state = self.state.lock().unwrap();
        match state.entries.iter_mut().find(|e| e.item_id == item_id) {
            Some(entry) => {
                entry.pid = new_pid;
                self.arm_mutation_lag();
                Ok(CommonResponse {
                    status: 1,
                    msg: "ok".to_string(),
                })
            }
            None => Ok(CommonResponse {
                status: 0,
                msg: "no such item".to_string(),
            }),
        }
    }

    async fn file_delete(&self, item_id: &str) -> Result<CommonResponse, ApiError> {
        self.log(format!("file_delete({item_id})"));
        let mut state = self.state.lock().unwrap();
        state.entries.retain(|e| e.item_id != item_id);
        Ok(CommonResponse {
            status: 1,
            msg: "ok".to_string(),
        })
    }

    async fn upload_url(&self, prefix_md5: &str, size: u64) -> Result<UploadUrlResponse, ApiError> {
        self.log(format!("upload_url({prefix_md5}, {size})"));
        let vgroup: String = format!("{prefix_md5}_{size}");
        let state = self.state.lock().unwrap();
        if state.vgroup_content.contains_key(&vgroup) {
            return Ok(UploadUrlResponse {
                data: UploadUrlData::default(),
                status: 600,
                msg: "file exist".to_string(),
            });
        }
        Ok(UploadUrlResponse {
            data: UploadUrlData {
                sign_url: format!("signed://{vgroup}"),
            },
            status: 1,
            msg: "ok".to_string(),
        })
    }

    async fn bind_upload(
        &self,
        prefix_md5: &str,
        size: u64,
        pid: i64,
        name: &str,
    ) -> Result<BindResponse, ApiError> {
        self.log(format!("bind_upload({name}, pid={pid})"));
        let vgroup: String = format!("{prefix_md5}_{size}");
        let content: Option<Vec<u8>> = {
            let mut state = self.state.lock().unwrap();
            state
                .pending_signed
                .remove(&format!("signed://{vgroup}"))
                .or_else(|| state.vgroup_content.get(&vgroup).cloned())
        };
        match content {
            Some(content) => Ok(self.bind_entry(&vgroup, content, pid, name)),
            None => Ok(BindResponse {
                data: ItemData::default(),
                status: 0,
                msg: "no content for vgroup".to_string(),
            }),
        }
    }

    async fn upload_session(&self, vgroup: &str) -> Result<UploadSessionResponse, ApiError> {
        self.log(format!("upload_session({vgroup})"));
        let state = self.state.lock().unwrap();
        if state.vgroup_content.contains_key(vgroup) {
            return Ok(UploadSessionResponse {
                data: UploadSessionData::default(),
                status: 600,
                msg: "file exist".to_string(),
            });
        }
        Ok(UploadSessionResponse {
            data: UploadSessionData {
                access_key: "ak".to_string(),
                secret_key: "sk".to_string(),
                security_token: "st".to_string(),
                server: "https://obs.fake".to_string(),
                bucket: "fake-bucket".to_string(),
                pool_path: format!("pool/{vgroup}"),
            },
            status: 1,
            msg: "ok".to_string(),
        })
    }

    async fn create_item(
        &self,
        vgroup: &str,
        pid: i64,
        name: &str,
    ) -> Result<BindResponse, ApiError> {
        self.log(format!("create_item({name}, pid={pid})"));
        let content: Option<Vec<u8>> = {
            let mut state = self.state.lock().unwrap();
            state
                .pool_objects
                .remove(&format!("pool/{vgroup}"))
                .or_else(|| state.vgroup_content.get(vgroup).cloned())
        };
        match content {
            Some(content) => Ok(self.bind_entry(vgroup, content, pid, name)),
            None => Ok(BindResponse {
                data: ItemData::default(),
                status: 0,
                msg: "no content for vgroup".to_string(),
            }),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.log(format!("login({email})"));
        let account = self.account.lock().unwrap();
        match account.as_ref() {
            Some(acct) if acct.email == email && acct.password == password => Ok(LoginResponse {
                data: LoginData {
                    token: ACCOUNT_TOKEN.to_string(),
                    user_info: LoginUserInfo {
                        size_cap: acct.size_cap,
                        size_curr: acct.size_curr,
                    },
                },
                status: 1,
                msg: "ok".to_string(),
            }),
            _ => Ok(LoginResponse {
                data: LoginData::default(),
                status: 0,
                msg: "invalid credentials".to_string(),
            }),
        }
    }

    async fn upload_signed(&self, url: &str, size: u64, body: ByteReader) -> Result<(), ApiError> {
        self.log(format!("upload_signed({url})"));
        let mut body = body;
        let mut bytes: Vec<u8> = Vec::new();
        body.read_to_end(&mut bytes)
            .await
            .map_err(|e| ApiError::transport(e.to_string(), false))?;
        if bytes.len() as u64 != size {
            return Err(ApiError::transport(
                format!("body length {} != declared {size}", bytes.len()),
                false,
            ));
        }
        self.state
            .lock()
            .unwrap()
            .pending_signed
            .insert(url.to_string(), bytes);
        Ok(())
    }

    async fn download(&self, url: &str, range: Option<ByteRange>) -> Result<ByteReader, ApiError> {
        match range {
            Some(range) => self.log(format!("download({url}, {}-{})", range.start, range.end)),
            None => self.log(format!("download({url}, full)")),
        }

        let id: i64 = url
            .strip_prefix("fake://item/")
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| ApiError::transport(format!("unknown url {url}"), false))?;

        let state = self.state.lock().unwrap();
        let entry: &FakeEntry = state
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| ApiError::transport(format!("no entity for {url}"), false))?;

        let bytes: Vec<u8> = match range {
            Some(range) => {
                let len: u64 = entry.content.len() as u64;
                if range.start >= len {
                    Vec::new()
                } else {
                    let end: usize = range.end.min(len - 1) as usize;
                    entry.content[range.start as usize..=end].to_vec()
                }
            }
            None => entry.content.clone(),
        };
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }
}

/// Object store that routes assembled uploads back into the fake remote.
pub struct MockObjectStore {
    remote: Arc<FakeRemote>,
    key: String,
    parts: Mutex<Vec<(i32, Bytes)>>,
}

#[async_trait]
impl ObjectStoreClient for MockObjectStore {
    async fn initiate_multipart(&self, _bucket: &str, _key: &str) -> Result<String, TransferError> {
        Ok("upload-1".to_string())
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        part_number: i32,
        _content_md5: Option<String>,
        body: Bytes,
    ) -> Result<String, TransferError> {
        self.parts.lock().unwrap().push((part_number, body));
        Ok(format!("etag-{part_number}"))
    }

    async fn complete_multipart(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        parts: Vec<PartRecord>,
    ) -> Result<(), TransferError> {
        for window in parts.windows(2) {
            if window[1].part_number <= window[0].part_number {
                return Err(TransferError::Store {
                    message: "parts not in ascending order".to_string(),
                });
            }
        }

        let mut recorded: Vec<(i32, Bytes)> = self.parts.lock().unwrap().clone();
        recorded.sort_by_key(|(number, _)| *number);
        let mut assembled: Vec<u8> = Vec::new();
        for (_, body) in recorded {
            assembled.extend_from_slice(&body);
        }
        self.remote.put_pool_object(&self.key, assembled);
        Ok(())
    }
}

pub struct MockStoreFactory {
    pub remote: Arc<FakeRemote>,
}

#[async_trait]
impl ObjectStoreFactory for MockStoreFactory {
    async fn connect(
        &self,
        session: &UploadSession,
    ) -> Result<Arc<dyn ObjectStoreClient>, TransferError> {
        Ok(Arc::new(MockObjectStore {
            remote: Arc::clone(&self.remote),
            key: session.pool_path.clone(),
            parts: Mutex::new(Vec::new()),
        }))
    }
}

/// Options for a single-PUT-only filesystem (no account configured).
pub fn basic_options() -> Options {
    Options::with_token("test-token")
}

/// Options with an account, enabling the multipart upload path.
pub fn account_options(part_size: u64, tx_concurrency: usize) -> Options {
    let mut options: Options = Options::with_token("test-token");
    options.email = Some("user@example.com".to_string());
    options.password = Some("secret".to_string());
    options.multipart_tx_part_size = part_size;
    options.multipart_tx_concurrency = tx_concurrency;
    options
}

/// Build a filesystem over the fake remote, rooted at the account root.
pub async fn test_fs(fake: Arc<FakeRemote>, options: Options) -> LinkboxFs {
    let factory = Arc::new(MockStoreFactory {
        remote: Arc::clone(&fake),
    });
    LinkboxFs::with_remote("", options, fake, factory)
        .await
        .expect("filesystem construction")
}
