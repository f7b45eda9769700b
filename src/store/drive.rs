//! Google Drive context store — REST v3 API over reqwest.
//!
//! The store is addressed by a folder ID the user shares with the
//! companion's service account. Documents are plain text files inside
//! that folder; every write replaces the full file content.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::StoreError;
use crate::store::{documents, ContextStore, RootId};

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Name of the throwaway file used to probe write access during
/// `ensure_root`.
const PROBE_FILE: &str = "companion_write_probe.md";

/// Google Drive-backed context store.
pub struct DriveStore {
    client: reqwest::Client,
    access_token: SecretString,
}

#[derive(Debug, serde::Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, serde::Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

impl DriveStore {
    pub fn new(access_token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
        }
    }

    /// Build a store from `GOOGLE_DRIVE_TOKEN`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var("GOOGLE_DRIVE_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(|t| Self::new(SecretString::from(t)))
    }

    fn folder_query(folder_id: &str) -> String {
        format!("'{folder_id}' in parents and trashed = false")
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>, StoreError> {
        let resp = self
            .client
            .get(FILES_URL)
            .bearer_auth(self.access_token.expose_secret())
            .query(&[
                ("q", Self::folder_query(folder_id).as_str()),
                ("fields", "files(id, name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(|e| unavailable("list", e))?;

        if !resp.status().is_success() {
            return Err(StoreError::Http(format!(
                "files.list returned {}",
                resp.status()
            )));
        }

        let list: FileList = resp.json().await.map_err(|e| unavailable("list", e))?;
        Ok(list.files)
    }

    async fn find_file(&self, folder_id: &str, name: &str) -> Result<Option<String>, StoreError> {
        let files = self.list_folder(folder_id).await?;
        Ok(files.into_iter().find(|f| f.name == name).map(|f| f.id))
    }

    async fn download(&self, file_id: &str) -> Result<String, StoreError> {
        let resp = self
            .client
            .get(format!("{FILES_URL}/{file_id}"))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(|e| unavailable("get", e))?;

        if !resp.status().is_success() {
            return Err(StoreError::Http(format!(
                "files.get returned {}",
                resp.status()
            )));
        }

        resp.text().await.map_err(|e| unavailable("get", e))
    }

    /// Create an empty file in the folder, returning its ID.
    async fn create_file(&self, folder_id: &str, name: &str) -> Result<String, StoreError> {
        let resp = self
            .client
            .post(FILES_URL)
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&serde_json::json!({
                "name": name,
                "mimeType": "text/markdown",
                "parents": [folder_id],
            }))
            .send()
            .await
            .map_err(|e| unavailable("create", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(StoreError::Http(format!(
                "files.create returned {status}: {detail}"
            )));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| unavailable("create", e))?;
        body.get("id")
            .and_then(|id| id.as_str())
            .map(String::from)
            .ok_or_else(|| StoreError::Http("files.create response missing id".into()))
    }

    /// Replace a file's full content.
    async fn upload_content(&self, file_id: &str, content: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .patch(format!("{UPLOAD_URL}/{file_id}"))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("uploadType", "media"), ("supportsAllDrives", "true")])
            .header(reqwest::header::CONTENT_TYPE, "text/markdown")
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| unavailable("put", e))?;

        if !resp.status().is_success() {
            return Err(StoreError::Http(format!(
                "files.update returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .delete(format!("{FILES_URL}/{file_id}"))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await
            .map_err(|e| unavailable("delete", e))?;

        if !resp.status().is_success() {
            return Err(StoreError::Http(format!(
                "files.delete returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

fn unavailable(operation: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable {
        operation: operation.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ContextStore for DriveStore {
    async fn get(&self, root: &RootId, name: &str) -> Result<Option<String>, StoreError> {
        match self.find_file(root.as_str(), name).await? {
            Some(file_id) => Ok(Some(self.download(&file_id).await?)),
            None => Ok(None),
        }
    }

    async fn put(&self, root: &RootId, name: &str, text: &str) -> Result<(), StoreError> {
        let file_id = match self.find_file(root.as_str(), name).await? {
            Some(id) => id,
            None => self.create_file(root.as_str(), name).await?,
        };
        self.upload_content(&file_id, text).await
    }

    async fn list(&self, root: &RootId) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .list_folder(root.as_str())
            .await?
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn ensure_root(&self, candidate: &str) -> Result<RootId, StoreError> {
        let candidate = candidate.trim();
        if candidate.is_empty() || candidate.contains('\'') {
            return Err(StoreError::RootInvalid {
                candidate: candidate.into(),
                reason: "not a folder ID".into(),
            });
        }

        // Reachable?
        let files = self.list_folder(candidate).await.map_err(|e| {
            StoreError::RootInvalid {
                candidate: candidate.into(),
                reason: format!("folder not accessible: {e}"),
            }
        })?;

        // Writable? Probe with a throwaway file.
        match self.create_file(candidate, PROBE_FILE).await {
            Ok(probe_id) => {
                if let Err(e) = self.delete_file(&probe_id).await {
                    tracing::warn!(error = %e, "could not delete write probe file");
                }
                Ok(RootId::new(candidate))
            }
            Err(create_err) => {
                // Service accounts cannot create files in personal Drives
                // (storage quota). If the user pre-created the three
                // documents, updates still work, so the root is usable.
                let all_present = documents::ALL
                    .iter()
                    .all(|doc| files.iter().any(|f| f.name == *doc));
                if all_present {
                    tracing::info!(
                        folder = candidate,
                        "write probe failed but all documents pre-exist; accepting root"
                    );
                    Ok(RootId::new(candidate))
                } else {
                    Err(StoreError::RootInvalid {
                        candidate: candidate.into(),
                        reason: format!(
                            "folder is not writable and is missing pre-created documents: {create_err}"
                        ),
                    })
                }
            }
        }
    }
}
