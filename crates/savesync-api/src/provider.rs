//! ApiCloudStore - ICloudStore implementation over the save store HTTP API
//!
//! Wraps the [`SaveApiClient`] and delegates to the listing, transfer and
//! link modules to fulfil the [`ICloudStore`] port contract.
//!
//! ## Design Notes
//!
//! - The credential lives inside the client behind a `RwLock`, so every port
//!   method can take `&self`.
//! - [`ApiError`](crate::ApiError) is converted to `SyncError` at this
//!   boundary and nowhere else.

use std::path::{Path, PathBuf};

use reqwest::Method;
use savesync_core::domain::{Credential, FlowId, SaveId, SaveItem, SyncError};
use savesync_core::ports::{ICloudStore, LinkInitiation, LinkStatus, ProgressFn};
use tracing::{debug, info};

use crate::client::SaveApiClient;
use crate::{link, listing, transfer};

/// Remote save store adapter
pub struct ApiCloudStore {
    client: SaveApiClient,
}

impl ApiCloudStore {
    pub fn new(client: SaveApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SaveApiClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl ICloudStore for ApiCloudStore {
    fn set_credential(&self, credential: Option<Credential>) {
        self.client.set_credential(credential);
    }

    fn has_credential(&self) -> bool {
        self.client.has_credential()
    }

    async fn list(&self) -> Result<Vec<SaveItem>, SyncError> {
        let value = self.client.get_json("/list").await?;
        let items = listing::parse_save_list(&value);
        debug!(count = items.len(), "Listed remote saves");
        Ok(items)
    }

    async fn names(&self) -> Result<Vec<String>, SyncError> {
        let value = self.client.get_json("/names").await?;
        Ok(listing::parse_names(&value)?)
    }

    async fn delete(&self, id: &SaveId) -> Result<(), SyncError> {
        let builder = self.client.request(Method::DELETE, &format!("/delete/{}", id))?;
        self.client.send_json(builder).await?;
        info!(%id, "Deleted remote save");
        Ok(())
    }

    async fn upload(
        &self,
        world_name: &str,
        archive: &Path,
        progress: ProgressFn,
    ) -> Result<(), SyncError> {
        Ok(transfer::upload(&self.client, world_name, archive, progress).await?)
    }

    async fn download(
        &self,
        id: &SaveId,
        dest_dir: &Path,
        progress: ProgressFn,
    ) -> Result<PathBuf, SyncError> {
        Ok(transfer::download(&self.client, id, dest_dir, progress).await?)
    }

    async fn initiate_link(&self) -> Result<LinkInitiation, SyncError> {
        Ok(link::initiate_link(&self.client).await?)
    }

    async fn poll_link(&self, flow_id: &FlowId) -> Result<LinkStatus, SyncError> {
        Ok(link::poll_link(&self.client, flow_id).await?)
    }
}
