//! Synchronous front end to [`StacClient`] for the CLI and the export task.

use tokio::runtime::{Builder, Runtime};

use crate::error::{CloudError, Result};
use crate::stac_client::{StacCatalog, StacClient, StacClientOptions};
use crate::stac_models::{StacItem, StacItemCollection, StacSearchParams};

/// [`StacClient`] driven by its own current-thread runtime. Must not be
/// used from inside another Tokio runtime.
pub struct StacClientBlocking {
    client: StacClient,
    runtime: Runtime,
}

impl StacClientBlocking {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CloudError::Network(format!("failed to start runtime: {e}")))?;
        Ok(Self {
            client: StacClient::new(catalog, options)?,
            runtime,
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        self.client.catalog()
    }

    pub fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        self.runtime.block_on(self.client.search(params))
    }

    /// Every page, up to the client's `max_items`
    pub fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        self.runtime.block_on(self.client.search_all(params))
    }

    pub fn sign_asset_hrefs(&self, hrefs: &[String]) -> Result<Vec<String>> {
        self.runtime.block_on(self.client.sign_asset_hrefs(hrefs))
    }
}
