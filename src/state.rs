use std::sync::Arc;

use crate::inference::Classifier;
use crate::labels::ClassLabels;
use crate::preprocess::{ChannelOrder, InputShape};
use crate::store::BlobStore;

pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// One servable model: its route name, output labels, input size and network.
#[derive(Clone)]
pub struct ModelEndpoint {
    pub name: String,
    pub labels: ClassLabels,
    pub shape: InputShape,
    pub classifier: Arc<dyn Classifier>,
}

impl std::fmt::Debug for ModelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEndpoint")
            .field("name", &self.name)
            .field("classes", &self.labels.len())
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Read-only state built once at startup and shared by every worker.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The first endpoint also serves database lookups.
    pub endpoints: Vec<ModelEndpoint>,
    pub store: Option<BlobStore>,
    pub channel_order: ChannelOrder,
    pub public_url: String,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(endpoints: Vec<ModelEndpoint>, public_url: impl Into<String>) -> Self {
        Self {
            endpoints,
            store: None,
            channel_order: ChannelOrder::default(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_store(mut self, store: BlobStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn primary(&self) -> Option<&ModelEndpoint> {
        self.endpoints.first()
    }
}
