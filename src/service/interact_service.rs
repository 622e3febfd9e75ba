//! Interactive inference service
//!
//! Owns one dispatcher per endpoint and binds each to the checkpoint it
//! loads on initialization. Dispatch runs on the blocking pool because both
//! construction and inference are CPU bound.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::config::CheckpointConfig;
use crate::dispatch::{DispatchError, Dispatcher, NoArgs, Reply, Request};
use crate::engine::processor::{self, CoreConfig, Network};
use crate::engine::strokes::{self, DEFAULT_IGNORE_CLASS};
use crate::engine::{clicks, ClickController, InferenceCore, ModelLoader, StrokeController};

use super::types::{HandleStatus, HealthResult};

/// Handle name of the segmentation core
pub const NETWORK: &str = "network";
/// Handle name of the stroke-to-mask controller
pub const S2M: &str = "s2m";
/// Handle name of the click controller
pub const FBRS: &str = "fbrs";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessorInit {
    #[serde(default)]
    config: CoreConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrokeInit {
    #[serde(default = "default_num_objects")]
    num_objects: usize,
    #[serde(default = "default_ignore_class")]
    ignore_class: u32,
}

fn default_num_objects() -> usize {
    1
}

fn default_ignore_class() -> u32 {
    DEFAULT_IGNORE_CLASS
}

pub struct InteractService {
    processor: Arc<Dispatcher<InferenceCore>>,
    strokes: Arc<Dispatcher<StrokeController>>,
    clicks: Arc<Dispatcher<ClickController>>,
}

impl InteractService {
    /// Create the service. Nothing is loaded until a handle is initialized.
    pub fn new(checkpoints: &CheckpointConfig, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        let network_path = checkpoints.network.clone();
        let network_loader = loader.clone();
        let processor = Dispatcher::new(NETWORK, processor::methods(), move |p: ProcessorInit| {
            let model = network_loader.load(&network_path)?;
            Ok(InferenceCore::new(Network::new(model, network_path.clone()), p.config))
        })?;

        let s2m_path = checkpoints.s2m.clone();
        let s2m_loader = loader.clone();
        let strokes = Dispatcher::new(S2M, strokes::methods(), move |p: StrokeInit| {
            let model = match s2m_path.as_deref() {
                Some(path) => Some(s2m_loader.load(path)?),
                None => {
                    info!("No stroke-to-mask checkpoint configured; strokes are disabled");
                    None
                }
            };
            Ok(StrokeController::new(model, p.num_objects, p.ignore_class))
        })?;

        let fbrs_path = checkpoints.fbrs.clone();
        let clicks = Dispatcher::new(FBRS, clicks::methods(), move |_: NoArgs| {
            Ok(ClickController::new(loader.load(&fbrs_path)?))
        })?;

        Ok(Self {
            processor: Arc::new(processor),
            strokes: Arc::new(strokes),
            clicks: Arc::new(clicks),
        })
    }

    /// Processor endpoint; serves attribute reads
    pub async fn network(&self, request: Request) -> Result<Reply, DispatchError> {
        let dispatcher = self.processor.clone();
        run_blocking(NETWORK, request, move |r| dispatcher.dispatch_with_reads(r)).await
    }

    /// Stroke-to-mask endpoint
    pub async fn s2m(&self, request: Request) -> Result<Reply, DispatchError> {
        let dispatcher = self.strokes.clone();
        run_blocking(S2M, request, move |r| dispatcher.dispatch(r)).await
    }

    /// Click refinement endpoint
    pub async fn fbrs(&self, request: Request) -> Result<Reply, DispatchError> {
        let dispatcher = self.clicks.clone();
        run_blocking(FBRS, request, move |r| dispatcher.dispatch(r)).await
    }

    pub fn health(&self) -> HealthResult {
        let mut handles = HashMap::new();
        handles.insert(NETWORK.to_string(), status(&self.processor));
        handles.insert(S2M.to_string(), status(&self.strokes));
        handles.insert(FBRS.to_string(), status(&self.clicks));

        HealthResult {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            handles,
        }
    }
}

fn status<T: Send + 'static>(dispatcher: &Dispatcher<T>) -> HandleStatus {
    HandleStatus {
        initialized: dispatcher.is_initialized(),
        methods: dispatcher.methods().into_iter().map(String::from).collect(),
    }
}

/// Run a dispatch on the blocking pool. A panicking handler becomes an
/// invocation fault.
async fn run_blocking<F>(handle: &'static str, request: Request, f: F) -> Result<Reply, DispatchError>
where
    F: FnOnce(Request) -> Result<Reply, DispatchError> + Send + 'static,
{
    let method = request.name().to_string();
    tokio::task::spawn_blocking(move || f(request))
        .await
        .map_err(|e| DispatchError::Invocation {
            handle,
            method,
            source: anyhow::anyhow!("worker task failed: {}", e),
        })?
}
