use std::rc::Rc;

use foundation::bounds::Aabb2;
use foundation::ids::LayerKey;
use futures_util::future::join_all;
use layers::feature::Feature;
use layers::filter::Filter;
use tracing::{debug, warn};

use crate::gate::{GateDecision, GateRequest, HitCountGate};
use crate::protocol::{FeatureProtocol, FeatureQuery, ProtocolError};

/// Everything needed to count and then fetch one layer.
#[derive(Clone)]
pub struct LayerLoad {
    pub key: LayerKey,
    pub protocol: Rc<dyn FeatureProtocol>,
    pub filter: Option<Filter>,
    /// Viewport box used for the hits pre-check.
    pub count_bbox: Option<Aabb2>,
    /// Loading-strategy box used for the full fetch.
    pub fetch_bbox: Option<Aabb2>,
    pub property_names: Vec<String>,
}

impl std::fmt::Debug for LayerLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerLoad")
            .field("key", &self.key)
            .field("filter", &self.filter)
            .field("count_bbox", &self.count_bbox)
            .field("fetch_bbox", &self.fetch_bbox)
            .field("property_names", &self.property_names)
            .finish_non_exhaustive()
    }
}

impl LayerLoad {
    fn gate_request(&self) -> GateRequest {
        GateRequest {
            key: self.key.clone(),
            protocol: Rc::clone(&self.protocol),
            filter: self.filter.clone(),
            bbox: self.count_bbox,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Loaded {
        total: u64,
        features: Vec<(LayerKey, Vec<Feature>)>,
    },
    Overflow {
        total: u64,
        max: u64,
    },
    Failed {
        key: LayerKey,
        error: ProtocolError,
    },
}

/// Gate, then fetch every layer. Fetches start only once the gate has seen
/// every count; a failed fetch fails the whole pass.
pub async fn run_pipeline(gate: &HitCountGate, loads: &[LayerLoad]) -> PipelineOutcome {
    let requests: Vec<GateRequest> = loads.iter().map(LayerLoad::gate_request).collect();
    let total = match gate.evaluate(&requests).await {
        GateDecision::Accept { total } => total,
        GateDecision::Overflow { total, max } => return PipelineOutcome::Overflow { total, max },
        GateDecision::Failed { key, error } => return PipelineOutcome::Failed { key, error },
    };

    let results = join_all(loads.iter().map(|l| {
        let query = FeatureQuery::results(l.filter.clone(), l.fetch_bbox, l.property_names.clone());
        async move { (l.key.clone(), l.protocol.fetch(query).await) }
    }))
    .await;

    let mut features = Vec::with_capacity(results.len());
    for (key, result) in results {
        match result {
            Ok(batch) => {
                debug!(layer = %key, features = batch.len(), "fetched layer");
                features.push((key, batch));
            }
            Err(error) => {
                warn!(layer = %key, %error, "feature fetch failed");
                return PipelineOutcome::Failed { key, error };
            }
        }
    }
    PipelineOutcome::Loaded { total, features }
}
