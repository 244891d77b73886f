use std::rc::Rc;

use foundation::bounds::Aabb2;
use foundation::ids::LayerKey;
use futures_util::future::join_all;
use layers::filter::Filter;
use tracing::{debug, info, warn};

use crate::protocol::{FeatureProtocol, FeatureQuery, HitCount, ProtocolError};

pub const DEFAULT_MAX_FEATURES: u64 = 500;

/// One visible, time-enabled layer taking part in a gate pass.
#[derive(Clone)]
pub struct GateRequest {
    pub key: LayerKey,
    pub protocol: Rc<dyn FeatureProtocol>,
    pub filter: Option<Filter>,
    pub bbox: Option<Aabb2>,
}

impl std::fmt::Debug for GateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateRequest")
            .field("key", &self.key)
            .field("filter", &self.filter)
            .field("bbox", &self.bbox)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Total within the threshold; every layer may be fetched.
    Accept { total: u64 },
    /// Policy rejection: too many features for the current view.
    Overflow { total: u64, max: u64 },
    /// A count failed or came back non-numeric.
    Failed { key: LayerKey, error: ProtocolError },
}

/// Counts matching features across layers before committing to a fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HitCountGate {
    max_features: u64,
}

impl Default for HitCountGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FEATURES)
    }
}

impl HitCountGate {
    pub fn new(max_features: u64) -> Self {
        Self { max_features }
    }

    pub fn max_features(&self) -> u64 {
        self.max_features
    }

    /// Issue every count at once and decide only after all have resolved.
    pub async fn evaluate(&self, requests: &[GateRequest]) -> GateDecision {
        let counts = join_all(requests.iter().map(|r| {
            let query = FeatureQuery::hits(r.filter.clone(), r.bbox);
            async move { (r.key.clone(), r.protocol.count(query).await) }
        }))
        .await;
        self.decide(counts)
    }

    /// Decide from fully resolved per-layer counts.
    pub fn decide(&self, counts: Vec<(LayerKey, Result<HitCount, ProtocolError>)>) -> GateDecision {
        let mut total: u64 = 0;
        for (key, result) in counts {
            let n = match result {
                Ok(hits) => match hits.number_of_features() {
                    Some(n) => n,
                    None => {
                        let error = ProtocolError::NonNumericCount {
                            found: hits.0.to_string(),
                        };
                        warn!(layer = %key, %error, "hit count rejected");
                        return GateDecision::Failed { key, error };
                    }
                },
                Err(error) => {
                    warn!(layer = %key, %error, "hit count request failed");
                    return GateDecision::Failed { key, error };
                }
            };
            debug!(layer = %key, hits = n, "layer hit count");
            total = total.saturating_add(n);
        }

        if total <= self.max_features {
            info!(total, max = self.max_features, "hit-count gate accepted");
            GateDecision::Accept { total }
        } else {
            info!(total, max = self.max_features, "hit-count gate rejected");
            GateDecision::Overflow {
                total,
                max: self.max_features,
            }
        }
    }
}
