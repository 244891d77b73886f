use foundation::ids::LayerKey;
use layers::attributes::MissingAttribute;
use layers::style::StyleError;
use streaming::protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] ProtocolError),
    #[error("layer {key} cannot be synchronized: {source}")]
    MissingAttribute {
        key: LayerKey,
        #[source]
        source: MissingAttribute,
    },
    #[error("unknown layer {0}")]
    UnknownLayer(LayerKey),
    #[error("synchronizer is not bound")]
    NotBound,
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
