pub mod bounds;
pub mod future;
pub mod ids;
pub mod precision;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use future::*;
pub use ids::*;
pub use time::*;
