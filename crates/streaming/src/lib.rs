pub mod gate;
pub mod memory;
pub mod pipeline;
pub mod protocol;
pub mod schema_cache;

pub use gate::*;
pub use memory::*;
pub use pipeline::*;
pub use protocol::*;
pub use schema_cache::*;
