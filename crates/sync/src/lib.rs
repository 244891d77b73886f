pub mod config;
pub mod context;
pub mod engine;
pub mod entry;
pub mod error;
pub mod load;
pub mod notice;
pub mod playback;
pub mod state;
pub mod viewport;

pub use config::*;
pub use context::*;
pub use engine::*;
pub use entry::*;
pub use error::*;
pub use load::*;
pub use notice::*;
pub use playback::*;
pub use state::*;
pub use viewport::*;
