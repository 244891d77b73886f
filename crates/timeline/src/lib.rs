pub mod band;
pub mod event;
pub mod index;
pub mod zoom;

pub use band::*;
pub use event::*;
pub use index::*;
pub use zoom::*;
