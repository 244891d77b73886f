pub mod attributes;
pub mod compose;
pub mod feature;
pub mod filter;
pub mod range;
pub mod style;

pub use attributes::*;
pub use compose::*;
pub use feature::*;
pub use filter::*;
pub use range::*;
pub use style::*;
