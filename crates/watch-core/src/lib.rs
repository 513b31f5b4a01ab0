pub mod correlate;
pub mod diff;
pub mod model;

pub use correlate::*;
pub use diff::*;
pub use model::*;
