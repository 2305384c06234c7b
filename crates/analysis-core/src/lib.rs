pub mod config;
pub mod error;
pub mod math;
pub mod metric;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use metric::Metric;
pub use traits::*;
pub use types::*;
