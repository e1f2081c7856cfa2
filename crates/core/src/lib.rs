pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::*;
pub use metrics::Counters;
pub use model::*;
