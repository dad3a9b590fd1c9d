pub use crate::builder::{CacheBuilder, EvictionPolicy};
pub use crate::cache::Cache;
pub use crate::clock::{Clock, FakeClock, SystemClock};
pub use crate::context::{CancelHandle, Context};
pub use crate::error::{CacheError, ConfigError, DynError};
pub use crate::stats::CacheStats;
