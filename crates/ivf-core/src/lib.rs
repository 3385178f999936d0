pub mod collaborators;
pub mod config;
pub mod error;
pub mod filter;
pub mod flat;
pub mod heap;
pub mod interrupt;
pub mod lo;
pub mod metric;
pub mod stats;

pub use collaborators::{Codec, CoarseQuantizer, ListScanner};
pub use config::RuntimeConfig;
pub use error::{IvfError, IvfResult};
pub use filter::{FilterBitset, RoaringFilter};
pub use interrupt::{AtomicInterrupt, InterruptHook, NeverInterrupt};
pub use lo::{lo_build, lo_listno, lo_offset, LoHandle};
pub use metric::MetricType;
pub use stats::{Stats, StatsDelta};

/// External vector id. `-1` is reserved for "unassigned".
pub type VectorId = i64;
