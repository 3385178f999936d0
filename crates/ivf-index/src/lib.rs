pub mod direct_map;
pub mod inverted_lists;
pub mod ivf;
pub mod kmeans;
pub mod quantizer;

pub use direct_map::{DirectMap, DirectMapType};
pub use inverted_lists::{ArrayInvertedLists, InvertedLists, ReadOnlyInvertedLists};
pub use ivf::{IvfIndex, ParallelMode, SubsetType};
pub use kmeans::{kmeans, KMeansParams};
pub use quantizer::{Level1Quantizer, TrainStrategy};
