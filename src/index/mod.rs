pub mod handle;
pub mod reader;
pub mod stats;
pub mod types;

pub use handle::IndexHandle;
pub use reader::{ReaderOptions, ReverseIndexReader};
pub use types::*;
