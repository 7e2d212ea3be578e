pub mod normalize;

pub use normalize::{normalize, SUPPORTED_EXTENSIONS};
