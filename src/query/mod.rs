pub mod filter;
pub mod source;

pub use filter::{
    AllOf, AnyOf, LetThroughFilter, NoPassFilter, QueryFilter, RejectFilter, RetainFilter,
};
pub use source::PostingsSource;
