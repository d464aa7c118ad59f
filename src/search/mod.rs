pub mod filters;
pub mod page;
pub mod predicate;

pub use filters::{FilterError, PageLimits, SearchRequest};
pub use page::PageRequest;
pub use predicate::{compile, Predicate};
