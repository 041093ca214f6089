//! Combination engine - composing relations into nested loading trees

mod loader;
pub mod proxy;
pub mod spec;

pub use proxy::RelationProxy;
pub use spec::{CombineEntry, CombineOptions, CombineSpec, Targets};
