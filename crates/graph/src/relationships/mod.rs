//! Relationships Module - associations, join keys and key inference

pub mod inference;
pub mod metadata;

pub use inference::{infer_combine_keys, infer_keys, ForeignKeyConvention, KeyDirection};
pub use metadata::*;
