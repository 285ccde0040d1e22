//! Batch mutators that rewrite existing layouts without a remote source.

pub mod field_update;
pub mod merge;
pub mod replace;

pub use field_update::{force_field, FieldUpdateWork};
pub use merge::{merge_sections, MergeWork};
pub use replace::{replace_deprecated, ReplaceWork};
