// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod source;
pub mod store;
pub mod table;

pub use source::{
    JsonSpecificationSource, RangeEntryWire, SpecificationSource, SpecificationWire, StaticSource,
};
pub use store::{DEFAULT_HISTORY_LIMIT, SpecificationStore, UpdateReceipt};
pub use table::{SpecTable, TaskRanges};

/// Specification store crate name helper.
pub fn crate_name() -> &'static str {
    let _ = locoqc_core::crate_name();
    "locoqc-spec"
}
