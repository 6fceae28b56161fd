//! File system watching for workspace models.

pub mod model;

pub use model::{ChangeKind, ChangeObserver, ModelChange, ModelWatcher};
