//! Plain data types shared by every drprune crate.
//!
//! Nothing here performs I/O: policies, tag records, scheduler values and GC reports are
//! constructed by the adapters in `drprune-client`/`drprune-exec` and consumed by `drprune-core`.

mod domain;
pub use domain::*;

mod scheduler;
pub use scheduler::*;

mod gc;
pub use gc::*;
