mod command;
pub use command::GcCommand;

mod container;
pub use container::ContainerSummary;

mod report;
pub use report::{GcOutcome, GcReport};

mod target;
pub use target::{ContainerTarget, GcTarget};
