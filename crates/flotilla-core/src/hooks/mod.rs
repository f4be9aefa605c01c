//! Hook selection, flag gating and execution.

pub mod flags;
pub mod resolver;
pub mod runner;

pub use flags::FlagFilter;
pub use resolver::{ExecTarget, ResolvedHook};
pub use runner::{HookRunner, HookScope, process_hooks};
