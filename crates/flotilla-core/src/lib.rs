//! Flotilla Core Library
//!
//! Declarative orchestration of container/VM instance fleets: an
//! environment → project → group → node model, lifecycle hooks, and the
//! apply/destroy pipelines that reconcile a remote with that model.

pub mod config;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod loader;
pub mod specs;
pub mod template;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{FlotillaConfig, load_config};

    // Model
    pub use crate::specs::{
        CommandSpec, Environment, Group, Hook, HookTarget, Node, Project, VarLayer, VarLayers,
        events,
    };

    // Loading
    pub use crate::loader::{Inventory, ValidationReport};

    // Orchestration
    pub use crate::deploy::{ApplyOptions, AssumeYes, Confirmer, DestroyOptions, Orchestrator};
    pub use crate::error::ComposeError;
    pub use crate::hooks::{FlagFilter, ResolvedHook};

    // Collaborators
    pub use crate::executor::{Executor, ExecutorFactory, LxcExecutorFactory};
    pub use crate::template::{BuiltinEngines, CompilerFactory, TemplateCompiler};
}
