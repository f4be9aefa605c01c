//! Config template compilation.
//!
//! A compiler holds a snapshot of the project variables. The orchestrator
//! refreshes that snapshot after every hook stage so captured output is
//! visible to the next compile.

pub mod compile;
pub mod hbs;

use std::path::{Path, PathBuf};

use crate::error::ComposeError;
use crate::specs::{TemplateEngineSpec, VarMap};

pub use compile::{
    compile_group_files, compile_node_files, compile_project, compile_project_files, project_vars,
};
pub use hbs::HandlebarsCompiler;

pub trait TemplateCompiler {
    /// Replace the variable snapshot.
    fn init_vars(&mut self, vars: VarMap);

    /// Render `source` into `destination`.
    fn compile(&self, source: &Path, destination: &Path) -> anyhow::Result<()>;

    fn vars_mut(&mut self) -> &mut VarMap;
}

/// Builds the compiler an environment asks for.
pub trait CompilerFactory {
    fn compiler(&self, spec: &TemplateEngineSpec, env_base_dir: &Path) -> anyhow::Result<Box<dyn TemplateCompiler>>;
}

/// Compilers shipped with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngines;

impl CompilerFactory for BuiltinEngines {
    fn compiler(&self, spec: &TemplateEngineSpec, env_base_dir: &Path) -> anyhow::Result<Box<dyn TemplateCompiler>> {
        compiler_for(spec, env_base_dir)
    }
}

pub fn compiler_for(spec: &TemplateEngineSpec, env_base_dir: &Path) -> anyhow::Result<Box<dyn TemplateCompiler>> {
    match spec.engine.as_str() {
        "" | "handlebars" => Ok(Box::new(HandlebarsCompiler::new(
            &spec.opts,
            PathBuf::from(env_base_dir),
        ))),
        other => Err(ComposeError::UnknownTemplateEngine(other.to_string()).into()),
    }
}
