//! Handlebars-backed compiler.

use std::path::{Path, PathBuf};

use anyhow::Context;
use handlebars::Handlebars;
use tracing::debug;

use super::TemplateCompiler;
use crate::specs::VarMap;

/// Recognized `template_engine.opts` values.
const OPT_STRICT: &str = "strict";
const OPT_HTML_ESCAPE: &str = "html-escape";

pub struct HandlebarsCompiler {
    registry: Handlebars<'static>,
    env_base_dir: PathBuf,
    vars: VarMap,
}

impl HandlebarsCompiler {
    /// Config files are rendered verbatim unless `html-escape` is requested.
    pub fn new(opts: &[String], env_base_dir: PathBuf) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(opts.iter().any(|o| o == OPT_STRICT));
        if !opts.iter().any(|o| o == OPT_HTML_ESCAPE) {
            registry.register_escape_fn(handlebars::no_escape);
        }
        Self {
            registry,
            env_base_dir,
            vars: VarMap::new(),
        }
    }

    pub fn render(&self, template: &str) -> anyhow::Result<String> {
        self.registry
            .render_template(template, &self.vars)
            .context("Failed to render template")
    }
}

impl TemplateCompiler for HandlebarsCompiler {
    fn init_vars(&mut self, vars: VarMap) {
        self.vars = vars;
    }

    /// Relative paths resolve against the environment directory.
    fn compile(&self, source: &Path, destination: &Path) -> anyhow::Result<()> {
        let source = self.env_base_dir.join(source);
        let destination = self.env_base_dir.join(destination);
        debug!("Compiling {} -> {}", source.display(), destination.display());

        let template = std::fs::read_to_string(&source)
            .with_context(|| format!("Failed to read template: {}", source.display()))?;
        let rendered = self
            .render(&template)
            .with_context(|| format!("Failed to compile template: {}", source.display()))?;

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&destination, rendered)
            .with_context(|| format!("Failed to write compiled file: {}", destination.display()))
    }

    fn vars_mut(&mut self) -> &mut VarMap {
        &mut self.vars
    }
}
