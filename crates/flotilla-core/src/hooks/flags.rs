//! Flag gating for hook execution.

/// Enabled/disabled flag sets selected for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagFilter {
    /// Opt-in: when non-empty, only hooks sharing a flag run.
    enabled: Vec<String>,
    /// Opt-out: hooks carrying any of these never run.
    disabled: Vec<String>,
}

impl FlagFilter {
    pub fn new(enabled: Vec<String>, disabled: Vec<String>) -> Self {
        Self { enabled, disabled }
    }

    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }

    pub fn disabled(&self) -> &[String] {
        &self.disabled
    }

    pub(crate) fn set_enabled(&mut self, flags: Vec<String>) {
        self.enabled = flags;
    }

    pub(crate) fn set_disabled(&mut self, flags: Vec<String>) {
        self.disabled = flags;
    }

    /// Check whether a hook declaring `flags` should run.
    pub fn should_run(&self, flags: &[String]) -> bool {
        if flags.iter().any(|f| self.disabled.contains(f)) {
            return false;
        }
        if !self.enabled.is_empty() {
            return flags.iter().any(|f| self.enabled.contains(f));
        }
        true
    }
}
