//! In-memory collaborators for pipeline tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use flotilla_core::deploy::Confirmer;
use flotilla_core::executor::{
    CommandOutcome, CommandRequest, CommandRunner, CreateInstance, Executor, ExecutorFactory,
    ExecutorKey,
};
use flotilla_core::loader::Inventory;
use flotilla_core::specs::{Environment, TemplateEngineSpec, VarMap};
use flotilla_core::template::{CompilerFactory, TemplateCompiler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Setup(String),
    Create { name: String, profiles: Vec<String> },
    Delete(String),
    Start(String),
    WaitIp(String),
    Push { name: String, source: PathBuf, destination: String },
    Exec { target: String, command: String },
}

#[derive(Debug, Default)]
pub struct RemoteState {
    /// Instance name to running flag.
    pub instances: BTreeMap<String, bool>,
    pub profiles: Vec<String>,
    pub calls: Vec<Call>,
    pub requests: Vec<CommandRequest>,
    /// Commands that exit with code 1.
    pub failing: Vec<String>,
    /// Stdout returned for a command when capture is requested.
    pub outputs: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Rc<RefCell<RemoteState>>,
}

impl FakeRemote {
    pub fn new(profiles: &[&str]) -> Self {
        let remote = Self::default();
        remote.state.borrow_mut().profiles = profiles.iter().map(|p| p.to_string()).collect();
        remote
    }

    pub fn with_instance(self, name: &str, running: bool) -> Self {
        self.state
            .borrow_mut()
            .instances
            .insert(name.to_string(), running);
        self
    }

    pub fn failing(self, command: &str) -> Self {
        self.state.borrow_mut().failing.push(command.to_string());
        self
    }

    pub fn output(self, command: &str, stdout: &str) -> Self {
        self.state
            .borrow_mut()
            .outputs
            .insert(command.to_string(), stdout.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.state.borrow().requests.clone()
    }

    /// `(target, command)` of every executed command, in order.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Exec { target, command } => Some((target, command)),
                _ => None,
            })
            .collect()
    }

    pub fn instances(&self) -> BTreeMap<String, bool> {
        self.state.borrow().instances.clone()
    }

    fn executor(&self, connection: &str) -> FakeExecutor {
        FakeExecutor {
            connection: connection.to_string(),
            state: self.state.clone(),
        }
    }
}

impl ExecutorFactory for FakeRemote {
    fn connect(&self, key: &ExecutorKey) -> anyhow::Result<Box<dyn Executor>> {
        Ok(Box::new(self.executor(&key.connection)))
    }

    fn host(&self) -> Box<dyn CommandRunner> {
        Box::new(self.executor("host"))
    }
}

pub struct FakeExecutor {
    connection: String,
    state: Rc<RefCell<RemoteState>>,
}

impl FakeExecutor {
    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl CommandRunner for FakeExecutor {
    fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutcome> {
        self.record(Call::Exec {
            target: request.target.clone(),
            command: request.command.clone(),
        });
        let mut state = self.state.borrow_mut();
        state.requests.push(request.clone());

        let exit_code = if state.failing.contains(&request.command) {
            1
        } else {
            0
        };
        let stdout = if request.capture.stdout {
            state.outputs.get(&request.command).cloned().unwrap_or_default()
        } else {
            String::new()
        };
        Ok(CommandOutcome {
            exit_code,
            stdout,
            stderr: String::new(),
        })
    }
}

impl Executor for FakeExecutor {
    fn setup(&mut self) -> anyhow::Result<()> {
        self.record(Call::Setup(self.connection.clone()));
        Ok(())
    }

    fn is_present_instance(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.state.borrow().instances.contains_key(name))
    }

    fn is_running_instance(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self
            .state
            .borrow()
            .instances
            .get(name)
            .copied()
            .unwrap_or(false))
    }

    fn create_instance(&self, request: &CreateInstance) -> anyhow::Result<()> {
        self.record(Call::Create {
            name: request.name.clone(),
            profiles: request.profiles.clone(),
        });
        self.state
            .borrow_mut()
            .instances
            .insert(request.name.clone(), true);
        Ok(())
    }

    fn delete_instance(&self, name: &str) -> anyhow::Result<()> {
        self.record(Call::Delete(name.to_string()));
        self.state.borrow_mut().instances.remove(name);
        Ok(())
    }

    fn start_instance(&self, name: &str) -> anyhow::Result<()> {
        self.record(Call::Start(name.to_string()));
        self.state
            .borrow_mut()
            .instances
            .insert(name.to_string(), true);
        Ok(())
    }

    fn wait_ip(&self, name: &str, _timeout: Duration) -> anyhow::Result<()> {
        self.record(Call::WaitIp(name.to_string()));
        Ok(())
    }

    fn profiles(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.state.borrow().profiles.clone())
    }

    fn push_resource(&self, name: &str, source: &Path, destination: &str) -> anyhow::Result<()> {
        self.record(Call::Push {
            name: name.to_string(),
            source: source.to_path_buf(),
            destination: destination.to_string(),
        });
        Ok(())
    }
}

/// Source path and variable snapshot of every compile.
pub type Compiled = Rc<RefCell<Vec<(PathBuf, VarMap)>>>;

#[derive(Clone, Default)]
pub struct RecordingEngines {
    pub compiled: Compiled,
}

impl CompilerFactory for RecordingEngines {
    fn compiler(&self, _spec: &TemplateEngineSpec, _env_base_dir: &Path) -> anyhow::Result<Box<dyn TemplateCompiler>> {
        Ok(Box::new(RecordingCompiler {
            vars: VarMap::new(),
            compiled: self.compiled.clone(),
        }))
    }
}

pub struct RecordingCompiler {
    vars: VarMap,
    compiled: Compiled,
}

impl TemplateCompiler for RecordingCompiler {
    fn init_vars(&mut self, vars: VarMap) {
        self.vars = vars;
    }

    fn compile(&self, source: &Path, _destination: &Path) -> anyhow::Result<()> {
        self.compiled
            .borrow_mut()
            .push((source.to_path_buf(), self.vars.clone()));
        Ok(())
    }

    fn vars_mut(&mut self) -> &mut VarMap {
        &mut self.vars
    }
}

/// Answers every prompt with a fixed value and remembers the prompts.
#[derive(Default)]
pub struct ScriptedConfirmer {
    pub answer: bool,
    pub prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> anyhow::Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.answer)
    }
}

/// Inventory holding one environment parsed from `yaml`, rooted at `dir`.
pub fn inventory(dir: &Path, yaml: &str) -> Inventory {
    let env = Environment::from_yaml(yaml, dir.join("env.yml")).expect("valid environment");
    let mut inventory = Inventory::new();
    inventory.add_environment(env).expect("environment loads");
    inventory
}
