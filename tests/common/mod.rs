// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides a hopfile builder, scratch environments and a scripted fake SSH connector

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;

use taskhop::session::{
    CommandOutput, RemoteCommand, RemoteSession, SessionConnector, SessionError, Target,
};

/// Builds hopfile YAML for tests
pub struct HopfileBuilder {
    name: String,
    target: Option<(String, String)>,
    variables: Vec<(String, String)>,
    tasks: Vec<(String, Vec<String>)>,
}

impl HopfileBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target: None,
            variables: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn with_target(mut self, host: &str, user: &str) -> Self {
        self.target = Some((host.to_string(), user.to_string()));
        self
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.variables.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a task whose entries are raw YAML flow mappings, e.g. `{local: ls}`
    pub fn with_task(mut self, name: &str, entries: &[&str]) -> Self {
        self.tasks.push((
            name.to_string(),
            entries.iter().map(|e| e.to_string()).collect(),
        ));
        self
    }

    pub fn add_local_task(self, name: &str, commands: &[&str]) -> Self {
        let entries: Vec<String> = commands
            .iter()
            .map(|c| format!("{{local: {}}}", yaml_quote(c)))
            .collect();
        let entries: Vec<&str> = entries.iter().map(String::as_str).collect();
        self.with_task(name, &entries)
    }

    pub fn add_remote_task(self, name: &str, commands: &[&str]) -> Self {
        let entries: Vec<String> = commands
            .iter()
            .map(|c| format!("{{remote: {}}}", yaml_quote(c)))
            .collect();
        let entries: Vec<&str> = entries.iter().map(String::as_str).collect();
        self.with_task(name, &entries)
    }

    pub fn add_composite_task(self, name: &str, references: &[&str]) -> Self {
        let entries: Vec<String> = references
            .iter()
            .map(|r| format!("{{task: {}}}", r))
            .collect();
        let entries: Vec<&str> = entries.iter().map(String::as_str).collect();
        self.with_task(name, &entries)
    }

    pub fn build(&self) -> String {
        let mut yaml = format!("name: {}\n", self.name);

        if let Some((ref host, ref user)) = self.target {
            yaml.push_str(&format!("target:\n  host: {}\n  user: {}\n", host, user));
        }

        if !self.variables.is_empty() {
            yaml.push_str("variables:\n");
            for (key, value) in &self.variables {
                yaml.push_str(&format!("  {}: {}\n", key, yaml_quote(value)));
            }
        }

        yaml.push_str("tasks:\n");
        for (name, entries) in &self.tasks {
            yaml.push_str(&format!("  {}:\n", name));
            if entries.is_empty() {
                yaml.push_str("    steps: []\n");
                continue;
            }
            yaml.push_str("    steps:\n");
            for entry in entries {
                yaml.push_str(&format!("      - {}\n", entry));
            }
        }

        yaml
    }

    pub async fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.build()).await
    }
}

/// Single-quoted YAML scalar
pub fn yaml_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn hopfile_path(&self) -> PathBuf {
        self.path().join("Hopfile.yaml")
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}_output.json", name))
    }

    pub async fn create_hopfile(&self, builder: &HopfileBuilder) -> PathBuf {
        let path = self.hopfile_path();
        builder
            .write_to_file(&path)
            .await
            .expect("Failed to write hopfile");
        path
    }
}

/// What the fake connector observed
#[derive(Debug, Default)]
pub struct FakeState {
    pub opens: usize,
    pub closes: usize,
    pub targets: Vec<String>,
    pub commands: Vec<RemoteCommand>,
}

/// Connector handing out scripted in-memory sessions
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
    exit_codes: Arc<HashMap<String, i32>>,
    delays: Arc<HashMap<String, Duration>>,
    refuse: bool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` exit with `code`
    pub fn with_exit_code(mut self, command: &str, code: i32) -> Self {
        Arc::make_mut(&mut self.exit_codes).insert(command.to_string(), code);
        self
    }

    /// Make `command` take `delay` before returning
    pub fn with_delay(mut self, command: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert(command.to_string(), delay);
        self
    }

    /// Fail every connection attempt
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn targets(&self) -> Vec<String> {
        self.state.lock().unwrap().targets.clone()
    }

    /// Commands issued, as plain command text
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }

    /// Commands issued, as the shell line sent to the remote host
    pub fn shell_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .map(RemoteCommand::to_shell_line)
            .collect()
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn open(&self, target: &Target) -> taskhop::session::Result<Box<dyn RemoteSession>> {
        if self.refuse {
            return Err(SessionError::Connect {
                target: target.to_string(),
                message: "Permission denied (publickey)".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        state.targets.push(target.to_string());

        Ok(Box::new(FakeSession {
            connector: self.clone(),
        }))
    }
}

pub struct FakeSession {
    connector: FakeConnector,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn run(&self, command: &RemoteCommand) -> taskhop::session::Result<CommandOutput> {
        self.connector
            .state
            .lock()
            .unwrap()
            .commands
            .push(command.clone());

        if let Some(delay) = self.connector.delays.get(&command.command) {
            tokio::time::sleep(*delay).await;
        }

        let exit_code = self
            .connector
            .exit_codes
            .get(&command.command)
            .copied()
            .unwrap_or(0);

        Ok(CommandOutput {
            exit_code: Some(exit_code),
            stdout: format!("ran {}\n", command.command),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                format!("{} failed\n", command.command)
            },
        })
    }

    async fn close(&mut self) -> taskhop::session::Result<()> {
        self.connector.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
