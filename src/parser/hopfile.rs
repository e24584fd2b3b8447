// ABOUTME: Hopfile data structures and YAML loading
// ABOUTME: Defines the Hopfile (target, variables, tasks) and the file parser

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::error::{ParserError, Result, ValidationError};
use super::task::TaskDefinition;
use crate::session::Target;

/// Default file names searched for in the working directory
pub const DEFAULT_HOPFILE_NAMES: [&str; 3] = ["Hopfile.yaml", "Hopfile.yml", "hopfile.yaml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hopfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetConfig>,
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    pub tasks: IndexMap<String, TaskDefinition>,
}

/// Target settings as declared in a hopfile or on the command line.
///
/// Every field is optional so that command-line flags can fill in or override
/// what the hopfile declares. Credentials are never stored here, only the path
/// of an identity file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<PathBuf>,
}

impl TargetConfig {
    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(&self, other: &TargetConfig) -> TargetConfig {
        TargetConfig {
            host: other.host.clone().or_else(|| self.host.clone()),
            user: other.user.clone().or_else(|| self.user.clone()),
            port: other.port.or(self.port),
            identity: other.identity.clone().or_else(|| self.identity.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.user.is_none()
    }

    /// Build an immutable target. `Ok(None)` when neither host nor user is set.
    pub fn to_target(&self) -> std::result::Result<Option<Target>, ValidationError> {
        match (&self.host, &self.user) {
            (None, None) => Ok(None),
            (Some(host), Some(user)) => {
                if host.trim().is_empty() || user.trim().is_empty() {
                    return Err(ValidationError::InvalidTarget {
                        reason: "host and user cannot be empty".to_string(),
                    });
                }
                let mut target = Target::new(host.trim(), user.trim());
                if let Some(port) = self.port {
                    target = target.with_port(port);
                }
                if let Some(ref identity) = self.identity {
                    target = target.with_identity(identity.clone());
                }
                Ok(Some(target))
            }
            (Some(_), None) => Err(ValidationError::InvalidTarget {
                reason: "a host is set but no user".to_string(),
            }),
            (None, Some(_)) => Err(ValidationError::InvalidTarget {
                reason: "a user is set but no host".to_string(),
            }),
        }
    }
}

impl Hopfile {
    /// Parse hopfile from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParserError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Parse hopfile from YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let hopfile: Hopfile = serde_yaml::from_str(content).map_err(ParserError::YamlError)?;
        hopfile.validate_structure()?;
        Ok(hopfile)
    }

    /// Validate basic hopfile structure
    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ParserError::MissingField("name".to_string()));
        }

        if self.tasks.is_empty() {
            return Err(ParserError::ValidationError(ValidationError::EmptyHopfile));
        }

        if let Some(name) = self.tasks.keys().find(|name| name.trim().is_empty()) {
            return Err(ParserError::InvalidFormat(format!(
                "task name '{}' cannot be blank",
                name
            )));
        }

        if let Some(ref target) = self.target {
            target.to_target()?;
        }

        Ok(())
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn get_task(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Tasks that reference the given task
    pub fn get_dependent_tasks(&self, name: &str) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|(_, task)| task.references().any(|r| r == name))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn merge_variables(&mut self, vars: IndexMap<String, String>) {
        self.variables.extend(vars);
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ParserError::YamlError)
    }
}

#[derive(Debug, Clone)]
pub struct HopfileParser;

impl HopfileParser {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Hopfile> {
        let content = fs::read_to_string(path.as_ref())
            .await
            .map_err(ParserError::IoError)?;
        self.parse_string(&content)
    }

    pub fn parse_string(&self, content: &str) -> Result<Hopfile> {
        Hopfile::from_yaml(content)
    }

    /// Locate a hopfile in `dir` using the default names
    pub fn discover(&self, dir: &Path) -> Option<PathBuf> {
        DEFAULT_HOPFILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }
}

impl Default for HopfileParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::task::{StepKind, TaskEntry};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LAB_HOPFILE: &str = r#"
name: labs
description: Sync and test lab code

target:
  host: athena.dialup.mit.edu
  user: student

variables:
  code_dir: "~/6.824"

tasks:
  commit:
    steps:
      - local: git add -p && git commit
        interactive: true
  push:
    steps:
      - local: git push
  prepare_deploy:
    description: Commit then push
    steps:
      - task: commit
      - task: push
  deploy:
    steps:
      - remote: ls
        dir: "{{variables.code_dir}}"
      - remote: go test
        dir: "{{variables.code_dir}}/src/paxos"
        env:
          GOPATH: "$HOME/6.824"
"#;

    #[test]
    fn test_parse_lab_hopfile() {
        let hopfile = Hopfile::from_yaml(LAB_HOPFILE).unwrap();

        assert_eq!(hopfile.name, "labs");
        assert_eq!(
            hopfile.task_names(),
            vec!["commit", "push", "prepare_deploy", "deploy"]
        );
        assert_eq!(
            hopfile.variables.get("code_dir").map(String::as_str),
            Some("~/6.824")
        );

        let commit = hopfile.get_task("commit").unwrap();
        let step = commit.steps[0].as_step().unwrap();
        assert_eq!(step.kind, StepKind::Local);
        assert!(step.interactive);

        let prepare = hopfile.get_task("prepare_deploy").unwrap();
        assert_eq!(prepare.description.as_deref(), Some("Commit then push"));
        assert_eq!(prepare.steps[1], TaskEntry::reference("push"));

        let target = hopfile.target.as_ref().unwrap().to_target().unwrap().unwrap();
        assert_eq!(target.destination(), "student@athena.dialup.mit.edu");
    }

    #[test]
    fn test_dependent_tasks() {
        let hopfile = Hopfile::from_yaml(LAB_HOPFILE).unwrap();
        assert_eq!(hopfile.get_dependent_tasks("push"), vec!["prepare_deploy"]);
        assert!(hopfile.get_dependent_tasks("deploy").is_empty());
    }

    #[test]
    fn test_hopfile_validation_empty_name() {
        let yaml = r#"
name: ""
tasks:
  test:
    steps:
      - local: echo
"#;
        assert!(matches!(
            Hopfile::from_yaml(yaml),
            Err(ParserError::MissingField(_))
        ));
    }

    #[test]
    fn test_hopfile_validation_no_tasks() {
        let yaml = "name: empty\ntasks: {}\n";
        assert!(matches!(
            Hopfile::from_yaml(yaml),
            Err(ParserError::ValidationError(ValidationError::EmptyHopfile))
        ));
    }

    #[test]
    fn test_hopfile_rejects_half_target() {
        let yaml = r#"
name: half
target:
  host: example.edu
tasks:
  noop:
    steps: []
"#;
        assert!(matches!(
            Hopfile::from_yaml(yaml),
            Err(ParserError::ValidationError(
                ValidationError::InvalidTarget { .. }
            ))
        ));
    }

    #[test]
    fn test_target_config_merge() {
        let declared = TargetConfig {
            host: Some("athena.dialup.mit.edu".to_string()),
            user: Some("student".to_string()),
            port: Some(2222),
            identity: None,
        };
        let flags = TargetConfig {
            host: Some("example.edu".to_string()),
            ..Default::default()
        };

        let merged = declared.merge(&flags);
        assert_eq!(merged.host.as_deref(), Some("example.edu"));
        assert_eq!(merged.user.as_deref(), Some("student"));
        assert_eq!(merged.port, Some(2222));

        assert!(TargetConfig::default().to_target().unwrap().is_none());
    }

    #[test]
    fn test_hopfile_file_round_trip() {
        let hopfile = Hopfile::from_yaml(LAB_HOPFILE).unwrap();

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(hopfile.to_yaml().unwrap().as_bytes())
            .unwrap();

        let loaded = Hopfile::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.name, hopfile.name);
        assert_eq!(loaded.tasks, hopfile.tasks);
        assert_eq!(loaded.target, hopfile.target);
    }
}
