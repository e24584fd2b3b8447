// ABOUTME: Remote command lines and their captured output
// ABOUTME: Emulates working-directory and environment scoping by prefixing each command

use indexmap::IndexMap;

/// A command to issue over a remote session, with its directory and env scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub command: String,
    pub working_dir: Option<String>,
    pub env: IndexMap<String, String>,
}

/// Exit status and captured streams of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the command was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            env: IndexMap::new(),
        }
    }

    pub fn in_dir(mut self, dir: Option<String>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_env(mut self, env: IndexMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Full shell line sent to the remote shell.
    ///
    /// Each remote command may run in a fresh shell, so directory and
    /// environment are re-established every time:
    /// `cd "<dir>" && export K="v" && <command>`.
    pub fn to_shell_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.env.len() + 2);

        if let Some(ref dir) = self.working_dir {
            parts.push(format!("cd {}", quote_path(dir)));
        }

        for (key, value) in &self.env {
            parts.push(format!("export {}={}", key, quote_expanding(value)));
        }

        parts.push(self.command.clone());
        parts.join(" && ")
    }
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Double-quote a value so the remote shell still expands `$VAR` references
/// but treats spaces, quotes and backticks literally.
pub fn quote_expanding(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Quote a directory, rewriting a leading `~` to `$HOME` since tilde does not
/// expand inside quotes.
fn quote_path(dir: &str) -> String {
    if dir == "~" {
        return "\"$HOME\"".to_string();
    }
    match dir.strip_prefix("~/") {
        Some(rest) => format!("\"$HOME\"/{}", quote_expanding(rest)),
        None => quote_expanding(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_command() {
        assert_eq!(RemoteCommand::new("ls").to_shell_line(), "ls");
    }

    #[test]
    fn test_directory_and_env_prefix() {
        let mut env = IndexMap::new();
        env.insert("GOPATH".to_string(), "$HOME/6.824".to_string());
        env.insert("PATH".to_string(), "/mit/go/bin:$PATH".to_string());

        let line = RemoteCommand::new("go test")
            .in_dir(Some("/afs/athena.mit.edu/user/6.824".to_string()))
            .with_env(env)
            .to_shell_line();

        assert_eq!(
            line,
            r#"cd "/afs/athena.mit.edu/user/6.824" && export GOPATH="$HOME/6.824" && export PATH="/mit/go/bin:$PATH" && go test"#
        );
    }

    #[test]
    fn test_tilde_directory() {
        let line = RemoteCommand::new("ls")
            .in_dir(Some("~/6.824/src".to_string()))
            .to_shell_line();
        assert_eq!(line, r#"cd "$HOME"/"6.824/src" && ls"#);

        let home = RemoteCommand::new("ls").in_dir(Some("~".to_string()));
        assert_eq!(home.to_shell_line(), r#"cd "$HOME" && ls"#);
    }

    #[test]
    fn test_quote_escapes_specials() {
        assert_eq!(quote_expanding(r#"a "b" `c` \d"#), r#""a \"b\" \`c\` \\d""#);
        assert_eq!(quote_expanding("with space"), "\"with space\"");
    }

    #[test]
    fn test_command_output_success() {
        let ok = CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        let killed = CommandOutput::default();
        assert!(ok.success());
        assert!(!killed.success());
    }
}
