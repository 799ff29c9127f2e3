//! Task descriptor: the unit of work delivered on the durable queue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One command run in its own container invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Tokens passed to the container entrypoint.
    #[serde(alias = "command")]
    pub argv: Vec<String>,

    /// When set, stdout of the command is redirected to this path inside the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
}

impl Command {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            stdout: None,
        }
    }

    pub fn with_stdout(mut self, path: impl Into<String>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Argv handed to the container runtime.
    ///
    /// Runtimes cannot send stdout to a file themselves, so a redirected
    /// command becomes `sh -c '<argv> > <stdout>'` with every token quoted.
    pub fn container_argv(&self) -> Vec<String> {
        match &self.stdout {
            None => self.argv.clone(),
            Some(path) => {
                let script = format!(
                    "{} > {}",
                    shell_words::join(&self.argv),
                    shell_words::quote(path)
                );
                vec!["sh".to_string(), "-c".to_string(), script]
            }
        }
    }
}

/// Task descriptor as received from the queue.
///
/// `inputs` and `outputs` map a remote artifact reference (`bucket:key` or `key`)
/// to the path the artifact is mounted at inside the container. Ordered maps keep
/// staging, binding and upload order deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub container: String,
    pub commands: Vec<Command>,
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
}

impl TaskDescriptor {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            commands: Vec::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn with_input(mut self, remote: impl Into<String>, internal: impl Into<String>) -> Self {
        self.inputs.insert(remote.into(), internal.into());
        self
    }

    pub fn with_output(mut self, remote: impl Into<String>, internal: impl Into<String>) -> Self {
        self.outputs.insert(remote.into(), internal.into());
        self
    }

    /// Decode a queue message body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_descriptor_with_stdout_redirect() {
        let body = br#"{
            "container": "alpine",
            "commands": [{"argv": ["echo", "hi"], "stdout": "/out/a.txt"}],
            "inputs": {},
            "outputs": {"mybucket:result/a.txt": "/out/a.txt"}
        }"#;

        let task = TaskDescriptor::from_slice(body).unwrap();
        assert_eq!(task.container, "alpine");
        assert_eq!(task.commands[0].argv, vec!["echo", "hi"]);
        assert_eq!(task.commands[0].stdout.as_deref(), Some("/out/a.txt"));
        assert_eq!(task.outputs["mybucket:result/a.txt"], "/out/a.txt");
    }

    #[test]
    fn accepts_command_as_argv_field_name() {
        let body = br#"{
            "container": "alpine",
            "commands": [{"command": ["ls", "-l"]}],
            "inputs": {"data.csv": "/in/data.csv"},
            "outputs": {}
        }"#;

        let task = TaskDescriptor::from_slice(body).unwrap();
        assert_eq!(task.commands[0], Command::new(["ls", "-l"]));
    }

    #[test]
    fn plain_command_runs_verbatim() {
        let command = Command::new(["python", "train.py", "--epochs", "3"]);
        assert_eq!(
            command.container_argv(),
            vec!["python", "train.py", "--epochs", "3"]
        );
    }

    #[test]
    fn stdout_redirect_wraps_in_shell() {
        let command = Command::new(["echo", "hi"]).with_stdout("/out/a.txt");
        assert_eq!(
            command.container_argv(),
            vec!["sh", "-c", "echo hi > /out/a.txt"]
        );
    }

    #[test]
    fn stdout_redirect_quotes_unsafe_tokens() {
        let command = Command::new(["echo", "two words", "$HOME;rm"]).with_stdout("/out/my file");
        let argv = command.container_argv();
        assert_eq!(argv[2], "echo 'two words' '$HOME;rm' > '/out/my file'");
    }

    #[test]
    fn rejects_descriptor_missing_required_fields() {
        let body = br#"{"container": "alpine", "commands": []}"#;
        assert!(TaskDescriptor::from_slice(body).is_err());
    }

    #[test]
    fn rejects_non_json_body() {
        assert!(TaskDescriptor::from_slice(b"not json").is_err());
    }
}
