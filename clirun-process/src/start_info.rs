use std::fmt;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use hashbrown::HashMap;

use crate::stream::DEFAULT_MAX_LINE_BYTES;

/// What to kill when a started command is disposed before it exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum KillOnDispose {
    /// Leave the process running.
    None,
    /// Kill only the tracked process.
    OnlyProcess,
    /// Kill the tracked process and all of its descendants.
    #[default]
    EntireProcessTree,
}

/// Executable plus the argument string handed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub arguments: String,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            arguments: arguments.into(),
        }
    }

    /// Build the argument string from discrete arguments, quoting each one
    /// for the current platform.
    pub fn from_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(program, join_arguments(args))
    }

    /// `program` followed by the argument string, if there is one.
    pub fn text(&self) -> String {
        if self.program.is_empty() {
            return String::new();
        }
        if self.arguments.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.arguments)
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Quote each argument for the current platform and join them with spaces.
pub fn join_arguments<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| {
            let arg = std::borrow::Cow::Owned(arg.as_ref().to_owned());
            #[cfg(windows)]
            let escaped = shell_escape::windows::escape(arg);
            #[cfg(not(windows))]
            let escaped = shell_escape::unix::escape(arg);
            escaped.into_owned()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Launch parameters of a [`CliCommand`](crate::CliCommand).
///
/// Freely editable until the command starts; frozen afterwards.
#[derive(Clone)]
pub struct StartInfo {
    pub program: String,
    pub arguments: String,
    pub working_directory: PathBuf,
    /// Variables set on top of the inherited environment.
    pub env: HashMap<String, String>,
    /// Variables removed from the inherited environment.
    pub env_remove: Vec<String>,
    /// Start from an empty environment instead of inheriting.
    pub env_clear: bool,
    /// Encoding of both output streams. `None` means UTF-8.
    pub encoding: Option<&'static Encoding>,
    pub max_line_bytes: usize,
}

impl fmt::Debug for StartInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartInfo")
            .field("program", &self.program)
            .field("arguments", &self.arguments)
            .field("working_directory", &self.working_directory)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("env_remove", &self.env_remove)
            .field("env_clear", &self.env_clear)
            .field("encoding", &self.encoding.map(Encoding::name))
            .field("max_line_bytes", &self.max_line_bytes)
            .finish()
    }
}

impl StartInfo {
    pub fn new(command_line: CommandLine) -> Self {
        Self {
            program: command_line.program,
            arguments: command_line.arguments,
            working_directory: clirun_commons::base_directory(),
            env: HashMap::new(),
            env_remove: Vec::new(),
            env_clear: false,
            encoding: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn command_line(&self) -> CommandLine {
        CommandLine::new(self.program.clone(), self.arguments.clone())
    }

    pub fn command_text(&self) -> String {
        self.command_line().text()
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn set_working_directory(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.working_directory = dir.into();
        self
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn remove_env(&mut self, key: impl Into<String>) -> &mut Self {
        self.env_remove.push(key.into());
        self
    }

    pub fn set_encoding(&mut self, encoding: Option<&'static Encoding>) -> &mut Self {
        self.encoding = encoding;
        self
    }
}
