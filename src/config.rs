use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use clirun_process::{
    CommandFactory, DEFAULT_MAX_LINE_BYTES, DirectCommandFactory, Encoding, KillOnDispose,
    OsDependentCommandFactory, ShellCommandFactory,
};

use crate::validation::ResultValidationRules;

/// Shell used to run the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellSetting {
    /// Run the program directly.
    #[default]
    None,
    /// `cmd` on Windows, `sh` everywhere else.
    OsDefault,
    Sh,
    Bash,
    Cmd,
    Sudo,
}

impl ShellSetting {
    pub fn command_factory(self) -> Arc<dyn CommandFactory> {
        match self {
            Self::None => Arc::new(DirectCommandFactory),
            Self::OsDefault => {
                Arc::new(OsDependentCommandFactory::use_cmd_for_windows_and_sh_for_others())
            }
            Self::Sh => Arc::new(ShellCommandFactory::sh()),
            Self::Bash => Arc::new(ShellCommandFactory::bash()),
            Self::Cmd => Arc::new(ShellCommandFactory::cmd()),
            Self::Sudo => Arc::new(ShellCommandFactory::sudo()),
        }
    }
}

/// File-backed defaults for a [`ProgramCli`](crate::ProgramCli).
///
/// ```toml
/// working_directory = "tools"
/// wait_for_exit_timeout_ms = 30000
/// result_validation_rules = "zero_exit_code_and_no_error"
/// kill_on_dispose = "only_process"
/// shell = "os_default"
/// encoding = "windows-1252"
///
/// [env]
/// NO_COLOR = "1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProgramCliConfig {
    /// Relative paths resolve against the running program's base directory.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Unset waits forever.
    #[serde(default)]
    pub wait_for_exit_timeout_ms: Option<u64>,
    #[serde(default)]
    pub result_validation_rules: ResultValidationRules,
    #[serde(default)]
    pub kill_on_dispose: KillOnDispose,
    #[serde(default)]
    pub shell: ShellSetting,
    /// WHATWG label of the output encoding. Unset means UTF-8.
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default = "ProgramCliConfig::default_max_line_bytes")]
    pub max_line_bytes: usize,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub env_clear: bool,
}

impl Default for ProgramCliConfig {
    fn default() -> Self {
        Self {
            working_directory: None,
            wait_for_exit_timeout_ms: None,
            result_validation_rules: ResultValidationRules::default(),
            kill_on_dispose: KillOnDispose::default(),
            shell: ShellSetting::default(),
            encoding: None,
            max_line_bytes: Self::default_max_line_bytes(),
            env: BTreeMap::new(),
            env_clear: false,
        }
    }
}

impl ProgramCliConfig {
    const fn default_max_line_bytes() -> usize {
        DEFAULT_MAX_LINE_BYTES
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).context("failed to parse clirun configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read clirun configuration {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid clirun configuration {}", path.display()))
    }

    pub fn wait_for_exit_timeout(&self) -> Option<Duration> {
        self.wait_for_exit_timeout_ms.map(Duration::from_millis)
    }

    /// The configured encoding, `None` for the UTF-8 default or an unknown
    /// label.
    pub fn output_encoding(&self) -> Option<&'static Encoding> {
        self.encoding
            .as_deref()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_line_bytes > 0, "max_line_bytes must be at least 1");

        ensure!(
            self.wait_for_exit_timeout_ms != Some(0),
            "wait_for_exit_timeout_ms must be positive (omit it to wait forever)"
        );

        if let Some(label) = &self.encoding {
            ensure!(
                Encoding::for_label(label.as_bytes()).is_some(),
                "encoding `{label}` is not a known encoding label"
            );
        }

        for key in self.env.keys() {
            ensure!(!key.is_empty(), "env keys must not be empty");
            ensure!(
                !key.contains('=') && !key.contains('\0'),
                "env key `{key}` must not contain `=` or NUL"
            );
        }

        Ok(())
    }
}
