use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use clirun_process::CliCommandResult;

/// Which outcomes of a run count as failures.
///
/// Rules combine with `|`: `ZeroExitCode | NoError` is
/// [`ZeroExitCodeAndNoError`](Self::ZeroExitCodeAndNoError).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultValidationRules {
    /// Accept every result.
    None,
    /// Fail when the exit code is not zero.
    #[default]
    ZeroExitCode,
    /// Fail when anything was written to standard error.
    NoError,
    ZeroExitCodeAndNoError,
}

impl ResultValidationRules {
    pub const fn from_flags(zero_exit_code: bool, no_error: bool) -> Self {
        match (zero_exit_code, no_error) {
            (false, false) => Self::None,
            (true, false) => Self::ZeroExitCode,
            (false, true) => Self::NoError,
            (true, true) => Self::ZeroExitCodeAndNoError,
        }
    }

    pub const fn requires_zero_exit_code(self) -> bool {
        matches!(self, Self::ZeroExitCode | Self::ZeroExitCodeAndNoError)
    }

    pub const fn requires_no_error(self) -> bool {
        matches!(self, Self::NoError | Self::ZeroExitCodeAndNoError)
    }

    /// Whether every rule in `other` is also part of `self`.
    pub const fn contains(self, other: Self) -> bool {
        (self.requires_zero_exit_code() || !other.requires_zero_exit_code())
            && (self.requires_no_error() || !other.requires_no_error())
    }

    /// The reason `result` breaks these rules, or `None` when it passes.
    ///
    /// The reason is the captured error text when there is any, and a
    /// generic exit code sentence otherwise.
    pub fn violation(self, result: &CliCommandResult) -> Option<String> {
        let bad_exit = self.requires_zero_exit_code() && result.exit_code() != 0;
        let bad_error = self.requires_no_error() && result.has_error();
        if !bad_exit && !bad_error {
            return None;
        }

        Some(if result.has_error() {
            result.error().to_string()
        } else {
            format!("The command exited with code {}.", result.exit_code())
        })
    }
}

impl BitOr for ResultValidationRules {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::from_flags(
            self.requires_zero_exit_code() || rhs.requires_zero_exit_code(),
            self.requires_no_error() || rhs.requires_no_error(),
        )
    }
}
