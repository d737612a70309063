/// Elevation strategies and the checks used to pick one.
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::Command;

/// pkexec exits with 126 when the user dismisses the dialog and 127 when
/// authentication fails.
const PKEXEC_DENIAL_CODES: &[i32] = &[126, 127];

/// Which strategy the user asked for in the config or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationPreference {
    /// Root if already root, sudo from a terminal, otherwise pkexec.
    #[default]
    Auto,
    Direct,
    Sudo,
    Pkexec,
}

/// How the tool is launched with elevated rights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elevation {
    /// The process already holds the rights it needs; no wrapper.
    Direct,
    /// `sudo -v` once, then `sudo -n -- <tool>` for every run.
    Sudo { program: PathBuf },
    /// `pkexec <tool>` for every run. polkit decides per run whether to
    /// prompt, so there is no up-front step.
    Pkexec { program: PathBuf },
}

impl Elevation {
    /// Resolve a preference into a concrete strategy.
    pub fn resolve(preference: ElevationPreference) -> Self {
        match preference {
            ElevationPreference::Direct => Self::Direct,
            ElevationPreference::Sudo => Self::sudo(),
            ElevationPreference::Pkexec => Self::pkexec(),
            ElevationPreference::Auto => Self::pick(
                is_elevated(),
                io::stdin().is_terminal(),
                which::which("sudo").ok(),
                which::which("pkexec").ok(),
            ),
        }
    }

    /// Auto selection. Root needs no wrapper. With a terminal, sudo wins
    /// because its timestamp lets later runs go through without a prompt;
    /// pkexec asks on every run and is only used when nothing else works.
    fn pick(
        elevated: bool,
        interactive: bool,
        sudo: Option<PathBuf>,
        pkexec: Option<PathBuf>,
    ) -> Self {
        if elevated {
            return Self::Direct;
        }
        match (sudo, pkexec) {
            (Some(program), _) if interactive => Self::Sudo { program },
            (_, Some(program)) => Self::Pkexec { program },
            (Some(program), None) => Self::Sudo { program },
            (None, None) => Self::sudo(),
        }
    }

    fn sudo() -> Self {
        Self::Sudo {
            program: which::which("sudo").unwrap_or_else(|_| PathBuf::from("sudo")),
        }
    }

    fn pkexec() -> Self {
        Self::Pkexec {
            program: which::which("pkexec").unwrap_or_else(|_| PathBuf::from("pkexec")),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Sudo { .. } => "sudo",
            Self::Pkexec { .. } => "pkexec",
        }
    }

    /// The interactive command that establishes rights, if the strategy
    /// needs one. It inherits the terminal so prompts reach the user.
    pub(crate) fn acquire_command(&self) -> Option<Command> {
        match self {
            Self::Sudo { program } => {
                let mut cmd = Command::new(program);
                cmd.arg("-v");
                Some(cmd)
            }
            // pkexec grants nothing reusable; each run authorizes itself.
            Self::Direct | Self::Pkexec { .. } => None,
        }
    }

    /// Wrap `executable args...` so it runs with elevated rights.
    pub(crate) fn command(&self, executable: &Path, args: &[OsString]) -> Command {
        let mut cmd = match self {
            Self::Direct => Command::new(executable),
            Self::Sudo { program } => {
                let mut cmd = Command::new(program);
                cmd.arg("-n").arg("--").arg(executable);
                cmd
            }
            Self::Pkexec { program } => {
                let mut cmd = Command::new(program);
                cmd.arg(executable);
                cmd
            }
        };
        cmd.args(args);
        cmd
    }

    /// Exit codes of the wrapper that mean "not authorized" rather than
    /// "the tool failed".
    pub(crate) fn denial_codes(&self) -> &'static [i32] {
        match self {
            Self::Pkexec { .. } => PKEXEC_DENIAL_CODES,
            Self::Direct | Self::Sudo { .. } => &[],
        }
    }
}

/// Check whether the current process runs with an effective uid of 0.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}
