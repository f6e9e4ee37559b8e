//! Host operating system profile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Linux,
    #[serde(rename = "macos")]
    MacOs,
}

/// Command interpreter dialect the translator must target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShellDialect {
    Cmd,
    PowerShell,
    Posix,
}

/// Resolved once per session and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsProfile {
    pub family: OsFamily,
    pub shell: ShellDialect,
    pub cwd: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl OsProfile {
    pub fn new(family: OsFamily, shell: ShellDialect, cwd: impl Into<PathBuf>) -> Self {
        Self {
            family,
            shell,
            cwd: cwd.into(),
            version: None,
        }
    }

    /// Profile used when host detection is inconclusive.
    pub fn generic_posix(cwd: impl Into<PathBuf>) -> Self {
        Self::new(OsFamily::Linux, ShellDialect::Posix, cwd)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Program and leading arguments that run a single command line.
    pub fn interpreter(&self) -> (&'static str, &'static [&'static str]) {
        match self.shell {
            ShellDialect::Posix => ("sh", &["-c"]),
            ShellDialect::Cmd => ("cmd", &["/C"]),
            ShellDialect::PowerShell => ("powershell", &["-NoProfile", "-NonInteractive", "-Command"]),
        }
    }

    /// Syntax reminders embedded in translation prompts.
    pub fn syntax_hints(&self) -> Vec<&'static str> {
        let mut hints = match self.shell {
            ShellDialect::Posix => vec![
                "Use POSIX sh syntax; chain with && and pipe with |.",
                "Quote paths containing spaces with double quotes.",
                "Prefer portable flags over GNU-only extensions when possible.",
            ],
            ShellDialect::Cmd => vec![
                "Use cmd.exe syntax; chain with && and use %VAR% for variables.",
                "Use backslashes in paths and dir/del/copy instead of ls/rm/cp.",
            ],
            ShellDialect::PowerShell => vec![
                "Use PowerShell cmdlets such as Get-ChildItem and Remove-Item.",
                "Use $env:VAR for environment variables and ; to separate statements.",
            ],
        };
        match self.family {
            OsFamily::MacOs => {
                hints.push("This is macOS: BSD userland (sed -i '' , stat -f), Homebrew for packages.")
            }
            OsFamily::Linux => hints.push("This is Linux: GNU coreutils are usually available."),
            OsFamily::Windows => hints.push("This is Windows: paths use drive letters like C:\\."),
        }
        hints
    }

    pub fn describe(&self) -> String {
        let version = self
            .version
            .as_deref()
            .map(|v| format!(" ({})", v))
            .unwrap_or_default();
        format!(
            "{}{} using {}, working directory {}",
            self.family,
            version,
            self.shell,
            self.cwd.display()
        )
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OsFamily::Windows => "Windows",
            OsFamily::Linux => "Linux",
            OsFamily::MacOs => "macOS",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ShellDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShellDialect::Cmd => "cmd.exe",
            ShellDialect::PowerShell => "PowerShell",
            ShellDialect::Posix => "POSIX sh",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_posix_profile() {
        let profile = OsProfile::generic_posix("/tmp");
        assert_eq!(profile.family, OsFamily::Linux);
        assert_eq!(profile.shell, ShellDialect::Posix);
        assert_eq!(profile.interpreter(), ("sh", &["-c"][..]));
    }

    #[test]
    fn test_windows_interpreters() {
        let cmd = OsProfile::new(OsFamily::Windows, ShellDialect::Cmd, "C:\\");
        assert_eq!(cmd.interpreter().0, "cmd");
        let ps = OsProfile::new(OsFamily::Windows, ShellDialect::PowerShell, "C:\\");
        assert_eq!(ps.interpreter().0, "powershell");
        assert!(ps.syntax_hints().iter().any(|h| h.contains("Get-ChildItem")));
    }

    #[test]
    fn test_describe_includes_version() {
        let profile = OsProfile::new(OsFamily::MacOs, ShellDialect::Posix, "/Users/me")
            .with_version("14.2");
        let text = profile.describe();
        assert!(text.contains("macOS (14.2)"));
        assert!(text.contains("/Users/me"));
    }

    #[test]
    fn test_family_serialization() {
        let json = serde_json::to_string(&OsFamily::MacOs).unwrap();
        assert_eq!(json, r#""macos""#);
    }
}
