use bashai_protocol::{OsFamily, OsProfile, ShellDialect};
use std::env;
use std::path::PathBuf;
use sysinfo::System;

/// Environment variable that forces a shell dialect (`sh`, `cmd`, `powershell`).
pub const SHELL_OVERRIDE_VAR: &str = "BASHAI_SHELL";

/// Detect the host profile. Falls back to a generic POSIX profile when the
/// platform is not one of the supported families.
pub fn resolve() -> OsProfile {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let shell_override = env::var(SHELL_OVERRIDE_VAR).ok();

    let mut profile = resolve_from(env::consts::OS, shell_override.as_deref(), cwd);
    if let Some(version) = System::long_os_version() {
        profile = profile.with_version(version);
    }

    tracing::info!("Resolved OS profile: {}", profile.describe());
    profile
}

/// Detection core, separated from the process environment.
pub fn resolve_from(os: &str, shell_override: Option<&str>, cwd: PathBuf) -> OsProfile {
    let Some(family) = detect_family(os) else {
        tracing::warn!("Unrecognized OS '{}', using generic POSIX profile", os);
        return OsProfile::generic_posix(cwd);
    };

    let shell = shell_override
        .and_then(parse_shell)
        .unwrap_or(match family {
            // cmd.exe is what a plain shell invocation reaches on Windows.
            OsFamily::Windows => ShellDialect::Cmd,
            OsFamily::Linux | OsFamily::MacOs => ShellDialect::Posix,
        });

    OsProfile::new(family, shell, cwd)
}

fn detect_family(os: &str) -> Option<OsFamily> {
    match os.to_lowercase().as_str() {
        "windows" => Some(OsFamily::Windows),
        "linux" => Some(OsFamily::Linux),
        "macos" | "darwin" => Some(OsFamily::MacOs),
        _ => None,
    }
}

fn parse_shell(value: &str) -> Option<ShellDialect> {
    match value.trim().to_lowercase().as_str() {
        "cmd" | "cmd.exe" => Some(ShellDialect::Cmd),
        "powershell" | "pwsh" | "ps" => Some(ShellDialect::PowerShell),
        "sh" | "bash" | "zsh" | "posix" => Some(ShellDialect::Posix),
        other => {
            tracing::warn!("Ignoring unknown {} value: {}", SHELL_OVERRIDE_VAR, other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_families() {
        let linux = resolve_from("linux", None, PathBuf::from("/home/u"));
        assert_eq!(linux.family, OsFamily::Linux);
        assert_eq!(linux.shell, ShellDialect::Posix);

        let mac = resolve_from("macos", None, PathBuf::from("/Users/u"));
        assert_eq!(mac.family, OsFamily::MacOs);

        let win = resolve_from("windows", None, PathBuf::from("C:\\"));
        assert_eq!(win.family, OsFamily::Windows);
        assert_eq!(win.shell, ShellDialect::Cmd);
    }

    #[test]
    fn test_unknown_family_falls_back_to_posix() {
        let profile = resolve_from("freebsd", Some("cmd"), PathBuf::from("/"));
        assert_eq!(profile, OsProfile::generic_posix("/"));
    }

    #[test]
    fn test_shell_override() {
        let win = resolve_from("windows", Some("pwsh"), PathBuf::from("C:\\"));
        assert_eq!(win.shell, ShellDialect::PowerShell);

        let bogus = resolve_from("linux", Some("fish-ish"), PathBuf::from("/"));
        assert_eq!(bogus.shell, ShellDialect::Posix);
    }

    #[test]
    fn test_resolve_is_stable() {
        let a = resolve();
        let b = resolve();
        assert_eq!(a, b);
        assert!(!a.cwd.as_os_str().is_empty());
    }
}
