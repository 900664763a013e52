//! Binary resolution and trusted-path classification.
//!
//! Subprocess adapters resolve their CLI through [`Discovery`]: a PATH walk
//! extended with configured extra directories, plus a prefix check against
//! an operator-controlled allow-list that feeds the `trusted` detection
//! signal.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::config::DiscoveryConfig;

/// Directories whose binaries are considered trusted by default.
const DEFAULT_TRUSTED_PATHS: &[&str] = &[
    "/opt/homebrew/bin",
    "/usr/local/bin",
    "/usr/bin",
    "~/.local/bin",
];

/// Extra search directories appended after PATH by default.
const DEFAULT_EXTRA_PATHS: &[&str] = &["~/bin", "~/.local/bin"];

#[derive(Debug, Clone)]
pub struct Discovery {
    extra_paths: Vec<PathBuf>,
    trusted_paths: Vec<PathBuf>,
}

impl Default for Discovery {
    fn default() -> Self {
        Self {
            extra_paths: expand_all(DEFAULT_EXTRA_PATHS.iter().copied()),
            trusted_paths: expand_all(DEFAULT_TRUSTED_PATHS.iter().copied()),
        }
    }
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            extra_paths: expand_all(config.extra_paths.iter().map(String::as_str)),
            trusted_paths: expand_all(config.trusted_paths.iter().map(String::as_str)),
        }
    }

    /// Resolve `name` against PATH and the configured extra directories.
    pub fn find_binary(&self, name: &str) -> Option<PathBuf> {
        let path_dirs = env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect::<Vec<_>>())
            .unwrap_or_default();
        find_in_dirs(name, path_dirs.iter().chain(&self.extra_paths))
    }

    /// Whether `binary` sits under one of the allow-listed prefixes.
    pub fn is_trusted(&self, binary: &Path) -> bool {
        self.trusted_paths
            .iter()
            .any(|prefix| binary.starts_with(prefix))
    }
}

fn find_in_dirs<'a>(name: &str, dirs: impl Iterator<Item = &'a PathBuf>) -> Option<PathBuf> {
    for dir in dirs {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn expand_all<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<PathBuf> {
    paths.map(expand_home).collect()
}

/// Expand a leading `~/` against `$HOME`. Paths without it pass through.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Ok(home) = env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trusted_matches_on_prefix() {
        let discovery = Discovery {
            extra_paths: Vec::new(),
            trusted_paths: vec![PathBuf::from("/usr/bin"), PathBuf::from("/usr/local/bin")],
        };
        assert!(discovery.is_trusted(Path::new("/usr/bin/ollama")));
        assert!(discovery.is_trusted(Path::new("/usr/local/bin/claude")));
        assert!(!discovery.is_trusted(Path::new("/tmp/ollama")));
        // Component-wise, not string-prefix: /usr/binx must not match.
        assert!(!discovery.is_trusted(Path::new("/usr/binx/ollama")));
    }

    #[test]
    fn expand_home_rewrites_tilde() {
        let home = env::var("HOME").unwrap_or_default();
        if home.is_empty() {
            return;
        }
        assert_eq!(expand_home("~/bin"), PathBuf::from(&home).join("bin"));
        assert_eq!(expand_home("/usr/bin"), PathBuf::from("/usr/bin"));
    }

    #[cfg(unix)]
    #[test]
    fn find_in_dirs_requires_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let plain = temp.path().join("tool");
        fs::write(&plain, "#!/bin/sh\n").expect("write");

        let dirs = vec![temp.path().to_path_buf()];
        assert_eq!(find_in_dirs("tool", dirs.iter()), None);

        let mut perms = fs::metadata(&plain).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&plain, perms).expect("chmod");
        assert_eq!(find_in_dirs("tool", dirs.iter()), Some(plain));
    }

    #[test]
    fn find_in_dirs_misses_absent_binary() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dirs = vec![temp.path().to_path_buf()];
        assert_eq!(find_in_dirs("missing", dirs.iter()), None);
    }
}
