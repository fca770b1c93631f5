//! Secret reference resolver.
//!
//! OAuth values in `config.toml` can point at secrets stored outside the
//! file:
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - `file::/path` reads the first line of a file (systemd credentials, k8s secrets)
//! - anything else is used as-is

use std::path::Path;

/// A parsed secret reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef<'a> {
    /// Entry in the `pass` password store.
    Pass(&'a str),
    /// Environment variable.
    Env(&'a str),
    /// File on disk.
    File(&'a Path),
    /// Literal value.
    Plain(&'a str),
}

impl<'a> SecretRef<'a> {
    /// Classifies a configuration value.
    pub fn parse(value: &'a str) -> Self {
        if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else if let Some(path) = value.strip_prefix("file::") {
            Self::File(Path::new(path))
        } else {
            Self::Plain(value)
        }
    }

    /// Returns true for references, false for literal values.
    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }
}

/// Resolves a value that may contain a secret reference prefix.
pub fn resolve(value: &str) -> Result<String, String> {
    match SecretRef::parse(value) {
        SecretRef::Pass(path) => resolve_pass(path),
        SecretRef::Env(var) => resolve_env(var),
        SecretRef::File(path) => resolve_file(path),
        SecretRef::Plain(value) => Ok(value.to_string()),
    }
}

/// Runs `pass show <path>` and returns the first line of stdout.
fn resolve_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {}` failed (exit {}): {}",
            path,
            output.status,
            stderr.trim()
        ));
    }

    first_line(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| format!("`pass show {}` produced no output", path))
}

fn resolve_env(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
}

fn resolve_file(path: &Path) -> Result<String, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read secret file {}: {}", path.display(), e))?;
    first_line(&content).ok_or_else(|| format!("secret file {} is empty", path.display()))
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .next()
        .map(|line| line.trim_end().to_string())
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("hello").unwrap(), "hello");
        assert_eq!(resolve("").unwrap(), "");
        assert_eq!(resolve("abcdEFGHijkl").unwrap(), "abcdEFGHijkl");
        assert!(!SecretRef::parse("abcdEFGHijkl").is_reference());
    }

    #[test]
    fn prefixes_are_classified() {
        assert_eq!(SecretRef::parse("pass::zoom/secret"), SecretRef::Pass("zoom/secret"));
        assert_eq!(SecretRef::parse("env::ZOOM"), SecretRef::Env("ZOOM"));
        assert_eq!(
            SecretRef::parse("file::/run/credentials/zoom"),
            SecretRef::File(Path::new("/run/credentials/zoom"))
        );
    }

    #[test]
    fn env_prefix_resolves() {
        unsafe {
            std::env::set_var("_RECSYNC_TEST_SECRET", "my-secret-value");
        }
        assert_eq!(resolve("env::_RECSYNC_TEST_SECRET").unwrap(), "my-secret-value");
        unsafe {
            std::env::remove_var("_RECSYNC_TEST_SECRET");
        }
    }

    #[test]
    fn env_prefix_missing_var_errors() {
        let result = resolve("env::_RECSYNC_NONEXISTENT_VAR_12345");
        assert!(result.unwrap_err().contains("not set"));
    }

    #[test]
    fn file_prefix_reads_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "s3cr3t  \nsecond line\n").unwrap();
        assert_eq!(resolve(&format!("file::{}", path.display())).unwrap(), "s3cr3t");

        std::fs::write(&path, "").unwrap();
        assert!(resolve(&format!("file::{}", path.display())).unwrap_err().contains("empty"));
    }

    #[test]
    fn pass_prefix_missing_entry_errors() {
        // Fails whether or not `pass` is installed.
        let result = resolve("pass::nonexistent/entry/that/should/not/exist/12345");
        assert!(result.is_err());
    }
}
