//! Repository hook support
//!
//! Two hooks are honoured:
//! - pre-commit: runs before a transaction is published (can reject)
//! - post-commit: runs after a revision is published (notification)
//!
//! Hook scripts receive data on stdin and must exit with code 0 to succeed.
//! For pre-commit, a non-zero exit rejects the commit and stderr/stdout is
//! returned as the error message.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::object::{ChangedPath, Revnum};
use std::collections::BTreeMap;

/// Manages hook scripts for a repository.
#[derive(Debug, Clone)]
pub struct HookManager {
    hooks_dir: PathBuf,
}

impl HookManager {
    /// Hooks are expected in `<repo_root>/hooks/`.
    pub fn new(repo_path: &Path) -> Self {
        Self {
            hooks_dir: repo_path.join("hooks"),
        }
    }

    /// Return the path to a named hook script.
    pub fn hook_path(&self, name: &str) -> PathBuf {
        self.hooks_dir.join(name)
    }

    /// Execute a hook script, piping `stdin_data` to its stdin.
    /// A missing hook counts as success.
    fn run_hook(&self, name: &str, stdin_data: &str) -> Result<()> {
        let hook_path = self.hook_path(name);
        if !hook_path.exists() {
            return Ok(());
        }

        let failed = |message: String| Error::HookFailed {
            name: name.to_string(),
            message,
        };

        let mut child = Command::new(&hook_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("SVNLOCAL_REPOS", self.hooks_dir.parent().unwrap_or(Path::new(".")))
            .spawn()
            .map_err(|e| failed(format!("failed to execute: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(stdin_data.as_bytes());
        }

        let output = child
            .wait_with_output()
            .map_err(|e| failed(format!("failed to wait: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let msg = if !stderr.trim().is_empty() {
            stderr.trim().to_string()
        } else if !stdout.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            format!("exited with code {}", output.status.code().unwrap_or(-1))
        };
        Err(failed(msg))
    }

    /// Run the **pre-commit** hook for a transaction based on `base_rev`.
    pub fn run_pre_commit(
        &self,
        base_rev: Revnum,
        author: Option<&str>,
        log: &str,
        changes: &BTreeMap<String, ChangedPath>,
    ) -> Result<()> {
        let mut data = String::new();
        data.push_str(&format!("BASE: {}\n", base_rev));
        data.push_str(&format!("AUTHOR: {}\n", author.unwrap_or("")));
        data.push_str(&format!("LOG: {}\n", log));
        data.push_str("FILES:\n");
        for (path, change) in changes {
            data.push_str(&format!("{} {}\n", change.action.as_char(), path));
        }
        self.run_hook("pre-commit", &data)
    }

    /// Run the **post-commit** hook. Failures are logged, never returned:
    /// the revision is already published.
    pub fn run_post_commit(&self, rev: Revnum, author: Option<&str>, log: &str, date: &str) {
        let mut data = String::new();
        data.push_str(&format!("REVISION: {}\n", rev));
        data.push_str(&format!("AUTHOR: {}\n", author.unwrap_or("")));
        data.push_str(&format!("DATE: {}\n", date));
        data.push_str(&format!("LOG: {}\n", log));
        if let Err(e) = self.run_hook("post-commit", &data) {
            tracing::warn!("post-commit hook error (ignored): {}", e);
        }
    }

    /// Ensure the hooks directory exists (creates it if missing).
    pub fn ensure_hooks_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.hooks_dir)?;
        Ok(())
    }
}
