//! Client state reports
//!
//! A `Report` accumulates what a client says it has, then drives an editor
//! with the edits that bring it to a target revision. `finish` and `abort`
//! consume the report, so it cannot be reused.

use tracing::{debug, info};

use svnlocal_fs::{path, Error, Filesystem, Result, Revnum};

use crate::delta::{ClientState, DeltaDriver, DeltaOptions};
use crate::editor::Editor;

/// Fixed parameters of one synchronization
#[derive(Debug, Clone)]
pub struct ReportParams {
    /// Repository path the reported paths are relative to
    pub fs_base: String,
    /// Single entry of `fs_base` the report is narrowed to
    pub target: Option<String>,
    /// Repository path the client is brought to: `fs_base` itself for an
    /// update, the switch destination for a switch
    pub tgt_path: String,
    /// Target revision; `None` means the youngest at finish time
    pub revision: Option<Revnum>,
    pub text_deltas: bool,
    pub recurse: bool,
}

/// An accumulating client state report
#[derive(Debug)]
pub struct Report {
    params: ReportParams,
    client: ClientState,
}

impl Report {
    pub fn new(params: ReportParams) -> Self {
        Self {
            params,
            client: ClientState::empty(),
        }
    }

    pub fn params(&self) -> &ReportParams {
        &self.params
    }

    /// The client has `path` at `revision`
    pub fn set_path(&mut self, path: &str, revision: Revnum) {
        debug!(path, revision, "report: set path");
        self.client.claim(path, Some(revision));
    }

    /// The client has nothing at `path`
    pub fn delete_path(&mut self, path: &str) {
        debug!(path, "report: delete path");
        self.client.claim(path, None);
    }

    /// Resolve the target revision, then drive `editor` from the reported
    /// state to it. Returns the revision the editor was driven to.
    pub fn finish(self, fs: &Filesystem, editor: &mut dyn Editor) -> Result<Revnum> {
        let youngest = fs.youngest()?;
        let revision = match self.params.revision {
            Some(rev) if rev <= youngest => rev,
            _ => youngest,
        };
        if let Some(bad) = self.client.revisions().find(|&rev| rev > youngest) {
            return Err(Error::NoSuchRevision(bad));
        }
        if let Some(target) = &self.params.target {
            check_target(target)?;
        }

        let target = fs.revision_root(revision)?;
        let options = DeltaOptions {
            text_deltas: self.params.text_deltas,
            recurse: self.params.recurse,
        };
        info!(
            fs_base = %self.params.fs_base,
            tgt_path = %self.params.tgt_path,
            revision,
            "finishing report"
        );

        editor.set_target_revision(revision)?;
        DeltaDriver::new(
            &self.client,
            &path::canonicalize(&self.params.fs_base),
            &target,
            self.params.target.as_deref(),
            &self.params.tgt_path,
            options,
        )
        .drive(editor)?;
        Ok(revision)
    }

    /// Discard every assertion
    pub fn abort(self) {
        debug!(fs_base = %self.params.fs_base, "report aborted");
    }
}

/// A report target names one entry of the anchor directory
pub fn check_target(target: &str) -> Result<()> {
    if path::canonicalize_relative(target).contains('/') {
        return Err(Error::InvalidTarget(target.to_string()));
    }
    Ok(())
}
