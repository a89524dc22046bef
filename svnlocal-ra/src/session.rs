//! Local repository sessions
//!
//! `RaSession` is the access capability a client drives; `LocalSession`
//! implements it directly on top of a repository on local disk. The
//! session keeps the repository open until `close`, after which every
//! operation fails with `SessionClosed`.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use svnlocal_fs::{path, Filesystem, LogEntry, NodeKind, Repository, Revnum};
use svnlocal_repos::{checkout, CommitEditor, Editor, Report, ReportParams};

use crate::auth::AuthProvider;
use crate::commit::CommitSlots;
use crate::error::{RaError, Result};
use crate::file::{copy_chunked, FetchedFile};
use crate::location::split_url;
use crate::pipe::{entry_properties, PipeEditor};

/// Receives one log entry per matching revision
pub type LogReceiver<'r> = dyn FnMut(&LogEntry) -> svnlocal_fs::Result<()> + 'r;

/// Accumulates a client's state for an update, switch or status
pub trait Reporter {
    /// The client has `path` (relative to the report anchor) at `revision`
    fn set_path(&mut self, path: &str, revision: Revnum) -> Result<()>;

    /// The client has nothing at `path`
    fn delete_path(&mut self, path: &str) -> Result<()>;

    /// Drive the editor to the target revision; returns that revision
    fn finish_report(self: Box<Self>) -> Result<Revnum>;

    fn abort_report(self: Box<Self>) -> Result<()>;
}

/// Repository access operations. `None` for a revision means the
/// youngest one.
pub trait RaSession {
    /// Release the repository; later calls fail with `SessionClosed`
    fn close(&mut self) -> Result<()>;

    fn latest_revision(&self) -> Result<Revnum>;

    /// Latest revision committed at or before `tm`
    fn dated_revision(&self, tm: &DateTime<Utc>) -> Result<Revnum>;

    /// Editor committing to a new transaction based on the youngest
    /// revision. On success `slots` receive the new revision's identity.
    fn commit_editor<'a>(
        &self,
        log_message: &str,
        slots: CommitSlots<'a>,
    ) -> Result<Box<dyn Editor + 'a>>;

    fn do_checkout(&self, revision: Option<Revnum>, recurse: bool, editor: &mut dyn Editor) -> Result<()>;

    fn do_update<'a>(
        &self,
        revision: Option<Revnum>,
        target: Option<&str>,
        recurse: bool,
        editor: Box<dyn Editor + 'a>,
    ) -> Result<Box<dyn Reporter + 'a>>;

    fn do_switch<'a>(
        &self,
        revision: Option<Revnum>,
        target: Option<&str>,
        recurse: bool,
        switch_url: &str,
        editor: Box<dyn Editor + 'a>,
    ) -> Result<Box<dyn Reporter + 'a>>;

    /// Like an update to the youngest revision, without file text
    fn do_status<'a>(
        &self,
        target: Option<&str>,
        recurse: bool,
        editor: Box<dyn Editor + 'a>,
    ) -> Result<Box<dyn Reporter + 'a>>;

    /// `paths` are relative to the session's location
    fn get_log(
        &self,
        paths: &[&str],
        start: Revnum,
        end: Revnum,
        discover_changed_paths: bool,
        receiver: &mut LogReceiver<'_>,
    ) -> Result<()>;

    fn check_path(&self, path: &str, revision: Option<Revnum>) -> Result<NodeKind>;

    /// Stream the file's text to `sink`; with `want_props` also return its
    /// properties and entry properties
    fn get_file(
        &self,
        path: &str,
        revision: Option<Revnum>,
        sink: &mut dyn Write,
        want_props: bool,
    ) -> Result<FetchedFile>;

    fn uuid(&self) -> Result<String>;

    fn repos_root(&self) -> Result<PathBuf>;

    /// In-repository path the session is located at
    fn fs_path(&self) -> Result<String>;

    fn username(&self) -> Result<String>;
}

#[derive(Debug)]
struct OpenSession {
    repos: Repository,
    fs_path: String,
    username: String,
}

#[derive(Debug)]
pub struct LocalSession {
    url: String,
    repos_root: PathBuf,
    state: Option<OpenSession>,
}

impl LocalSession {
    pub fn open(url: &str, auth: &dyn AuthProvider) -> Result<Self> {
        let username = auth.username()?;
        let (repos_root, fs_path) = split_url(url)?;
        let repos = Repository::open(&repos_root).map_err(|source| RaError::StoreOpen {
            path: repos_root.clone(),
            source,
        })?;
        info!(url, repos = %repos_root.display(), fs_path = %fs_path, user = %username, "session opened");
        Ok(Self {
            url: url.to_string(),
            repos_root,
            state: Some(OpenSession {
                repos,
                fs_path,
                username,
            }),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn state(&self) -> Result<&OpenSession> {
        self.state.as_ref().ok_or(RaError::SessionClosed)
    }

    fn fs(&self) -> Result<&Filesystem> {
        Ok(self.state()?.repos.fs())
    }

    fn abs_path(&self, rel_path: &str) -> Result<String> {
        Ok(path::join(&self.state()?.fs_path, rel_path))
    }

    /// `None` is the youngest revision; anything past it is an error
    fn resolve_revision(&self, revision: Option<Revnum>) -> Result<Revnum> {
        let youngest = self.fs()?.youngest()?;
        match revision {
            None => Ok(youngest),
            Some(revision) if revision <= youngest => Ok(revision),
            Some(revision) => Err(RaError::NoSuchRevision { revision, youngest }),
        }
    }

    fn begin_report<'a>(
        &self,
        params: ReportParams,
        editor: PipeEditor<Box<dyn Editor + 'a>>,
    ) -> Result<Box<dyn Reporter + 'a>> {
        debug!(?params, "report started");
        Ok(Box::new(LocalReporter {
            fs: self.fs()?.clone(),
            report: Report::new(params),
            editor,
        }))
    }
}

/// Narrowed report target, if any. It must name a single entry of the
/// anchor directory.
fn report_target(target: Option<&str>) -> Result<Option<String>> {
    let Some(target) = target.map(path::canonicalize_relative) else {
        return Ok(None);
    };
    if target.contains('/') {
        return Err(RaError::InvalidTarget(target));
    }
    Ok(Some(target).filter(|t| !t.is_empty()))
}

impl RaSession for LocalSession {
    fn close(&mut self) -> Result<()> {
        let state = self.state.take().ok_or(RaError::SessionClosed)?;
        info!(url = %self.url, repos = %state.repos.path().display(), "session closed");
        Ok(())
    }

    fn latest_revision(&self) -> Result<Revnum> {
        Ok(self.fs()?.youngest()?)
    }

    fn dated_revision(&self, tm: &DateTime<Utc>) -> Result<Revnum> {
        Ok(self.fs()?.dated_revision(tm)?)
    }

    fn commit_editor<'a>(
        &self,
        log_message: &str,
        slots: CommitSlots<'a>,
    ) -> Result<Box<dyn Editor + 'a>> {
        let state = self.state()?;
        let fs = state.repos.fs();
        let txn = fs.begin_txn(fs.youngest()?, Some(state.username.as_str()), log_message)?;
        debug!(base = txn.base_revision(), fs_path = %state.fs_path, "commit editor created");
        Ok(Box::new(CommitEditor::new(txn, &state.fs_path, slots.into_hook())))
    }

    fn do_checkout(&self, revision: Option<Revnum>, recurse: bool, editor: &mut dyn Editor) -> Result<()> {
        let revision = self.resolve_revision(revision)?;
        let state = self.state()?;
        info!(fs_path = %state.fs_path, revision, recurse, "checkout");
        let mut piped = PipeEditor::new(editor, state.repos.fs().clone(), &state.fs_path);
        checkout(state.repos.fs(), &state.fs_path, revision, recurse, &mut piped)?;
        Ok(())
    }

    fn do_update<'a>(
        &self,
        revision: Option<Revnum>,
        target: Option<&str>,
        recurse: bool,
        editor: Box<dyn Editor + 'a>,
    ) -> Result<Box<dyn Reporter + 'a>> {
        let state = self.state()?;
        let target = report_target(target)?;
        let tgt_path = path::join(&state.fs_path, target.as_deref().unwrap_or(""));
        let piped = PipeEditor::new(editor, state.repos.fs().clone(), &state.fs_path);
        self.begin_report(
            ReportParams {
                fs_base: state.fs_path.clone(),
                target,
                tgt_path,
                revision,
                text_deltas: true,
                recurse,
            },
            piped,
        )
    }

    fn do_switch<'a>(
        &self,
        revision: Option<Revnum>,
        target: Option<&str>,
        recurse: bool,
        switch_url: &str,
        editor: Box<dyn Editor + 'a>,
    ) -> Result<Box<dyn Reporter + 'a>> {
        let state = self.state()?;
        let (switch_root, switch_path) = split_url(switch_url)?;
        if switch_root != self.repos_root {
            return Err(RaError::RepositoryMismatch {
                session_root: self.repos_root.clone(),
                switch_root,
            });
        }

        let target = report_target(target)?;
        let fs = state.repos.fs().clone();
        // Switching a single entry: the edit stays anchored on the parent,
        // but that entry's metadata comes from the switch destination.
        let piped = match &target {
            Some(entry) => PipeEditor::new(editor, fs, &path::dirname(&switch_path))
                .with_renamed_entry(entry, &switch_path),
            None => PipeEditor::new(editor, fs, &switch_path),
        };
        self.begin_report(
            ReportParams {
                fs_base: state.fs_path.clone(),
                target,
                tgt_path: switch_path,
                revision,
                text_deltas: true,
                recurse,
            },
            piped,
        )
    }

    fn do_status<'a>(
        &self,
        target: Option<&str>,
        recurse: bool,
        editor: Box<dyn Editor + 'a>,
    ) -> Result<Box<dyn Reporter + 'a>> {
        let state = self.state()?;
        let target = report_target(target)?;
        let tgt_path = path::join(&state.fs_path, target.as_deref().unwrap_or(""));
        let piped = PipeEditor::new(editor, state.repos.fs().clone(), &state.fs_path);
        self.begin_report(
            ReportParams {
                fs_base: state.fs_path.clone(),
                target,
                tgt_path,
                revision: None,
                text_deltas: false,
                recurse,
            },
            piped,
        )
    }

    fn get_log(
        &self,
        paths: &[&str],
        start: Revnum,
        end: Revnum,
        discover_changed_paths: bool,
        receiver: &mut LogReceiver<'_>,
    ) -> Result<()> {
        let abs_paths = paths
            .iter()
            .map(|p| self.abs_path(p))
            .collect::<Result<Vec<_>>>()?;
        debug!(?abs_paths, start, end, "get log");
        self.fs()?
            .get_logs(&abs_paths, start, end, discover_changed_paths, receiver)?;
        Ok(())
    }

    fn check_path(&self, path: &str, revision: Option<Revnum>) -> Result<NodeKind> {
        let revision = self.resolve_revision(revision)?;
        let abs_path = self.abs_path(path)?;
        Ok(self.fs()?.revision_root(revision)?.check_path(&abs_path)?)
    }

    fn get_file(
        &self,
        path: &str,
        revision: Option<Revnum>,
        sink: &mut dyn Write,
        want_props: bool,
    ) -> Result<FetchedFile> {
        let revision = self.resolve_revision(revision)?;
        let abs_path = self.abs_path(path)?;
        let root = self.fs()?.revision_root(revision)?;

        let mut contents = root.file_stream(&abs_path)?;
        let bytes = copy_chunked(&mut contents, sink)?;
        debug!(path = %abs_path, revision, bytes, "fetched file");

        let props = if want_props {
            let mut props = root.node_proplist(&abs_path)?;
            let info = root.committed_info(&abs_path)?;
            for (name, value) in entry_properties(&info) {
                props.insert(name.to_string(), value);
            }
            Some(props)
        } else {
            None
        };
        Ok(FetchedFile { revision, props })
    }

    fn uuid(&self) -> Result<String> {
        Ok(self.state()?.repos.uuid().to_string())
    }

    fn repos_root(&self) -> Result<PathBuf> {
        self.state()?;
        Ok(self.repos_root.clone())
    }

    fn fs_path(&self) -> Result<String> {
        Ok(self.state()?.fs_path.clone())
    }

    fn username(&self) -> Result<String> {
        Ok(self.state()?.username.clone())
    }
}

struct LocalReporter<'a> {
    fs: Filesystem,
    report: Report,
    editor: PipeEditor<Box<dyn Editor + 'a>>,
}

impl Reporter for LocalReporter<'_> {
    fn set_path(&mut self, path: &str, revision: Revnum) -> Result<()> {
        self.report.set_path(path, revision);
        Ok(())
    }

    fn delete_path(&mut self, path: &str) -> Result<()> {
        self.report.delete_path(path);
        Ok(())
    }

    fn finish_report(self: Box<Self>) -> Result<Revnum> {
        let LocalReporter { fs, report, mut editor } = *self;
        Ok(report.finish(&fs, &mut editor)?)
    }

    fn abort_report(self: Box<Self>) -> Result<()> {
        self.report.abort();
        Ok(())
    }
}
