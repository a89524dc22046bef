//! Command implementations

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use svnlocal_fs::{entry_props, path, LogEntry, NodeKind, PropMap, Repository, Revnum};
use svnlocal_ra::{
    split_url, to_url, AuthProvider, CommitSlots, RaSession, StaticAuth, SystemAuth,
};
use svnlocal_repos::{EditOp, Editor, RecordingEditor, TextDelta};

use crate::config::Config;
use crate::wc::{WcState, WcWriter, STATE_FILE};

pub struct Client {
    config: Config,
    username: Option<String>,
}

impl Client {
    pub fn new(config: Config, username: Option<String>) -> Self {
        Self { config, username }
    }

    fn auth(&self) -> Box<dyn AuthProvider> {
        match self.username.as_ref().or(self.config.username.as_ref()) {
            Some(name) => Box::new(StaticAuth::new(name.clone())),
            None => Box::new(SystemAuth),
        }
    }

    fn open(&self, url: &str) -> Result<Box<dyn RaSession>> {
        svnlocal_ra::init()
            .open(url, self.auth().as_ref())
            .with_context(|| format!("Unable to open a session to {url}"))
    }

    fn log_message(&self, message: Option<String>) -> Result<String> {
        message
            .or_else(|| self.config.log_message.clone())
            .ok_or_else(|| anyhow!("A log message is required (use -m)"))
    }

    pub fn create(&self, path: &Path) -> Result<()> {
        let path = std::path::absolute(path)
            .with_context(|| format!("Invalid repository path {}", path.display()))?;
        let repos = Repository::create(&path)
            .with_context(|| format!("Failed to create repository at {}", path.display()))?;
        println!(
            "Created repository {} (UUID: {})",
            to_url(&path, "/")?,
            repos.uuid()
        );
        Ok(())
    }

    pub fn youngest(&self, url: &str) -> Result<()> {
        println!("{}", self.open(url)?.latest_revision()?);
        Ok(())
    }

    pub fn checkout(&self, url: &str, dir: &Path, revision: Option<Revnum>, recurse: bool) -> Result<()> {
        if dir.join(STATE_FILE).exists() {
            bail!("{} is already a working copy", dir.display());
        }
        let session = self.open(url)?;
        let mut writer = WcWriter::new(dir, BTreeSet::new());
        session
            .do_checkout(revision, recurse, &mut writer)
            .with_context(|| format!("Checkout of {url} failed"))?;

        let revision = writer
            .target_revision
            .context("Checkout finished without a target revision")?;
        WcState {
            url: url.to_string(),
            revision,
            recursive: recurse,
            entries: writer.entries,
        }
        .save(dir)?;
        println!("Checked out revision {revision}.");
        Ok(())
    }

    /// Update the working copy at `dir`; a `url` other than the one it
    /// was checked out from switches it there.
    pub fn update(&self, url: &str, dir: &Path, revision: Option<Revnum>) -> Result<()> {
        let mut state = WcState::load(dir)?;
        let session = self.open(&state.url)?;
        let missing = state.missing(dir);
        let mut writer = WcWriter::new(dir, state.entries.clone());

        let reached = {
            let editor: Box<dyn Editor + '_> = Box::new(&mut writer);
            let mut reporter = if url == state.url {
                session.do_update(revision, None, state.recursive, editor)?
            } else {
                session.do_switch(revision, None, state.recursive, url, editor)?
            };
            reporter.set_path("", state.revision)?;
            for path in &missing {
                debug!(path, "reporting missing entry");
                reporter.delete_path(path)?;
            }
            reporter
                .finish_report()
                .with_context(|| format!("Update of {} failed", dir.display()))?
        };

        state.url = url.to_string();
        state.revision = reached;
        state.entries = writer.entries;
        state.save(dir)?;
        if writer.added + writer.updated + writer.deleted == 0 {
            println!("At revision {reached}.");
        } else {
            println!(
                "Updated to revision {reached} ({} added, {} updated, {} deleted).",
                writer.added, writer.updated, writer.deleted
            );
        }
        Ok(())
    }

    pub fn status(&self, url: &str, dir: &Path) -> Result<()> {
        let state = WcState::load(dir)?;
        if url != state.url {
            warn!(url, wc_url = %state.url, "working copy was checked out from another URL");
        }
        let session = self.open(&state.url)?;
        let mut recorder = RecordingEditor::new();
        let revision = {
            let mut reporter = session.do_status(None, state.recursive, Box::new(&mut recorder))?;
            reporter.set_path("", state.revision)?;
            for path in state.missing(dir) {
                reporter.delete_path(&path)?;
            }
            reporter.finish_report()?
        };

        for (code, path) in status_lines(&recorder.ops) {
            println!("{code}       {path}");
        }
        println!("Status against revision: {revision:>6}");
        Ok(())
    }

    pub fn cat(&self, url: &str, revision: Option<Revnum>) -> Result<()> {
        let session = self.open(url)?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        session.get_file("", revision, &mut out, false)?;
        out.flush()?;
        Ok(())
    }

    pub fn info(&self, url: &str, revision: Option<Revnum>) -> Result<()> {
        let session = self.open(url)?;
        let kind = session.check_path("", revision)?;
        let revision = match revision {
            Some(rev) => rev,
            None => session.latest_revision()?,
        };
        let props = match kind {
            NodeKind::None => bail!("{url}: not found in revision {revision}"),
            NodeKind::File => session
                .get_file("", Some(revision), &mut io::sink(), true)?
                .props
                .unwrap_or_default(),
            NodeKind::Dir => {
                let mut collector = RootEntryProps::default();
                session.do_checkout(Some(revision), false, &mut collector)?;
                collector.props
            }
        };

        println!("URL: {url}");
        println!("Repository Root: {}", to_url(&session.repos_root()?, "/")?);
        println!("Repository UUID: {}", session.uuid()?);
        println!("Revision: {revision}");
        println!(
            "Node Kind: {}",
            if kind == NodeKind::Dir { "directory" } else { "file" }
        );
        for (label, name) in [
            ("Last Changed Author", entry_props::LAST_AUTHOR),
            ("Last Changed Rev", entry_props::COMMITTED_REV),
            ("Last Changed Date", entry_props::COMMITTED_DATE),
        ] {
            if let Some(value) = props.get(name) {
                println!("{label}: {value}");
            }
        }
        Ok(())
    }

    pub fn log(&self, url: &str, range: Option<&str>, verbose: bool) -> Result<()> {
        let session = self.open(url)?;
        let youngest = session.latest_revision()?;
        let (start, end) = parse_range(range, youngest)?;

        let rule = "-".repeat(72);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        session.get_log(&[""], start, end, verbose, &mut |entry: &LogEntry| {
            let message = entry.message.as_deref().unwrap_or("");
            let lines = message.lines().count();
            writeln!(out, "{rule}")?;
            writeln!(
                out,
                "r{} | {} | {} | {} line{}",
                entry.revision,
                entry.author.as_deref().unwrap_or("(no author)"),
                entry.date.as_deref().unwrap_or("(no date)"),
                lines,
                if lines == 1 { "" } else { "s" }
            )?;
            if let Some(changed) = &entry.changed_paths {
                writeln!(out, "Changed paths:")?;
                for (changed_path, change) in changed {
                    match &change.copyfrom {
                        Some((from, rev)) => writeln!(
                            out,
                            "   {} {} (from {}:{})",
                            change.action.as_char(),
                            changed_path,
                            from,
                            rev
                        )?,
                        None => writeln!(out, "   {} {}", change.action.as_char(), changed_path)?,
                    }
                }
            }
            writeln!(out)?;
            writeln!(out, "{message}")?;
            Ok(())
        })?;
        writeln!(out, "{rule}")?;
        Ok(())
    }

    pub fn import(&self, dir: &Path, url: &str, message: Option<String>) -> Result<()> {
        let message = self.log_message(message)?;
        let session = self.open(url)?;
        if session.check_path("", None)? != NodeKind::Dir {
            bail!("{url} is not a directory in the repository");
        }

        let mut revision = 0;
        {
            let mut editor = session.commit_editor(
                &message,
                CommitSlots {
                    revision: Some(&mut revision),
                    ..CommitSlots::none()
                },
            )?;
            if let Err(e) = drive_import(editor.as_mut(), dir) {
                if let Err(abort) = editor.abort_edit() {
                    debug!(error = %abort, "abort after failed import");
                }
                return Err(e.context(format!("Import of {} failed", dir.display())));
            }
        }
        println!("Committed revision {revision}.");
        Ok(())
    }

    pub fn mkdir(&self, url: &str, message: Option<String>) -> Result<()> {
        let message = self.log_message(message)?;
        let (repos_root, fs_path) = split_url(url)?;
        let name = path::basename(&fs_path).to_string();
        if name.is_empty() {
            bail!("Cannot create the repository root");
        }
        let session = self.open(&to_url(&repos_root, &path::dirname(&fs_path))?)?;

        let mut revision = 0;
        {
            let mut editor = session.commit_editor(
                &message,
                CommitSlots {
                    revision: Some(&mut revision),
                    ..CommitSlots::none()
                },
            )?;
            editor.open_root(None)?;
            editor.add_directory(&name, None)?;
            editor.close_directory(&name)?;
            editor.close_directory("")?;
            editor.close_edit()?;
        }
        println!("Committed revision {revision}.");
        Ok(())
    }
}

fn drive_import(editor: &mut dyn Editor, dir: &Path) -> Result<()> {
    editor.open_root(None)?;
    import_tree(editor, dir, "")?;
    editor.close_directory("")?;
    editor.close_edit()?;
    Ok(())
}

/// Add everything below `dir` to the edit, at `rel` below the root
fn import_tree(editor: &mut dyn Editor, dir: &Path, rel: &str) -> Result<()> {
    let mut children: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .collect::<io::Result<_>>()?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let file_name = child.file_name();
        let name = file_name
            .to_str()
            .ok_or_else(|| anyhow!("{} is not valid UTF-8", child.path().display()))?;
        if name == STATE_FILE {
            continue;
        }
        let child_rel = path::join_relative(rel, name);
        let file_type = child.file_type()?;
        if file_type.is_dir() {
            editor.add_directory(&child_rel, None)?;
            import_tree(editor, &child.path(), &child_rel)?;
            editor.close_directory(&child_rel)?;
        } else if file_type.is_file() {
            let data = fs::read(child.path())?;
            editor.add_file(&child_rel, None)?;
            editor.apply_text_delta(&child_rel, None, &TextDelta::compute(&[], &data))?;
            editor.close_file(&child_rel, Some(&format!("{:x}", md5::compute(&data))))?;
            println!("Adding         {child_rel}");
        } else {
            warn!(path = %child.path().display(), "skipping special file");
        }
    }
    Ok(())
}

/// Entry properties of the edit root, nothing else
#[derive(Debug, Default)]
struct RootEntryProps {
    props: PropMap,
}

impl Editor for RootEntryProps {
    fn change_dir_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> svnlocal_fs::Result<()> {
        if path.is_empty() && entry_props::is_entry_property(name) {
            if let Some(value) = value {
                self.props.insert(name.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

/// One status code per changed path, in drive order
fn status_lines(ops: &[EditOp]) -> Vec<(char, String)> {
    let mut lines: Vec<(char, String)> = Vec::new();
    for op in ops.iter().filter(|op| op.is_modification()) {
        let code = match op {
            EditOp::AddFile { .. } | EditOp::AddDirectory { .. } => 'A',
            EditOp::DeleteEntry { .. } => 'D',
            _ => 'M',
        };
        let Some(path) = op.path() else { continue };
        let path = if path.is_empty() { "." } else { path };
        match lines.iter_mut().find(|(_, p)| p == path) {
            // A replacement shows up as a delete followed by an add
            Some(line) if line.0 == 'D' && code == 'A' => line.0 = 'R',
            Some(_) => {}
            None => lines.push((code, path.to_string())),
        }
    }
    lines
}

fn parse_revision(token: &str, youngest: Revnum) -> Result<Revnum> {
    if token.eq_ignore_ascii_case("HEAD") {
        return Ok(youngest);
    }
    token
        .trim_start_matches('r')
        .parse()
        .with_context(|| format!("Invalid revision '{token}'"))
}

/// `START:END`, a single revision, or by default youngest back to 0
fn parse_range(range: Option<&str>, youngest: Revnum) -> Result<(Revnum, Revnum)> {
    match range {
        None => Ok((youngest, 0)),
        Some(range) => match range.split_once(':') {
            Some((start, end)) => Ok((parse_revision(start, youngest)?, parse_revision(end, youngest)?)),
            None => {
                let rev = parse_revision(range, youngest)?;
                Ok((rev, rev))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range(None, 7).unwrap(), (7, 0));
        assert_eq!(parse_range(Some("3"), 7).unwrap(), (3, 3));
        assert_eq!(parse_range(Some("HEAD:1"), 7).unwrap(), (7, 1));
        assert_eq!(parse_range(Some("r2:r5"), 7).unwrap(), (2, 5));
        assert!(parse_range(Some("x:1"), 7).is_err());
    }

    #[test]
    fn test_status_lines() {
        let ops = vec![
            EditOp::OpenRoot { base_revision: Some(1) },
            EditOp::DeleteEntry {
                path: "gone".into(),
                revision: Some(1),
            },
            EditOp::DeleteEntry {
                path: "swapped".into(),
                revision: Some(1),
            },
            EditOp::AddDirectory {
                path: "swapped".into(),
                copyfrom: None,
            },
            EditOp::OpenFile {
                path: "f".into(),
                base_revision: Some(1),
            },
            EditOp::ChangeFileProp {
                path: "f".into(),
                name: entry_props::COMMITTED_REV.into(),
                value: Some("2".into()),
            },
            EditOp::ApplyTextDelta {
                path: "f".into(),
                base_checksum: None,
                delta: TextDelta::empty(),
            },
            EditOp::ChangeDirProp {
                path: String::new(),
                name: "svn:ignore".into(),
                value: Some("*.o".into()),
            },
        ];
        assert_eq!(
            status_lines(&ops),
            vec![
                ('D', "gone".to_string()),
                ('R', "swapped".to_string()),
                ('M', "f".to_string()),
                ('M', ".".to_string()),
            ]
        );
    }

    #[test]
    fn test_import_and_checkout_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let repos_path = tmp.path().join("repos");
        Repository::create(&repos_path).unwrap();
        let url = to_url(&repos_path, "/").unwrap();

        let source = tmp.path().join("source");
        fs::create_dir_all(source.join("docs")).unwrap();
        fs::write(source.join("README"), b"hello\n").unwrap();
        fs::write(source.join("docs").join("guide.txt"), b"guide\n").unwrap();

        let client = Client::new(Config::default(), Some("alice".to_string()));
        client.import(&source, &url, Some("import".to_string())).unwrap();

        let wc = tmp.path().join("wc");
        client.checkout(&url, &wc, None, true).unwrap();
        assert_eq!(fs::read(wc.join("README")).unwrap(), b"hello\n");
        assert_eq!(fs::read(wc.join("docs").join("guide.txt")).unwrap(), b"guide\n");
        let state = WcState::load(&wc).unwrap();
        assert_eq!(state.revision, 1);
        assert!(state.entries.contains("docs/guide.txt"));

        fs::remove_file(wc.join("README")).unwrap();
        client.mkdir(&format!("{url}/tags"), Some("tags".to_string())).unwrap();
        client.update(&url, &wc, None).unwrap();
        assert_eq!(fs::read(wc.join("README")).unwrap(), b"hello\n");
        assert!(wc.join("tags").is_dir());
        assert_eq!(WcState::load(&wc).unwrap().revision, 2);
    }
}
