//! Revision history queries

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::object::{ChangedPath, Revnum};
use crate::path;
use crate::properties::revprops;

/// One revision as reported to a log receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub revision: Revnum,
    pub author: Option<String>,
    pub date: Option<String>,
    pub message: Option<String>,
    /// Filled only when changed-path discovery was requested
    pub changed_paths: Option<BTreeMap<String, ChangedPath>>,
}

impl Filesystem {
    /// Walk revisions `start..=end` (descending when `start > end`) and
    /// hand every revision touching one of `paths` to `receiver`. An empty
    /// `paths` matches every revision.
    pub fn get_logs(
        &self,
        paths: &[String],
        start: Revnum,
        end: Revnum,
        discover_changed_paths: bool,
        receiver: &mut dyn FnMut(&LogEntry) -> Result<()>,
    ) -> Result<()> {
        let youngest = self.youngest()?;
        for rev in [start, end] {
            if rev > youngest {
                return Err(Error::NoSuchRevision(rev));
            }
        }

        let revisions: Box<dyn Iterator<Item = Revnum>> = if start <= end {
            Box::new(start..=end)
        } else {
            Box::new((end..=start).rev())
        };

        for rev in revisions {
            let mut record = self.revision_record(rev)?;
            let matches = paths.is_empty()
                || record.changes.keys().any(|changed| {
                    paths
                        .iter()
                        .any(|p| path::is_ancestor(&path::canonicalize(p), changed))
                });
            if !matches {
                continue;
            }
            let entry = LogEntry {
                revision: rev,
                author: record.props.remove(revprops::AUTHOR),
                date: record.props.remove(revprops::DATE),
                message: record.props.remove(revprops::LOG),
                changed_paths: discover_changed_paths.then_some(record.changes),
            };
            receiver(&entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Filesystem {
        let fs = Filesystem::in_memory().unwrap();
        let steps: [(&str, &str); 3] = [("/trunk", "r1"), ("/branches", "r2"), ("/trunk/src", "r3")];
        for (i, (dir, msg)) in steps.iter().enumerate() {
            let mut txn = fs.begin_txn(i as Revnum, Some("alice"), msg).unwrap();
            txn.make_dir(dir).unwrap();
            txn.commit().unwrap();
        }
        fs
    }

    fn collect(fs: &Filesystem, paths: &[&str], start: Revnum, end: Revnum) -> Vec<Revnum> {
        let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        let mut revs = Vec::new();
        fs.get_logs(&paths, start, end, false, &mut |entry| {
            revs.push(entry.revision);
            Ok(())
        })
        .unwrap();
        revs
    }

    #[test]
    fn test_log_order() {
        let fs = history();
        assert_eq!(collect(&fs, &[], 1, 3), vec![1, 2, 3]);
        assert_eq!(collect(&fs, &[], 3, 1), vec![3, 2, 1]);
    }

    #[test]
    fn test_log_path_filter() {
        let fs = history();
        assert_eq!(collect(&fs, &["/trunk"], 3, 0), vec![3, 1]);
        assert_eq!(collect(&fs, &["/branches"], 0, 3), vec![2]);
        assert_eq!(collect(&fs, &["/"], 3, 1), vec![3, 2, 1]);
    }

    #[test]
    fn test_log_entry_content() {
        let fs = history();
        let mut seen = Vec::new();
        fs.get_logs(&[], 2, 2, true, &mut |entry| {
            seen.push(entry.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].author.as_deref(), Some("alice"));
        assert_eq!(seen[0].message.as_deref(), Some("r2"));
        assert!(seen[0].changed_paths.as_ref().unwrap().contains_key("/branches"));
    }

    #[test]
    fn test_log_errors() {
        let fs = history();
        assert!(matches!(
            fs.get_logs(&[], 0, 9, false, &mut |_| Ok(())),
            Err(Error::NoSuchRevision(9))
        ));
        let result = fs.get_logs(&[], 3, 1, false, &mut |_| Err(Error::Editor("stop".into())));
        assert!(matches!(result, Err(Error::Editor(_))));
    }
}
