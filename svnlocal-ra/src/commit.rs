//! Commit finalization
//!
//! A caller that wants to learn what its commit produced hands in
//! `CommitSlots`; once the revision is published they receive copies of
//! its number, date and author. A failed commit leaves them untouched.

use svnlocal_fs::{CommitInfo, Revnum};
use svnlocal_repos::CommitHook;

/// Places to store the result of a commit. Unset slots are not filled.
#[derive(Debug, Default)]
pub struct CommitSlots<'a> {
    pub revision: Option<&'a mut Revnum>,
    pub date: Option<&'a mut Option<String>>,
    pub author: Option<&'a mut Option<String>>,
}

impl<'a> CommitSlots<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fill(self, info: &CommitInfo) {
        if let Some(revision) = self.revision {
            *revision = info.revision;
        }
        if let Some(date) = self.date {
            *date = info.date.clone();
        }
        if let Some(author) = self.author {
            *author = info.author.clone();
        }
    }

    /// One-shot hook for the commit editor that fills these slots
    pub fn into_hook(self) -> CommitHook<'a> {
        Box::new(move |info: &CommitInfo| {
            tracing::info!(revision = info.revision, "committed revision");
            self.fill(info);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_only_requested_slots() {
        let mut revision = 0;
        let mut author = None;
        let info = CommitInfo {
            revision: 7,
            date: Some("2024-01-01T00:00:00.000000Z".into()),
            author: Some("alice".into()),
        };
        CommitSlots {
            revision: Some(&mut revision),
            date: None,
            author: Some(&mut author),
        }
        .into_hook()(&info);
        assert_eq!(revision, 7);
        assert_eq!(author.as_deref(), Some("alice"));
    }

    #[test]
    fn test_missing_metadata_clears_slot() {
        let mut date = Some("stale".to_string());
        let info = CommitInfo {
            revision: 1,
            date: None,
            author: None,
        };
        CommitSlots {
            date: Some(&mut date),
            ..CommitSlots::none()
        }
        .fill(&info);
        assert_eq!(date, None);
    }
}
