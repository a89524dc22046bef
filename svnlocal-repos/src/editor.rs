//! Tree editor capability
//!
//! An `Editor` receives a change-set as a stream of calls. Paths are
//! relative to the edit's anchor; the empty path is the anchor itself,
//! which is opened with `open_root` and closed with `close_directory("")`.
//! Every directory and file is closed after its children and before its
//! next sibling is opened.

use svnlocal_fs::{entry_props, Result, Revnum};

use crate::txdelta::TextDelta;

/// Receiver of tree edits. Every method defaults to a no-op.
pub trait Editor {
    fn set_target_revision(&mut self, _revision: Revnum) -> Result<()> {
        Ok(())
    }

    fn open_root(&mut self, _base_revision: Option<Revnum>) -> Result<()> {
        Ok(())
    }

    fn delete_entry(&mut self, _path: &str, _revision: Option<Revnum>) -> Result<()> {
        Ok(())
    }

    fn add_directory(&mut self, _path: &str, _copyfrom: Option<(&str, Revnum)>) -> Result<()> {
        Ok(())
    }

    fn open_directory(&mut self, _path: &str, _base_revision: Option<Revnum>) -> Result<()> {
        Ok(())
    }

    fn change_dir_prop(&mut self, _path: &str, _name: &str, _value: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn close_directory(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn add_file(&mut self, _path: &str, _copyfrom: Option<(&str, Revnum)>) -> Result<()> {
        Ok(())
    }

    fn open_file(&mut self, _path: &str, _base_revision: Option<Revnum>) -> Result<()> {
        Ok(())
    }

    /// `base_checksum` is the MD5 of the text the delta applies to
    fn apply_text_delta(
        &mut self,
        _path: &str,
        _base_checksum: Option<&str>,
        _delta: &TextDelta,
    ) -> Result<()> {
        Ok(())
    }

    fn change_file_prop(&mut self, _path: &str, _name: &str, _value: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// `text_checksum` is the MD5 of the file's final text
    fn close_file(&mut self, _path: &str, _text_checksum: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn close_edit(&mut self) -> Result<()> {
        Ok(())
    }

    fn abort_edit(&mut self) -> Result<()> {
        Ok(())
    }
}

macro_rules! forward_editor {
    ($ty:ty) => {
        impl<E: Editor + ?Sized> Editor for $ty {
            fn set_target_revision(&mut self, revision: Revnum) -> Result<()> {
                (**self).set_target_revision(revision)
            }
            fn open_root(&mut self, base_revision: Option<Revnum>) -> Result<()> {
                (**self).open_root(base_revision)
            }
            fn delete_entry(&mut self, path: &str, revision: Option<Revnum>) -> Result<()> {
                (**self).delete_entry(path, revision)
            }
            fn add_directory(&mut self, path: &str, copyfrom: Option<(&str, Revnum)>) -> Result<()> {
                (**self).add_directory(path, copyfrom)
            }
            fn open_directory(&mut self, path: &str, base_revision: Option<Revnum>) -> Result<()> {
                (**self).open_directory(path, base_revision)
            }
            fn change_dir_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
                (**self).change_dir_prop(path, name, value)
            }
            fn close_directory(&mut self, path: &str) -> Result<()> {
                (**self).close_directory(path)
            }
            fn add_file(&mut self, path: &str, copyfrom: Option<(&str, Revnum)>) -> Result<()> {
                (**self).add_file(path, copyfrom)
            }
            fn open_file(&mut self, path: &str, base_revision: Option<Revnum>) -> Result<()> {
                (**self).open_file(path, base_revision)
            }
            fn apply_text_delta(
                &mut self,
                path: &str,
                base_checksum: Option<&str>,
                delta: &TextDelta,
            ) -> Result<()> {
                (**self).apply_text_delta(path, base_checksum, delta)
            }
            fn change_file_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
                (**self).change_file_prop(path, name, value)
            }
            fn close_file(&mut self, path: &str, text_checksum: Option<&str>) -> Result<()> {
                (**self).close_file(path, text_checksum)
            }
            fn close_edit(&mut self) -> Result<()> {
                (**self).close_edit()
            }
            fn abort_edit(&mut self) -> Result<()> {
                (**self).abort_edit()
            }
        }
    };
}

forward_editor!(&mut E);
forward_editor!(Box<E>);

/// One editor call, owned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    SetTargetRevision(Revnum),
    OpenRoot {
        base_revision: Option<Revnum>,
    },
    DeleteEntry {
        path: String,
        revision: Option<Revnum>,
    },
    AddDirectory {
        path: String,
        copyfrom: Option<(String, Revnum)>,
    },
    OpenDirectory {
        path: String,
        base_revision: Option<Revnum>,
    },
    ChangeDirProp {
        path: String,
        name: String,
        value: Option<String>,
    },
    CloseDirectory {
        path: String,
    },
    AddFile {
        path: String,
        copyfrom: Option<(String, Revnum)>,
    },
    OpenFile {
        path: String,
        base_revision: Option<Revnum>,
    },
    ApplyTextDelta {
        path: String,
        base_checksum: Option<String>,
        delta: TextDelta,
    },
    ChangeFileProp {
        path: String,
        name: String,
        value: Option<String>,
    },
    CloseFile {
        path: String,
        text_checksum: Option<String>,
    },
    CloseEdit,
    AbortEdit,
}

impl EditOp {
    /// Path the call refers to; `None` for edit-level calls
    pub fn path(&self) -> Option<&str> {
        match self {
            EditOp::OpenRoot { .. } => Some(""),
            EditOp::DeleteEntry { path, .. }
            | EditOp::AddDirectory { path, .. }
            | EditOp::OpenDirectory { path, .. }
            | EditOp::ChangeDirProp { path, .. }
            | EditOp::CloseDirectory { path }
            | EditOp::AddFile { path, .. }
            | EditOp::OpenFile { path, .. }
            | EditOp::ApplyTextDelta { path, .. }
            | EditOp::ChangeFileProp { path, .. }
            | EditOp::CloseFile { path, .. } => Some(path),
            EditOp::SetTargetRevision(_) | EditOp::CloseEdit | EditOp::AbortEdit => None,
        }
    }

    /// Whether the call changes the receiver's tree. Navigation, closes
    /// and synthesized entry properties do not.
    pub fn is_modification(&self) -> bool {
        match self {
            EditOp::DeleteEntry { .. }
            | EditOp::AddDirectory { .. }
            | EditOp::AddFile { .. }
            | EditOp::ApplyTextDelta { .. } => true,
            EditOp::ChangeDirProp { name, .. } | EditOp::ChangeFileProp { name, .. } => {
                !entry_props::is_entry_property(name)
            }
            _ => false,
        }
    }

    /// Replay this call onto an editor
    pub fn replay(&self, editor: &mut dyn Editor) -> Result<()> {
        match self {
            EditOp::SetTargetRevision(rev) => editor.set_target_revision(*rev),
            EditOp::OpenRoot { base_revision } => editor.open_root(*base_revision),
            EditOp::DeleteEntry { path, revision } => editor.delete_entry(path, *revision),
            EditOp::AddDirectory { path, copyfrom: c } => editor.add_directory(path, borrowed_copyfrom(c)),
            EditOp::OpenDirectory { path, base_revision } => editor.open_directory(path, *base_revision),
            EditOp::ChangeDirProp { path, name, value } => {
                editor.change_dir_prop(path, name, value.as_deref())
            }
            EditOp::CloseDirectory { path } => editor.close_directory(path),
            EditOp::AddFile { path, copyfrom: c } => editor.add_file(path, borrowed_copyfrom(c)),
            EditOp::OpenFile { path, base_revision } => editor.open_file(path, *base_revision),
            EditOp::ApplyTextDelta {
                path,
                base_checksum,
                delta,
            } => editor.apply_text_delta(path, base_checksum.as_deref(), delta),
            EditOp::ChangeFileProp { path, name, value } => {
                editor.change_file_prop(path, name, value.as_deref())
            }
            EditOp::CloseFile {
                path,
                text_checksum,
            } => editor.close_file(path, text_checksum.as_deref()),
            EditOp::CloseEdit => editor.close_edit(),
            EditOp::AbortEdit => editor.abort_edit(),
        }
    }
}

/// Editor that records every call it receives
#[derive(Debug, Default)]
pub struct RecordingEditor {
    pub ops: Vec<EditOp>,
}

impl RecordingEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded calls that change the tree
    pub fn modifications(&self) -> impl Iterator<Item = &EditOp> {
        self.ops.iter().filter(|op| op.is_modification())
    }
}

fn borrowed_copyfrom(copyfrom: &Option<(String, Revnum)>) -> Option<(&str, Revnum)> {
    copyfrom.as_ref().map(|(p, r)| (p.as_str(), *r))
}

fn owned_copyfrom(copyfrom: Option<(&str, Revnum)>) -> Option<(String, Revnum)> {
    copyfrom.map(|(p, r)| (p.to_string(), r))
}

impl Editor for RecordingEditor {
    fn set_target_revision(&mut self, revision: Revnum) -> Result<()> {
        self.ops.push(EditOp::SetTargetRevision(revision));
        Ok(())
    }

    fn open_root(&mut self, base_revision: Option<Revnum>) -> Result<()> {
        self.ops.push(EditOp::OpenRoot { base_revision });
        Ok(())
    }

    fn delete_entry(&mut self, path: &str, revision: Option<Revnum>) -> Result<()> {
        self.ops.push(EditOp::DeleteEntry {
            path: path.to_string(),
            revision,
        });
        Ok(())
    }

    fn add_directory(&mut self, path: &str, copyfrom: Option<(&str, Revnum)>) -> Result<()> {
        self.ops.push(EditOp::AddDirectory {
            path: path.to_string(),
            copyfrom: owned_copyfrom(copyfrom),
        });
        Ok(())
    }

    fn open_directory(&mut self, path: &str, base_revision: Option<Revnum>) -> Result<()> {
        self.ops.push(EditOp::OpenDirectory {
            path: path.to_string(),
            base_revision,
        });
        Ok(())
    }

    fn change_dir_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
        self.ops.push(EditOp::ChangeDirProp {
            path: path.to_string(),
            name: name.to_string(),
            value: value.map(str::to_string),
        });
        Ok(())
    }

    fn close_directory(&mut self, path: &str) -> Result<()> {
        self.ops.push(EditOp::CloseDirectory {
            path: path.to_string(),
        });
        Ok(())
    }

    fn add_file(&mut self, path: &str, copyfrom: Option<(&str, Revnum)>) -> Result<()> {
        self.ops.push(EditOp::AddFile {
            path: path.to_string(),
            copyfrom: owned_copyfrom(copyfrom),
        });
        Ok(())
    }

    fn open_file(&mut self, path: &str, base_revision: Option<Revnum>) -> Result<()> {
        self.ops.push(EditOp::OpenFile {
            path: path.to_string(),
            base_revision,
        });
        Ok(())
    }

    fn apply_text_delta(
        &mut self,
        path: &str,
        base_checksum: Option<&str>,
        delta: &TextDelta,
    ) -> Result<()> {
        self.ops.push(EditOp::ApplyTextDelta {
            path: path.to_string(),
            base_checksum: base_checksum.map(str::to_string),
            delta: delta.clone(),
        });
        Ok(())
    }

    fn change_file_prop(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
        self.ops.push(EditOp::ChangeFileProp {
            path: path.to_string(),
            name: name.to_string(),
            value: value.map(str::to_string),
        });
        Ok(())
    }

    fn close_file(&mut self, path: &str, text_checksum: Option<&str>) -> Result<()> {
        self.ops.push(EditOp::CloseFile {
            path: path.to_string(),
            text_checksum: text_checksum.map(str::to_string),
        });
        Ok(())
    }

    fn close_edit(&mut self) -> Result<()> {
        self.ops.push(EditOp::CloseEdit);
        Ok(())
    }

    fn abort_edit(&mut self) -> Result<()> {
        self.ops.push(EditOp::AbortEdit);
        Ok(())
    }
}
