//! svnlocal repository layer
//!
//! Everything that speaks the tree-edit protocol on top of the snapshot
//! store: the `Editor` capability, text deltas, the tree comparison that
//! drives editors for checkouts and reports, and the editor that commits.

pub mod commit;
pub mod delta;
pub mod editor;
pub mod report;
pub mod txdelta;

pub use commit::{CommitEditor, CommitHook};
pub use delta::{ClientState, DeltaDriver, DeltaOptions};
pub use editor::{EditOp, Editor, RecordingEditor};
pub use report::{Report, ReportParams};
pub use txdelta::{DeltaOp, DeltaWindow, TextDelta, WINDOW_SIZE};

use svnlocal_fs::{Filesystem, Result, Revnum};

/// Drive `editor` with the full tree at `fs_path@revision`, as if the
/// client had nothing.
pub fn checkout(
    fs: &Filesystem,
    fs_path: &str,
    revision: Revnum,
    recurse: bool,
    editor: &mut dyn Editor,
) -> Result<()> {
    let target = fs.revision_root(revision)?;
    let client = ClientState::empty();
    editor.set_target_revision(revision)?;
    DeltaDriver::new(
        &client,
        fs_path,
        &target,
        None,
        fs_path,
        DeltaOptions {
            text_deltas: true,
            recurse,
        },
    )
    .drive(editor)
}
