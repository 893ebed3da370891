//! Abstraction over different CPU architectures.

use coffer_utils::coff::RelocationAction;
use coffer_utils::coff::RelocationKind;
use std::borrow::Cow;

pub(crate) trait Arch {
    // Get the file-header machine constant for the architecture.
    fn file_header_machine_magic() -> u16;

    // Map a semantic relocation kind to the architecture's on-disk encoding, or None when the
    // architecture has no encoding for it.
    fn relocation_action(kind: RelocationKind) -> Option<RelocationAction>;

    // Get string representation of a relocation type specific for the architecture.
    fn rel_type_to_string(r_type: u16) -> Cow<'static, str>;
}

/// The architectures the emitter can target. Only x86-64 carries a relocation mapping table at
/// present; adding another target means supplying its table and machine constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X86_64,
}
