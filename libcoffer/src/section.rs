use crate::alignment::Alignment;
use crate::coff::SECTION_NAME_LEN;
use crate::error::Result;
use coffer_utils::coff::SectionFlags;
use std::borrow::Cow;

/// Index of a section in creation order. On-disk section numbers are this plus one; the
/// translation happens once, when symbol-table entries are constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SectionIndex(pub(crate) usize);

/// One section of the output object: header fields that are known at creation time plus the raw
/// payload. File offsets are computed later by the layout pass and kept there.
pub(crate) struct OutputSection<'data> {
    /// On-disk name field: truncated, not NUL-terminated when the name fills the field.
    pub(crate) name: [u8; SECTION_NAME_LEN],

    /// Characteristics with the alignment sub-field already packed in.
    pub(crate) flags: SectionFlags,

    pub(crate) alignment: Alignment,

    pub(crate) data: Cow<'data, [u8]>,

    pub(crate) has_relocations: bool,

    pub(crate) index: SectionIndex,
}

/// Payload substituted for zero-length sections. A zero-length section would leave any symbol
/// defined at its start resolving into the following section.
const EMPTY_SECTION_PAYLOAD: &[u8] = &[0u8; 8];

impl<'data> OutputSection<'data> {
    pub(crate) fn new(
        name: &str,
        bytes: &'data [u8],
        flags: SectionFlags,
        alignment: u32,
        has_relocations: bool,
        index: SectionIndex,
    ) -> Result<OutputSection<'data>> {
        let alignment = Alignment::new(alignment)?;

        let mut name_field = [0u8; SECTION_NAME_LEN];
        let name_bytes = name.as_bytes();
        let len = name_bytes.len().min(SECTION_NAME_LEN);
        name_field[..len].copy_from_slice(&name_bytes[..len]);

        let data = if bytes.is_empty() {
            Cow::Borrowed(EMPTY_SECTION_PAYLOAD)
        } else {
            Cow::Borrowed(bytes)
        };

        Ok(OutputSection {
            name: name_field,
            flags: flags.with_alignment_exponent(alignment.exponent),
            alignment,
            data,
            has_relocations,
            index,
        })
    }

    pub(crate) fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub(crate) fn display_name(&self) -> Cow<'_, str> {
        let end = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(SECTION_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end])
    }
}
