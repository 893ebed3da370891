//! On-disk COFF record types and their fixed sizes. Every multi-byte field is stored
//! little-endian regardless of host byte order; the `object` definitions encode that in the
//! field types.

pub(crate) type FileHeader = object::pe::ImageFileHeader;
pub(crate) type SectionHeader = object::pe::ImageSectionHeader;
pub(crate) type SymtabEntry = object::pe::ImageSymbol;
pub(crate) type RelocationEntry = object::pe::ImageRelocation;

/// These sizes are from the format specification.
pub(crate) const FILE_HEADER_SIZE: u32 = 20;
pub(crate) const SECTION_HEADER_SIZE: u32 = 40;
pub(crate) const SYMTAB_ENTRY_SIZE: u32 = 18;
pub(crate) const RELOCATION_ENTRY_SIZE: u32 = 10;

/// The string table's self-length prefix.
pub(crate) const STRTAB_LENGTH_FIELD_SIZE: u32 = 4;

/// The on-disk width of a section name.
pub(crate) const SECTION_NAME_LEN: usize = 8;

/// Largest relocation count the section header's 16-bit field can hold. Sections with more
/// entries use the overflow convention of [`crate::reloc`].
pub(crate) const MAX_HEADER_RELOCATION_COUNT: usize = 0xffff;

const _ASSERTS: () = {
    assert!(FILE_HEADER_SIZE as usize == size_of::<FileHeader>());
    assert!(SECTION_HEADER_SIZE as usize == size_of::<SectionHeader>());
    assert!(SYMTAB_ENTRY_SIZE as usize == size_of::<SymtabEntry>());
    assert!(RELOCATION_ENTRY_SIZE as usize == size_of::<RelocationEntry>());
};

/// Name of the linker-directives section.
pub(crate) const DIRECTIVE_SECTION_NAME: &str = ".drectve";

/// ANSI marker that opens the directives blob.
pub(crate) const DIRECTIVE_MARKER: &str = "   ";
