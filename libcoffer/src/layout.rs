//! Assigns every region of the output file its offset. Nothing is written here; the writer
//! replays this layout and verifies it while streaming bytes out.

use crate::alignment;
use crate::coff::FILE_HEADER_SIZE;
use crate::coff::RELOCATION_ENTRY_SIZE;
use crate::coff::SECTION_HEADER_SIZE;
use crate::error::Result;
use crate::reloc::RelocationTable;
use crate::section::OutputSection;
use crate::section::SectionIndex;
use crate::symtab::SymbolTable;
use anyhow::ensure;

pub(crate) struct FileLayout {
    pub(crate) symtab_offset: u32,
    pub(crate) strtab_offset: u32,
    pub(crate) sections: Vec<SectionLayout>,
    pub(crate) file_size: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SectionLayout {
    pub(crate) data_offset: u32,

    /// Zero when the section has no relocations.
    pub(crate) reloc_offset: u32,
}

#[tracing::instrument(skip_all, name = "Compute layout")]
pub(crate) fn compute(
    sections: &[OutputSection],
    symtab: &SymbolTable,
    relocations: &RelocationTable,
) -> Result<FileLayout> {
    ensure!(
        sections.len() <= usize::from(u16::MAX),
        "Too many sections: {}",
        sections.len()
    );

    let headers_size =
        u64::from(FILE_HEADER_SIZE) + u64::from(SECTION_HEADER_SIZE) * sections.len() as u64;
    let symtab_offset = alignment::TABLE.align_up(headers_size);
    let strtab_offset = symtab_offset + u64::from(symtab.symtab_size());
    let mut offset = strtab_offset + u64::from(symtab.strtab_size());

    let mut layouts = vec![SectionLayout::default(); sections.len()];

    for section in sections {
        offset = section.alignment.align_up(offset);
        layouts[section.index.0].data_offset = offset as u32;
        offset += section.size();
    }

    // Relocation records for all sections follow the last payload, back to back.
    for section in sections {
        let count = relocations.on_disk_count(section.index);
        if count > 0 {
            layouts[section.index.0].reloc_offset = offset as u32;
            offset += count as u64 * u64::from(RELOCATION_ENTRY_SIZE);
        }
    }

    ensure!(
        offset <= u64::from(u32::MAX),
        "Object file size 0x{offset:x} exceeds what the format's offsets can address"
    );

    Ok(FileLayout {
        symtab_offset: symtab_offset as u32,
        strtab_offset: strtab_offset as u32,
        sections: layouts,
        file_size: offset,
    })
}

impl FileLayout {
    pub(crate) fn section(&self, index: SectionIndex) -> SectionLayout {
        self.sections[index.0]
    }
}
