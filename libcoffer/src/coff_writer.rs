//! The object assembler: turns an [`InputImage`] into the on-disk byte stream. Strictly
//! sequential; either every phase succeeds or emission aborts with nothing usable written.

use crate::EmitOptions;
use crate::arch::Arch;
use crate::coff::DIRECTIVE_SECTION_NAME;
use crate::coff::FileHeader;
use crate::coff::SectionHeader;
use crate::error::Result;
use crate::file_writer::OutputStream;
use crate::input::ContainerRef;
use crate::input::InputImage;
use crate::input::Relocation;
use crate::input::SymbolId;
use crate::layout;
use crate::layout::FileLayout;
use crate::reloc::RelocationTable;
use crate::section::OutputSection;
use crate::section::SectionIndex;
use crate::symtab::SymbolHandle;
use crate::symtab::SymbolTable;
use anyhow::bail;
use anyhow::ensure;
use coffer_utils::coff::RelocationAction;
use coffer_utils::coff::scn;
use object::LittleEndian;
use object::U16;
use object::U32;
use std::io::Write;
use std::time::SystemTime;

pub(crate) fn write_object<A: Arch>(
    image: &InputImage,
    options: &EmitOptions,
    sink: impl Write,
) -> Result {
    let mut sections = build_sections(image)?;

    let mut symtab = SymbolTable::new();
    let handles = build_symbol_table(image, &mut symtab)?;
    symtab.finalize();

    // The directives section is laid out like any other section but comes last and takes no
    // part in relocation bookkeeping.
    sections.push(OutputSection::new(
        DIRECTIVE_SECTION_NAME,
        symtab.directive_bytes(),
        scn::LNK_INFO.with(scn::LNK_REMOVE),
        1,
        false,
        SectionIndex(sections.len()),
    )?);

    let mut relocations = RelocationTable::new(sections.len());
    build_relocations::<A>(image, &sections, &handles, &mut relocations)?;

    let file_layout = layout::compute(&sections, &symtab, &relocations)?;

    tracing::debug!(
        sections = sections.len(),
        symbols = symtab.symbol_count(),
        file_size = file_layout.file_size,
        "assembled object"
    );

    write_file::<A>(
        options,
        &sections,
        &symtab,
        &relocations,
        &file_layout,
        sink,
    )
}

/// Section numbers are positional and baked into every symbol and relocation entry: code first,
/// then the read-only regions in enumeration order, then the writable regions in enumeration
/// order. [`section_for`] mirrors this assignment; the two must stay in step.
#[tracing::instrument(skip_all, name = "Build sections")]
fn build_sections<'data>(image: &'data InputImage) -> Result<Vec<OutputSection<'data>>> {
    let mut sections =
        Vec::with_capacity(image.read_only.len() + image.writable.len() + 2);

    let code = &image.code;
    sections.push(OutputSection::new(
        code.name,
        code.bytes,
        scn::CNT_CODE.with(scn::MEM_READ).with(scn::MEM_EXECUTE),
        code.alignment,
        code.has_relocations,
        SectionIndex(sections.len()),
    )?);

    for container in &image.read_only {
        sections.push(OutputSection::new(
            container.name,
            container.bytes,
            scn::CNT_INITIALIZED_DATA.with(scn::MEM_READ),
            container.alignment,
            container.has_relocations,
            SectionIndex(sections.len()),
        )?);
    }

    for container in &image.writable {
        // A region with no payload yet is uninitialized storage; it still gets the section
        // builder's non-empty placeholder payload.
        let content = if container.bytes.is_empty() {
            scn::CNT_UNINITIALIZED_DATA
        } else {
            scn::CNT_INITIALIZED_DATA
        };
        sections.push(OutputSection::new(
            container.name,
            container.bytes,
            content.with(scn::MEM_READ).with(scn::MEM_WRITE),
            container.alignment,
            container.has_relocations,
            SectionIndex(sections.len()),
        )?);
    }

    Ok(sections)
}

/// Resolves a container reference to the section index assigned by [`build_sections`].
fn section_for(image: &InputImage, container: ContainerRef) -> Result<Option<SectionIndex>> {
    match container {
        ContainerRef::None => Ok(None),
        ContainerRef::Code => Ok(Some(SectionIndex(0))),
        ContainerRef::ReadOnly(i) => {
            ensure!(
                i < image.read_only.len(),
                "Reference to unknown read-only region {i}"
            );
            Ok(Some(SectionIndex(1 + i)))
        }
        ContainerRef::Writable(i) => {
            ensure!(
                i < image.writable.len(),
                "Reference to unknown writable region {i}"
            );
            Ok(Some(SectionIndex(1 + image.read_only.len() + i)))
        }
    }
}

#[tracing::instrument(skip_all, name = "Build symbol table")]
fn build_symbol_table(image: &InputImage, symtab: &mut SymbolTable) -> Result<Vec<SymbolHandle>> {
    image
        .symbols
        .iter()
        .map(|symbol| {
            let section = section_for(image, symbol.container)?;
            symtab.add_symbol(
                symbol.name,
                symbol.kind,
                symbol.binding,
                section,
                symbol.offset,
            )
        })
        .collect()
}

#[tracing::instrument(skip_all, name = "Build relocations")]
fn build_relocations<A: Arch>(
    image: &InputImage,
    sections: &[OutputSection],
    handles: &[SymbolHandle],
    relocations: &mut RelocationTable,
) -> Result {
    for (id, list) in &image.relocations {
        for relocation in list {
            add_relocation::<A>(image, sections, handles, relocations, *id, relocation)?;
        }
    }
    for (id, relocation) in &image.unique_relocations {
        add_relocation::<A>(image, sections, handles, relocations, *id, relocation)?;
    }
    Ok(())
}

fn add_relocation<A: Arch>(
    image: &InputImage,
    sections: &[OutputSection],
    handles: &[SymbolHandle],
    relocations: &mut RelocationTable,
    id: SymbolId,
    relocation: &Relocation,
) -> Result {
    let symbol = image.symbol(id)?;

    let Some(action) = A::relocation_action(relocation.kind) else {
        bail!(
            "Cannot emit relocation kind {:?} for symbol `{}`",
            relocation.kind,
            symbol.name
        );
    };
    let RelocationAction::Emit(info) = action else {
        return Ok(());
    };

    let Some(handle) = handles.get(id.0 as usize) else {
        bail!("Relocation against symbol `{}` with no table entry", symbol.name);
    };
    let Some(section) = section_for(image, relocation.container)? else {
        bail!(
            "Relocation against `{}` has no containing section",
            symbol.name
        );
    };
    ensure!(
        sections[section.0].has_relocations,
        "Relocation in section `{}`, which was not marked as carrying any",
        sections[section.0].display_name()
    );
    let Some(address) = info.adjust.apply(relocation.offset, relocation.size) else {
        bail!(
            "Relocation against `{}` at offset 0x{:x} leaves no room for the {} field",
            symbol.name,
            relocation.offset,
            A::rel_type_to_string(info.r_type)
        );
    };
    ensure!(
        address <= u64::from(u32::MAX),
        "Relocation address 0x{address:x} does not fit the format's address field"
    );

    relocations.add(section, address as u32, handle.table_index, info.r_type);
    Ok(())
}

#[tracing::instrument(skip_all, name = "Write output")]
fn write_file<A: Arch>(
    options: &EmitOptions,
    sections: &[OutputSection],
    symtab: &SymbolTable,
    relocations: &RelocationTable,
    file_layout: &FileLayout,
    sink: impl Write,
) -> Result {
    let mut out = OutputStream::new(sink);

    let header = file_header::<A>(options, sections.len() as u16, symtab, file_layout);
    out.write(object::bytes_of(&header))?;

    for section in sections {
        let header = section_header(section, relocations, file_layout);
        out.write(object::bytes_of(&header))?;
    }

    out.pad_to(u64::from(file_layout.symtab_offset), "symbol table")?;
    out.write(symtab.symtab_bytes())?;

    // The string table follows the symbol table unpadded.
    out.write(symtab.strtab_bytes())?;

    for section in sections {
        let offset = file_layout.section(section.index).data_offset;
        out.pad_to(u64::from(offset), "section payload")?;
        out.write(&section.data)?;
    }

    for section in sections {
        if let Some(bytes) = relocations.bytes(section.index) {
            out.pad_to(
                u64::from(file_layout.section(section.index).reloc_offset),
                "relocation records",
            )?;
            out.write(&bytes)?;
        }
    }

    ensure!(
        out.position() == file_layout.file_size,
        "Internal error: wrote 0x{:x} bytes, layout computed 0x{:x}",
        out.position(),
        file_layout.file_size
    );

    out.finish()
}

fn file_header<A: Arch>(
    options: &EmitOptions,
    section_count: u16,
    symtab: &SymbolTable,
    file_layout: &FileLayout,
) -> FileHeader {
    let e = LittleEndian;
    FileHeader {
        machine: U16::new(e, A::file_header_machine_magic()),
        number_of_sections: U16::new(e, section_count),
        time_date_stamp: U32::new(e, options.timestamp.unwrap_or_else(wall_clock_timestamp)),
        pointer_to_symbol_table: U32::new(e, file_layout.symtab_offset),
        number_of_symbols: U32::new(e, symtab.symbol_count()),
        size_of_optional_header: U16::new(e, 0),
        characteristics: U16::new(e, 0),
    }
}

fn section_header(
    section: &OutputSection,
    relocations: &RelocationTable,
    file_layout: &FileLayout,
) -> SectionHeader {
    let e = LittleEndian;

    let mut flags = section.flags;
    if relocations.is_overflowed(section.index) {
        flags = flags.with(scn::LNK_NRELOC_OVFL);
    }

    let section_layout = file_layout.section(section.index);
    SectionHeader {
        name: section.name,
        virtual_size: U32::new(e, 0),
        virtual_address: U32::new(e, 0),
        size_of_raw_data: U32::new(e, section.size() as u32),
        pointer_to_raw_data: U32::new(e, section_layout.data_offset),
        pointer_to_relocations: U32::new(e, section_layout.reloc_offset),
        pointer_to_linenumbers: U32::new(e, 0),
        number_of_relocations: U16::new(e, relocations.header_count_field(section.index)),
        number_of_linenumbers: U16::new(e, 0),
        characteristics: U32::new(e, flags.raw()),
    }
}

/// The timestamp is informational; pass [`EmitOptions::timestamp`] to pin it instead.
fn wall_clock_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}
