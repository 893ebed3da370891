//! End-to-end emission tests. Each test assembles an in-memory image, emits it into a byte
//! buffer and then checks the resulting object, either by inspecting fields at the offsets the
//! format dictates or by parsing the buffer back with the `object` crate.

use coffer_utils::utils::u16_from_slice;
use coffer_utils::utils::u32_from_slice;
use indexmap::IndexMap;
use libcoffer::Architecture;
use libcoffer::Container;
use libcoffer::ContainerRef;
use libcoffer::EmitOptions;
use libcoffer::InputImage;
use libcoffer::ObjectWriter;
use libcoffer::Relocation;
use libcoffer::RelocationKind;
use libcoffer::SymbolBinding;
use libcoffer::SymbolDecl;
use libcoffer::SymbolId;
use libcoffer::SymbolKind;
use object::Object as _;
use object::ObjectSymbol as _;
use object::read::coff::CoffFile;
use rstest::rstest;

const FILE_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;
const SYMTAB_ENTRY_SIZE: usize = 18;

fn emit(image: &InputImage) -> Vec<u8> {
    let options = EmitOptions {
        timestamp: Some(0x5eed_0001),
    };
    let mut bytes = Vec::new();
    ObjectWriter::with_options(image, options)
        .emit(&mut bytes)
        .unwrap();
    bytes
}

/// The fields of one section header, decoded at its position in the header array.
struct SectionHeader {
    size_of_raw_data: u32,
    pointer_to_raw_data: u32,
    pointer_to_relocations: u32,
    number_of_relocations: u16,
    characteristics: u32,
}

fn section_header(bytes: &[u8], index: usize) -> SectionHeader {
    let header = &bytes[FILE_HEADER_SIZE + index * SECTION_HEADER_SIZE..];
    SectionHeader {
        size_of_raw_data: u32_from_slice(&header[16..]),
        pointer_to_raw_data: u32_from_slice(&header[20..]),
        pointer_to_relocations: u32_from_slice(&header[24..]),
        number_of_relocations: u16_from_slice(&header[32..]),
        characteristics: u32_from_slice(&header[36..]),
    }
}

fn section_data<'a>(bytes: &'a [u8], index: usize) -> &'a [u8] {
    let header = section_header(bytes, index);
    let start = header.pointer_to_raw_data as usize;
    &bytes[start..start + header.size_of_raw_data as usize]
}

fn no_relocations() -> IndexMap<SymbolId, Vec<Relocation>> {
    IndexMap::new()
}

fn minimal_image<'data>(code: &'data [u8]) -> InputImage<'data> {
    InputImage {
        arch: Architecture::X86_64,
        code: Container {
            name: ".text",
            bytes: code,
            alignment: 16,
            has_relocations: false,
        },
        read_only: Vec::new(),
        writable: Vec::new(),
        symbols: vec![SymbolDecl {
            name: "entry",
            kind: SymbolKind::Function,
            binding: SymbolBinding::External,
            container: ContainerRef::Code,
            offset: 0,
        }],
        relocations: no_relocations(),
        unique_relocations: IndexMap::new(),
    }
}

#[test]
fn minimal_image_round_trips() {
    let code = [0x90u8; 32];
    let image = minimal_image(&code);
    let bytes = emit(&image);

    let file = CoffFile::<&[u8]>::parse(bytes.as_slice()).unwrap();
    // The code section plus the trailing directives section.
    assert_eq!(file.sections().count(), 2);
    let symbols: Vec<_> = file.symbols().collect();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name().unwrap(), "entry");

    assert_eq!(u16_from_slice(&bytes), object::pe::IMAGE_FILE_MACHINE_AMD64);
    assert_eq!(u16_from_slice(&bytes[2..]), 2);
    // The symbol table sits right behind the section-header array.
    assert_eq!(
        u32_from_slice(&bytes[8..]) as usize,
        FILE_HEADER_SIZE + 2 * SECTION_HEADER_SIZE
    );
    assert_eq!(u32_from_slice(&bytes[12..]), 1);
    // No optional header, no file-level characteristics.
    assert_eq!(u16_from_slice(&bytes[16..]), 0);
    assert_eq!(u16_from_slice(&bytes[18..]), 0);
}

#[test]
fn emission_is_reproducible_with_pinned_timestamp() {
    let code = [0x90u8; 32];
    let image = minimal_image(&code);
    assert_eq!(emit(&image), emit(&image));
}

/// An image exercising every region kind and every mapped relocation kind.
fn full_image<'data>(code: &'data [u8], rodata: &'data [u8], got: &'data [u8]) -> InputImage<'data> {
    let symbols = vec![
        SymbolDecl {
            name: "java_fn",
            kind: SymbolKind::Function,
            binding: SymbolBinding::External,
            container: ContainerRef::Code,
            offset: 0,
        },
        SymbolDecl {
            name: "stub_fn",
            kind: SymbolKind::Function,
            binding: SymbolBinding::Local,
            container: ContainerRef::Code,
            offset: 64,
        },
        SymbolDecl {
            name: "meta_data",
            kind: SymbolKind::Data,
            binding: SymbolBinding::Local,
            container: ContainerRef::Writable(0),
            offset: 0,
        },
        SymbolDecl {
            name: "ext_resolve",
            kind: SymbolKind::Function,
            binding: SymbolBinding::External,
            container: ContainerRef::Code,
            offset: 96,
        },
        SymbolDecl {
            name: "config_table",
            kind: SymbolKind::Data,
            binding: SymbolBinding::External,
            container: ContainerRef::ReadOnly(0),
            offset: 0,
        },
    ];

    let mut relocations = IndexMap::new();
    relocations.insert(
        SymbolId(0),
        vec![Relocation {
            kind: RelocationKind::DirectCall,
            container: ContainerRef::Code,
            offset: 100,
            size: 5,
        }],
    );
    // Indirect calls are patched at load time; nothing may be emitted for them.
    relocations.insert(
        SymbolId(1),
        vec![Relocation {
            kind: RelocationKind::IndirectCall,
            container: ContainerRef::Code,
            offset: 120,
            size: 5,
        }],
    );
    relocations.insert(
        SymbolId(2),
        vec![Relocation {
            kind: RelocationKind::GotLoad,
            container: ContainerRef::Code,
            offset: 32,
            size: 7,
        }],
    );

    let mut unique_relocations = IndexMap::new();
    unique_relocations.insert(
        SymbolId(3),
        Relocation {
            kind: RelocationKind::GotPltSlot,
            container: ContainerRef::Writable(0),
            offset: 8,
            size: 8,
        },
    );

    InputImage {
        arch: Architecture::X86_64,
        code: Container {
            name: ".text",
            bytes: code,
            alignment: 16,
            has_relocations: true,
        },
        read_only: vec![Container {
            name: ".rodata",
            bytes: rodata,
            alignment: 8,
            has_relocations: false,
        }],
        writable: vec![
            Container {
                name: ".got",
                bytes: got,
                alignment: 8,
                has_relocations: true,
            },
            Container {
                name: ".state",
                bytes: &[],
                alignment: 8,
                has_relocations: false,
            },
        ],
        symbols,
        relocations,
        unique_relocations,
    }
}

#[test]
fn layout_symbols_and_relocations() {
    let code = [0x90u8; 160];
    let rodata = [7u8; 24];
    let got = [0u8; 64];
    let image = full_image(&code, &rodata, &got);
    let bytes = emit(&image);

    // .text, .rodata, .got, .state, .drectve.
    assert_eq!(u16_from_slice(&bytes[2..]), 5);
    assert_eq!(u32_from_slice(&bytes[12..]), 5);

    // Every payload starts on its declared alignment.
    for (index, alignment) in [(0usize, 16u32), (1, 8), (2, 8), (3, 8), (4, 1)] {
        let header = section_header(&bytes, index);
        assert_eq!(
            header.pointer_to_raw_data % alignment,
            0,
            "section {index} is misaligned"
        );
    }

    // The string table declares its own length, prefix included.
    let symtab_offset = u32_from_slice(&bytes[8..]) as usize;
    let strtab_offset = symtab_offset + 5 * SYMTAB_ENTRY_SIZE;
    let names = b"java_fn\0stub_fn\0meta_data\0ext_resolve\0config_table\0";
    assert_eq!(
        u32_from_slice(&bytes[strtab_offset..]) as usize,
        4 + names.len()
    );
    assert_eq!(&bytes[strtab_offset + 4..strtab_offset + 4 + names.len()], names);

    // The skipped indirect call leaves .text with two records: the adjusted direct call and the
    // adjusted GOT load, in worklist order.
    let text = section_header(&bytes, 0);
    assert_eq!(text.number_of_relocations, 2);
    let records = &bytes[text.pointer_to_relocations as usize..];
    assert_eq!(u32_from_slice(records), 101);
    assert_eq!(u32_from_slice(&records[4..]), 0);
    assert_eq!(u16_from_slice(&records[8..]), object::pe::IMAGE_REL_AMD64_REL32);
    assert_eq!(u32_from_slice(&records[10..]), 28);
    assert_eq!(u32_from_slice(&records[14..]), 2);
    assert_eq!(u16_from_slice(&records[18..]), object::pe::IMAGE_REL_AMD64_REL32);

    // The GOT cell for the external symbol relocates as a 64-bit absolute slot.
    let got_header = section_header(&bytes, 2);
    assert_eq!(got_header.number_of_relocations, 1);
    let records = &bytes[got_header.pointer_to_relocations as usize..];
    assert_eq!(u32_from_slice(records), 8);
    assert_eq!(u32_from_slice(&records[4..]), 3);
    assert_eq!(u16_from_slice(&records[8..]), object::pe::IMAGE_REL_AMD64_ADDR64);

    // An empty writable region is kept as an 8-byte uninitialized-data section.
    let state = section_header(&bytes, 3);
    assert_eq!(state.size_of_raw_data, 8);
    assert_ne!(
        state.characteristics & object::pe::IMAGE_SCN_CNT_UNINITIALIZED_DATA,
        0
    );
    assert_ne!(state.characteristics & object::pe::IMAGE_SCN_MEM_WRITE, 0);

    let file = CoffFile::<&[u8]>::parse(bytes.as_slice()).unwrap();
    assert_eq!(file.symbols().count(), 5);
}

#[rstest]
#[case(SymbolKind::Data, "/EXPORT:exported,DATA ")]
#[case(SymbolKind::Function, "/EXPORT:exported ")]
fn export_directives(#[case] kind: SymbolKind, #[case] expected: &str) {
    let code = [0x90u8; 16];
    let mut image = minimal_image(&code);
    image.symbols = vec![SymbolDecl {
        name: "exported",
        kind,
        binding: SymbolBinding::External,
        container: ContainerRef::Code,
        offset: 0,
    }];
    let bytes = emit(&image);

    let directives = section_data(&bytes, 1);
    let text = std::str::from_utf8(directives).unwrap();
    assert!(text.starts_with("   "), "missing ANSI marker: {text:?}");
    assert_eq!(&text[3..], expected);
}

#[test]
fn relocation_count_overflow() {
    let code = [0u8; 16];
    let got = vec![0u8; 65536 * 8];
    let mut image = minimal_image(&code);
    image.writable = vec![Container {
        name: ".got",
        bytes: &got,
        alignment: 8,
        has_relocations: true,
    }];
    let relocations = (0..65536u64)
        .map(|i| Relocation {
            kind: RelocationKind::GotPltSlot,
            container: ContainerRef::Writable(0),
            offset: i * 8,
            size: 8,
        })
        .collect();
    image.relocations.insert(SymbolId(0), relocations);
    let bytes = emit(&image);

    let got_header = section_header(&bytes, 1);
    assert_eq!(got_header.number_of_relocations, 0xffff);
    assert_ne!(
        got_header.characteristics & object::pe::IMAGE_SCN_LNK_NRELOC_OVFL,
        0
    );

    // The synthetic leading record carries the true count in its symbol-index field.
    let records = &bytes[got_header.pointer_to_relocations as usize..];
    assert_eq!(u32_from_slice(records), 0);
    assert_eq!(u32_from_slice(&records[4..]), 65536);
    assert_eq!(u16_from_slice(&records[8..]), 0);
    assert_eq!(u32_from_slice(&records[10..]), 0);
    assert_eq!(
        bytes.len(),
        got_header.pointer_to_relocations as usize + 65537 * 10
    );
}

#[test]
fn unmapped_relocation_kind_aborts() {
    let code = [0u8; 16];
    let mut image = minimal_image(&code);
    image.relocations.insert(
        SymbolId(0),
        vec![Relocation {
            kind: RelocationKind::ForeignCallIndirect,
            container: ContainerRef::Code,
            offset: 4,
            size: 5,
        }],
    );

    let mut sink = Vec::new();
    let result = ObjectWriter::new(&image).emit(&mut sink);
    let error = result.unwrap_err();
    assert!(error.to_string().contains("ForeignCallIndirect"));
    // Nothing was written before the abort.
    assert!(sink.is_empty());
}

#[test]
fn relocation_against_unknown_symbol_aborts() {
    let code = [0u8; 16];
    let mut image = minimal_image(&code);
    image.relocations.insert(
        SymbolId(7),
        vec![Relocation {
            kind: RelocationKind::DirectCall,
            container: ContainerRef::Code,
            offset: 0,
            size: 5,
        }],
    );
    assert!(ObjectWriter::new(&image).emit(std::io::sink()).is_err());
}
