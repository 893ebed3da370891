use crate::coff::STRTAB_LENGTH_FIELD_SIZE;
use crate::coff::SYMTAB_ENTRY_SIZE;
use crate::coff::SymtabEntry;
use crate::error::Result;
use crate::input::SymbolBinding;
use crate::input::SymbolKind;
use crate::section::SectionIndex;
use anyhow::ensure;
use coffer_utils::coff::sym;
use object::LittleEndian;
use object::U16Bytes;
use object::U32Bytes;

/// Builds the symbol table, its companion string table and the linker-directive string in one
/// pass over the symbol set.
pub(crate) struct SymbolTable {
    symbols: Vec<SymtabEntry>,

    /// The string table, including the leading self-length field. The length is only known once
    /// every name has been added, so the first four bytes stay zero until [`Self::finalize`]
    /// patches them.
    strtab: Vec<u8>,

    directives: String,
}

/// What a caller needs to refer back to a symbol it added: the slot in the symbol table and the
/// name's byte offset in the string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SymbolHandle {
    pub(crate) table_index: u32,
    pub(crate) name_offset: u32,
}

impl SymbolTable {
    pub(crate) fn new() -> SymbolTable {
        SymbolTable {
            symbols: Vec::new(),
            strtab: vec![0; STRTAB_LENGTH_FIELD_SIZE as usize],
            directives: crate::coff::DIRECTIVE_MARKER.to_owned(),
        }
    }

    /// Adds one symbol-table entry. All names go through the string table; the 8-byte name field
    /// always holds the (0, offset) long-name form. Nameless symbols report offset 0 yet still
    /// append a NUL to the table, matching what the downstream linker has been fed historically.
    pub(crate) fn add_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        binding: SymbolBinding,
        section: Option<SectionIndex>,
        offset: u64,
    ) -> Result<SymbolHandle> {
        let name_offset = if name.is_empty() {
            self.strtab.push(0);
            0
        } else {
            // Byte length, not char count: the two differ for non-ASCII names.
            let start = self.strtab.len() as u32;
            self.strtab.extend_from_slice(name.as_bytes());
            self.strtab.push(0);
            start
        };

        // On-disk section numbers are one-based; zero means no section.
        let section_number = match section {
            Some(index) => {
                let number = index.0 + 1;
                ensure!(
                    number <= i16::MAX as usize,
                    "Section number {number} is not representable"
                );
                number as u16
            }
            None => 0,
        };

        ensure!(
            offset <= u64::from(u32::MAX),
            "Symbol `{name}` offset 0x{offset:x} does not fit the value field"
        );

        let typ = match kind {
            SymbolKind::Function => sym::TYPE_FUNCTION,
            SymbolKind::Data => sym::TYPE_NONE,
        };
        let storage_class = match binding {
            SymbolBinding::External => sym::CLASS_EXTERNAL,
            SymbolBinding::Local => sym::CLASS_STATIC,
        };

        let handle = SymbolHandle {
            table_index: self.symbols.len() as u32,
            name_offset,
        };

        let mut name_field = [0u8; 8];
        name_field[4..].copy_from_slice(&handle.name_offset.to_le_bytes());

        self.symbols.push(SymtabEntry {
            name: name_field,
            value: U32Bytes::new(LittleEndian, offset as u32),
            section_number: U16Bytes::new(LittleEndian, section_number),
            typ: U16Bytes::new(LittleEndian, typ),
            storage_class,
            number_of_aux_symbols: 0,
        });

        if binding == SymbolBinding::External {
            self.add_directive(name, kind);
        }

        Ok(handle)
    }

    fn add_directive(&mut self, name: &str, kind: SymbolKind) {
        self.directives.push_str("/EXPORT:");
        self.directives.push_str(name);
        if kind != SymbolKind::Function {
            self.directives.push_str(",DATA");
        }
        self.directives.push(' ');
    }

    pub(crate) fn symbol_count(&self) -> u32 {
        self.symbols.len() as u32
    }

    pub(crate) fn symtab_size(&self) -> u32 {
        self.symbols.len() as u32 * SYMTAB_ENTRY_SIZE
    }

    pub(crate) fn strtab_size(&self) -> u32 {
        self.strtab.len() as u32
    }

    pub(crate) fn symtab_bytes(&self) -> &[u8] {
        object::bytes_of_slice(&self.symbols)
    }

    /// Patches the string table's self-length prefix. Call once, after the last symbol has been
    /// added and before the table is serialized.
    pub(crate) fn finalize(&mut self) {
        let total = self.strtab.len() as u32;
        self.strtab[..STRTAB_LENGTH_FIELD_SIZE as usize].copy_from_slice(&total.to_le_bytes());
    }

    pub(crate) fn strtab_bytes(&self) -> &[u8] {
        debug_assert_eq!(
            coffer_utils::utils::u32_from_slice(&self.strtab),
            self.strtab.len() as u32
        );
        &self.strtab
    }

    pub(crate) fn directive_bytes(&self) -> &[u8] {
        self.directives.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_utils::utils::u32_from_slice;

    #[test]
    fn name_offsets_track_bytes_not_chars() {
        let mut symtab = SymbolTable::new();
        let a = symtab
            .add_symbol("né", SymbolKind::Data, SymbolBinding::Local, None, 0)
            .unwrap();
        let b = symtab
            .add_symbol("after", SymbolKind::Data, SymbolBinding::Local, None, 0)
            .unwrap();
        assert_eq!(a.name_offset, 4);
        // "né" is three bytes, plus the terminator.
        assert_eq!(b.name_offset, 8);
    }

    #[test]
    fn nameless_symbols_share_offset_zero() {
        let mut symtab = SymbolTable::new();
        let a = symtab
            .add_symbol("", SymbolKind::Data, SymbolBinding::Local, None, 0)
            .unwrap();
        let b = symtab
            .add_symbol("", SymbolKind::Data, SymbolBinding::Local, None, 0)
            .unwrap();
        assert_eq!(a.name_offset, 0);
        assert_eq!(b.name_offset, 0);
        // Each occurrence still appended its NUL.
        assert_eq!(symtab.strtab_size(), 6);
    }

    #[test]
    fn strtab_prefix_is_total_length() {
        let mut symtab = SymbolTable::new();
        symtab
            .add_symbol("entry", SymbolKind::Function, SymbolBinding::Local, None, 0)
            .unwrap();
        symtab.finalize();
        let bytes = symtab.strtab_bytes();
        assert_eq!(u32_from_slice(bytes) as usize, bytes.len());
        assert_eq!(&bytes[4..], b"entry\0");
    }

    #[test]
    fn export_directives() {
        let mut symtab = SymbolTable::new();
        symtab
            .add_symbol("foo", SymbolKind::Data, SymbolBinding::External, None, 0)
            .unwrap();
        symtab
            .add_symbol("bar", SymbolKind::Function, SymbolBinding::External, None, 0)
            .unwrap();
        symtab
            .add_symbol("hidden", SymbolKind::Function, SymbolBinding::Local, None, 0)
            .unwrap();
        let directives = std::str::from_utf8(symtab.directive_bytes()).unwrap();
        assert_eq!(directives, "   /EXPORT:foo,DATA /EXPORT:bar ");
    }

    #[test]
    fn entry_encoding() {
        let mut symtab = SymbolTable::new();
        let handle = symtab
            .add_symbol(
                "fn0",
                SymbolKind::Function,
                SymbolBinding::External,
                Some(SectionIndex(0)),
                0x40,
            )
            .unwrap();
        assert_eq!(handle.table_index, 0);
        let bytes = symtab.symtab_bytes();
        assert_eq!(bytes.len(), 18);
        // Long-name form: four zero bytes then the string-table offset.
        assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
        assert_eq!(u32_from_slice(&bytes[4..]), handle.name_offset);
        assert_eq!(u32_from_slice(&bytes[8..]), 0x40);
        assert_eq!(&bytes[12..14], &[1, 0]);
        assert_eq!(&bytes[14..16], &[0x20, 0]);
        assert_eq!(bytes[16], sym::CLASS_EXTERNAL);
        assert_eq!(bytes[17], 0);
    }
}
