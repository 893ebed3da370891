use crate::coff::MAX_HEADER_RELOCATION_COUNT;
use crate::coff::RelocationEntry;
use crate::section::SectionIndex;
use object::LittleEndian;
use object::U16Bytes;
use object::U32Bytes;
use std::borrow::Cow;

/// Per-section relocation records, in the order they were created. Sections that accumulate
/// more than 65535 entries use the format's overflow convention: the header count field holds
/// 0xffff, the overflow characteristic bit is set, and a synthetic first record carries the true
/// count in its symbol-index field.
pub(crate) struct RelocationTable {
    per_section: Vec<Vec<RelocationEntry>>,
}

impl RelocationTable {
    pub(crate) fn new(section_count: usize) -> RelocationTable {
        RelocationTable {
            per_section: vec![Vec::new(); section_count],
        }
    }

    pub(crate) fn add(
        &mut self,
        section: SectionIndex,
        virtual_address: u32,
        symbol_index: u32,
        r_type: u16,
    ) {
        self.per_section[section.0].push(RelocationEntry {
            virtual_address: U32Bytes::new(LittleEndian, virtual_address),
            symbol_table_index: U32Bytes::new(LittleEndian, symbol_index),
            typ: U16Bytes::new(LittleEndian, r_type),
        });
    }

    pub(crate) fn count(&self, section: SectionIndex) -> usize {
        self.per_section[section.0].len()
    }

    pub(crate) fn is_overflowed(&self, section: SectionIndex) -> bool {
        self.count(section) > MAX_HEADER_RELOCATION_COUNT
    }

    /// Number of records actually written for the section, including the synthetic count record.
    pub(crate) fn on_disk_count(&self, section: SectionIndex) -> usize {
        let count = self.count(section);
        if count > MAX_HEADER_RELOCATION_COUNT {
            count + 1
        } else {
            count
        }
    }

    /// The value of the section header's 16-bit relocation-count field.
    pub(crate) fn header_count_field(&self, section: SectionIndex) -> u16 {
        let count = self.count(section);
        if count > MAX_HEADER_RELOCATION_COUNT {
            MAX_HEADER_RELOCATION_COUNT as u16
        } else {
            count as u16
        }
    }

    /// Serialized records for the section, or `None` when it has none.
    pub(crate) fn bytes(&self, section: SectionIndex) -> Option<Cow<'_, [u8]>> {
        let entries = &self.per_section[section.0];
        if entries.is_empty() {
            return None;
        }
        if entries.len() > MAX_HEADER_RELOCATION_COUNT {
            // Not a real relocation: the symbol-index field holds the true entry count.
            let marker = RelocationEntry {
                virtual_address: U32Bytes::new(LittleEndian, 0),
                symbol_table_index: U32Bytes::new(LittleEndian, entries.len() as u32),
                typ: U16Bytes::new(LittleEndian, 0),
            };
            let mut bytes =
                Vec::with_capacity((entries.len() + 1) * size_of::<RelocationEntry>());
            bytes.extend_from_slice(object::bytes_of(&marker));
            bytes.extend_from_slice(object::bytes_of_slice(entries));
            Some(Cow::Owned(bytes))
        } else {
            Some(Cow::Borrowed(object::bytes_of_slice(entries)))
        }
    }
}
