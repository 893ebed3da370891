//! Packages ahead-of-time compiled code, data, symbols and relocations into a PE/COFF
//! relocatable object that a Windows-family static linker can consume.
//!
//! The compilation pipeline hands over an [`InputImage`]; [`ObjectWriter::emit`] performs one
//! all-or-nothing emission into a byte sink. Malformed input is a hard error, an unwritable
//! sink is the one failure a caller can meaningfully recover from.

use crate::error::Context as _;
use crate::error::Result;
use std::io::Write;
use std::path::Path;

pub(crate) mod alignment;
pub(crate) mod arch;
pub(crate) mod coff;
pub(crate) mod coff_writer;
pub mod error;
pub(crate) mod file_writer;
pub(crate) mod input;
pub(crate) mod layout;
pub(crate) mod reloc;
pub(crate) mod section;
pub(crate) mod symtab;
pub(crate) mod x86_64;

pub use crate::arch::Architecture;
pub use crate::input::Container;
pub use crate::input::ContainerRef;
pub use crate::input::InputImage;
pub use crate::input::Relocation;
pub use crate::input::SymbolBinding;
pub use crate::input::SymbolDecl;
pub use crate::input::SymbolId;
pub use crate::input::SymbolKind;
pub use coffer_utils::coff::RelocationKind;

/// Knobs that do not change the meaning of the emitted object.
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Header timestamp, seconds since the epoch. Defaults to wall-clock time; pin it to make
    /// emission byte-for-byte reproducible.
    pub timestamp: Option<u32>,
}

pub struct ObjectWriter<'data> {
    image: &'data InputImage<'data>,
    options: EmitOptions,
}

impl<'data> ObjectWriter<'data> {
    pub fn new(image: &'data InputImage<'data>) -> ObjectWriter<'data> {
        Self::with_options(image, EmitOptions::default())
    }

    pub fn with_options(
        image: &'data InputImage<'data>,
        options: EmitOptions,
    ) -> ObjectWriter<'data> {
        ObjectWriter { image, options }
    }

    /// Emits the object into `sink` in one pass.
    pub fn emit(&self, sink: impl Write) -> Result {
        match self.image.arch {
            Architecture::X86_64 => {
                coff_writer::write_object::<x86_64::X86_64>(self.image, &self.options, sink)
            }
        }
    }

    pub fn emit_to_file(&self, path: &Path) -> Result {
        let mut writer = file_writer::create(path)?;
        self.emit(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("Failed to write `{}`", path.display()))
    }
}
