//! The in-memory image handed over by the compilation pipeline: named byte containers, symbol
//! descriptors and the relocation worklist. This subsystem consumes the image, it never owns
//! or mutates it.

use crate::arch::Architecture;
use crate::error::Result;
use anyhow::bail;
use coffer_utils::coff::RelocationKind;
use indexmap::IndexMap;

pub struct InputImage<'data> {
    pub arch: Architecture,

    /// The compiled machine code.
    pub code: Container<'data>,

    /// Read-only data regions, in the pipeline's fixed enumeration order.
    pub read_only: Vec<Container<'data>>,

    /// Writable data regions (global-offset and method-state tables), in the pipeline's fixed
    /// enumeration order.
    pub writable: Vec<Container<'data>>,

    pub symbols: Vec<SymbolDecl<'data>>,

    /// Each symbol's ordered relocation list. Iteration order of the map decides which physical
    /// relocation-table slot a record lands in, so an order-preserving map keeps output
    /// byte-for-byte reproducible.
    pub relocations: IndexMap<SymbolId, Vec<Relocation>>,

    /// Singleton symbol -> relocation pairs processed after `relocations`.
    pub unique_relocations: IndexMap<SymbolId, Relocation>,
}

/// One logical region of the output file.
pub struct Container<'data> {
    pub name: &'data str,
    pub bytes: &'data [u8],

    /// Required alignment of the region in the file. Must be a power of two in [1, 1024].
    pub alignment: u32,

    pub has_relocations: bool,
}

/// Index of a symbol in [`InputImage::symbols`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Identifies the container a symbol or relocation site lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRef {
    /// Not defined in any container. Symbols only; a relocation site always has a container.
    None,
    Code,
    ReadOnly(usize),
    Writable(usize),
}

pub struct SymbolDecl<'data> {
    pub name: &'data str,
    pub kind: SymbolKind,
    pub binding: SymbolBinding,
    pub container: ContainerRef,

    /// Byte offset within the defining container.
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolBinding {
    External,
    Local,
}

/// One entry of the relocation worklist.
#[derive(Debug, Clone, Copy)]
pub struct Relocation {
    pub kind: RelocationKind,

    /// The container holding the patch site.
    pub container: ContainerRef,

    /// Byte offset of the patch site within its container, before any kind-specific adjustment.
    pub offset: u64,

    /// Width in bytes of the instruction or cell being patched.
    pub size: u64,
}

impl<'data> InputImage<'data> {
    pub(crate) fn symbol(&self, id: SymbolId) -> Result<&SymbolDecl<'data>> {
        let Some(symbol) = self.symbols.get(id.0 as usize) else {
            bail!("Relocation references unknown symbol {}", id.0);
        };
        Ok(symbol)
    }
}
