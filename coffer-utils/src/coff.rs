use std::borrow::Cow;

macro_rules! const_name_by_value {
    ($needle: expr, $( $const:ident ),*) => {
        match $needle {
            $(object::pe::$const => Some(stringify!($const)),)*
            _ => None
        }
    };
}

#[must_use]
pub fn amd64_rel_type_to_string(r_type: u16) -> Cow<'static, str> {
    if let Some(name) = const_name_by_value![
        r_type,
        IMAGE_REL_AMD64_ABSOLUTE,
        IMAGE_REL_AMD64_ADDR64,
        IMAGE_REL_AMD64_ADDR32,
        IMAGE_REL_AMD64_ADDR32NB,
        IMAGE_REL_AMD64_REL32,
        IMAGE_REL_AMD64_REL32_1,
        IMAGE_REL_AMD64_REL32_2,
        IMAGE_REL_AMD64_REL32_3,
        IMAGE_REL_AMD64_REL32_4,
        IMAGE_REL_AMD64_REL32_5,
        IMAGE_REL_AMD64_SECTION,
        IMAGE_REL_AMD64_SECREL,
        IMAGE_REL_AMD64_SECREL7,
        IMAGE_REL_AMD64_TOKEN,
        IMAGE_REL_AMD64_SREL32,
        IMAGE_REL_AMD64_PAIR,
        IMAGE_REL_AMD64_SSPAN32
    ] {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("Unknown AMD64 relocation type 0x{r_type:x}"))
    }
}

/// Section characteristic bit values.
pub mod scn {
    use super::SectionFlags;

    pub const CNT_CODE: SectionFlags = SectionFlags::from_u32(object::pe::IMAGE_SCN_CNT_CODE);
    pub const CNT_INITIALIZED_DATA: SectionFlags =
        SectionFlags::from_u32(object::pe::IMAGE_SCN_CNT_INITIALIZED_DATA);
    pub const CNT_UNINITIALIZED_DATA: SectionFlags =
        SectionFlags::from_u32(object::pe::IMAGE_SCN_CNT_UNINITIALIZED_DATA);
    pub const LNK_INFO: SectionFlags = SectionFlags::from_u32(object::pe::IMAGE_SCN_LNK_INFO);
    pub const LNK_REMOVE: SectionFlags = SectionFlags::from_u32(object::pe::IMAGE_SCN_LNK_REMOVE);
    pub const LNK_NRELOC_OVFL: SectionFlags =
        SectionFlags::from_u32(object::pe::IMAGE_SCN_LNK_NRELOC_OVFL);
    pub const MEM_DISCARDABLE: SectionFlags =
        SectionFlags::from_u32(object::pe::IMAGE_SCN_MEM_DISCARDABLE);
    pub const MEM_EXECUTE: SectionFlags = SectionFlags::from_u32(object::pe::IMAGE_SCN_MEM_EXECUTE);
    pub const MEM_READ: SectionFlags = SectionFlags::from_u32(object::pe::IMAGE_SCN_MEM_READ);
    pub const MEM_WRITE: SectionFlags = SectionFlags::from_u32(object::pe::IMAGE_SCN_MEM_WRITE);

    /// The alignment sub-field of the characteristics word. Encodes alignment 1 << n as
    /// (n + 1) << 20.
    pub const ALIGN_MASK: u32 = 0x00f0_0000;
    pub const ALIGN_SHIFT: u32 = 20;
}

/// Symbol type and storage-class values.
pub mod sym {
    pub const CLASS_EXTERNAL: u8 = object::pe::IMAGE_SYM_CLASS_EXTERNAL;
    pub const CLASS_STATIC: u8 = object::pe::IMAGE_SYM_CLASS_STATIC;

    pub const TYPE_NONE: u16 = object::pe::IMAGE_SYM_TYPE_NULL;
    pub const TYPE_FUNCTION: u16 =
        object::pe::IMAGE_SYM_DTYPE_FUNCTION << object::pe::IMAGE_SYM_DTYPE_SHIFT;
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SectionFlags(u32);

impl SectionFlags {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn contains(self, flag: SectionFlags) -> bool {
        self.0 & flag.0 != 0
    }

    #[must_use]
    pub const fn from_u32(raw: u32) -> SectionFlags {
        SectionFlags(raw)
    }

    /// Returns self with the specified flags set.
    #[must_use]
    pub const fn with(self, flags: SectionFlags) -> SectionFlags {
        SectionFlags(self.0 | flags.0)
    }

    /// Returns self with the specified flags cleared.
    #[must_use]
    pub const fn without(self, flags: SectionFlags) -> SectionFlags {
        SectionFlags(self.0 & !flags.0)
    }

    /// Returns self with the alignment sub-field set to 1 << exponent, replacing whatever
    /// alignment bits were present.
    #[must_use]
    pub const fn with_alignment_exponent(self, exponent: u8) -> SectionFlags {
        SectionFlags(self.0 & !scn::ALIGN_MASK | ((exponent as u32 + 1) << scn::ALIGN_SHIFT))
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SectionFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (flag, ch) in [
            (scn::MEM_READ, "R"),
            (scn::MEM_WRITE, "W"),
            (scn::MEM_EXECUTE, "X"),
            (scn::CNT_CODE, "C"),
            (scn::CNT_INITIALIZED_DATA, "D"),
            (scn::CNT_UNINITIALIZED_DATA, "U"),
            (scn::LNK_INFO, "I"),
            (scn::LNK_REMOVE, "L"),
            (scn::LNK_NRELOC_OVFL, "O"),
        ] {
            if self.contains(flag) {
                f.write_str(ch)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SectionFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self, f)
    }
}

impl std::ops::BitOrAssign for SectionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The semantic relocation kinds produced by the ahead-of-time compilation pipeline. Each
/// architecture maps these to its own on-disk relocation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocationKind {
    /// A rel32 call to a function compiled into the same image.
    DirectCall,

    /// A rel32 call routed through a locally-emitted stub. Encoded like `DirectCall`.
    StubCall,

    /// A call through a pointer that is resolved when the image is loaded. No static relocation
    /// is emitted; the call site is patched at a different layer.
    IndirectCall,

    /// A call into the host runtime through an indirection the static linker cannot resolve.
    ForeignCallIndirect,

    /// A rip-relative load of a global-offset-table cell holding a runtime-metadata address.
    GotLoad,

    /// A rip-relative load inside a PLT stub of the stub's own GOT cell.
    PltGotLoad,

    /// A 64-bit GOT cell holding the address of an external PLT symbol, filled in by the dynamic
    /// loader.
    GotPltSlot,
}

/// What the assembler should do with one relocation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationAction {
    Emit(CoffRelocation),

    /// Drop the record without emitting anything.
    Skip,
}

/// An on-disk relocation type together with the rule for deriving the patched virtual address
/// from the record's nominal offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoffRelocation {
    pub r_type: u16,
    pub adjust: OffsetAdjust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetAdjust {
    /// The relocated field is the trailing 4 bytes of the instruction: offset + size - 4.
    CallOperand,

    /// The relocation applies to the load preceding the instruction the offset points at:
    /// offset - 4.
    PrecedingLoad,

    /// The offset is already the address of the relocated field.
    None,
}

impl OffsetAdjust {
    /// Derives the patched virtual address, or `None` when the record's offset and size leave
    /// no room for the relocated field.
    #[must_use]
    pub fn apply(self, offset: u64, size: u64) -> Option<u64> {
        match self {
            OffsetAdjust::CallOperand => (offset + size).checked_sub(4),
            OffsetAdjust::PrecedingLoad => offset.checked_sub(4),
            OffsetAdjust::None => Some(offset),
        }
    }
}
