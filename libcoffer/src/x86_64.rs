use coffer_utils::coff::RelocationAction;
use coffer_utils::coff::RelocationKind;
use coffer_utils::coff::amd64_rel_type_to_string;
use std::borrow::Cow;

pub(crate) struct X86_64;

impl crate::arch::Arch for X86_64 {
    fn file_header_machine_magic() -> u16 {
        object::pe::IMAGE_FILE_MACHINE_AMD64
    }

    fn relocation_action(kind: RelocationKind) -> Option<RelocationAction> {
        coffer_utils::x86_64::relocation_action(kind)
    }

    fn rel_type_to_string(r_type: u16) -> Cow<'static, str> {
        amd64_rel_type_to_string(r_type)
    }
}
