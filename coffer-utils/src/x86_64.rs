use crate::coff::CoffRelocation;
use crate::coff::OffsetAdjust;
use crate::coff::RelocationAction;
use crate::coff::RelocationKind;

/// Maps a semantic relocation kind to its AMD64 COFF encoding. Returns `None` for kinds this
/// target has no encoding for; callers treat that as a hard error rather than emitting a
/// default type.
#[must_use]
pub fn relocation_action(kind: RelocationKind) -> Option<RelocationAction> {
    match kind {
        RelocationKind::DirectCall | RelocationKind::StubCall => {
            Some(RelocationAction::Emit(CoffRelocation {
                r_type: object::pe::IMAGE_REL_AMD64_REL32,
                adjust: OffsetAdjust::CallOperand,
            }))
        }
        // The call target is patched when the image is loaded, not by the static linker.
        RelocationKind::IndirectCall => Some(RelocationAction::Skip),
        RelocationKind::GotLoad | RelocationKind::PltGotLoad => {
            Some(RelocationAction::Emit(CoffRelocation {
                r_type: object::pe::IMAGE_REL_AMD64_REL32,
                adjust: OffsetAdjust::PrecedingLoad,
            }))
        }
        RelocationKind::GotPltSlot => Some(RelocationAction::Emit(CoffRelocation {
            r_type: object::pe::IMAGE_REL_AMD64_ADDR64,
            adjust: OffsetAdjust::None,
        })),
        RelocationKind::ForeignCallIndirect => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_call_is_rel32() {
        let RelocationAction::Emit(info) = relocation_action(RelocationKind::DirectCall).unwrap()
        else {
            panic!("expected an emitted relocation");
        };
        assert_eq!(info.r_type, object::pe::IMAGE_REL_AMD64_REL32);
        assert_eq!(info.adjust, OffsetAdjust::CallOperand);
    }

    #[test]
    fn indirect_call_is_skipped() {
        assert_eq!(
            relocation_action(RelocationKind::IndirectCall),
            Some(RelocationAction::Skip)
        );
    }

    #[test]
    fn foreign_indirect_call_is_unmapped() {
        assert_eq!(relocation_action(RelocationKind::ForeignCallIndirect), None);
    }
}
