use crate::error::Result;
use anyhow::bail;
use std::fmt::Display;

/// An alignment. Always a power of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub(crate) struct Alignment {
    pub(crate) exponent: u8,
}

/// The maximum alignment that the section format supports (1024 bytes).
pub(crate) const MAX: Alignment = Alignment { exponent: 10 };

/// Alignment of the section-header array and the symbol table within the file.
pub(crate) const TABLE: Alignment = Alignment { exponent: 2 };

impl Alignment {
    pub(crate) fn new(raw: u32) -> Result<Self> {
        if !raw.is_power_of_two() {
            bail!("Invalid alignment 0x{raw:x}");
        }
        let exponent = raw.trailing_zeros();
        if exponent > u32::from(MAX.exponent) {
            bail!("Unsupported alignment 0x{raw:x}");
        }
        Ok(Alignment {
            exponent: exponent as u8,
        })
    }

    pub(crate) fn value(self) -> u64 {
        1 << self.exponent
    }

    pub(crate) fn align_up(self, value: u64) -> u64 {
        value.next_multiple_of(self.value())
    }
}

impl Display for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.value(), f)
    }
}

#[test]
fn test_new() {
    assert_eq!(Alignment::new(1).unwrap().value(), 1);
    assert_eq!(Alignment::new(1024).unwrap(), MAX);
    assert!(Alignment::new(0).is_err());
    assert!(Alignment::new(24).is_err());
    assert!(Alignment::new(2048).is_err());
}

#[test]
fn test_align_up() {
    assert_eq!(Alignment::new(16).unwrap().align_up(16), 16);
    assert_eq!(Alignment::new(16).unwrap().align_up(15), 16);
    assert_eq!(Alignment::new(16).unwrap().align_up(1), 16);
    assert_eq!(Alignment::new(16).unwrap().align_up(0), 0);
    assert_eq!(Alignment::new(16).unwrap().align_up(31), 32);
}
