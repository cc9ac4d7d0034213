/// Widest signal the store can represent.
pub const MAX_WIDTH: u32 = 64;

/// Mask keeping the low `width` bits, e.g. width 4 gives `0xf`.
///
/// Width 64 yields `u64::MAX` instead of overflowing the shift. Width 0 never
/// passes validation, but maps to 0 rather than panicking.
pub fn mask_for_width(width: u32) -> u64 {
    match width {
        0 => 0,
        w if w >= MAX_WIDTH => u64::MAX,
        w => (1u64 << w) - 1,
    }
}

pub fn is_valid_width(width: u32) -> bool {
    (1..=MAX_WIDTH).contains(&width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_for_width() {
        assert_eq!(mask_for_width(1), 0x1);
        assert_eq!(mask_for_width(4), 0xf);
        assert_eq!(mask_for_width(32), 0xffff_ffff);
        assert_eq!(mask_for_width(63), u64::MAX >> 1);
        assert_eq!(mask_for_width(64), u64::MAX);
        assert_eq!(mask_for_width(0), 0);
    }

    #[test]
    fn test_valid_widths() {
        assert!(!is_valid_width(0));
        assert!(is_valid_width(1));
        assert!(is_valid_width(64));
        assert!(!is_valid_width(65));
    }
}
