//! Derived properties of a regex node, packed into a bitmask.

use std::fmt::{Display, Formatter};

use crate::error::{malformed, Result};

const IS_ALWAYS_NULLABLE: u32 = 1;
const STARTS_WITH_LINE_ANCHOR: u32 = 2;
const IS_LAZY: u32 = 4;
const CAN_BE_NULLABLE: u32 = 8;
const CONTAINS_SOME_ANCHOR: u32 = 16;
const CONTAINS_LINE_ANCHOR: u32 = 32;
const CONTAINS_SOME_CHARACTER: u32 = 64;
const STARTS_WITH_BOUNDARY_ANCHOR: u32 = 128;

const ALL: u32 = 255;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RegexInfo(u32);

/// Flags for [`RegexInfo::mk`]; laziness defaults to `true`.
#[derive(Debug, Copy, Clone)]
pub struct InfoFlags {
    pub is_always_nullable: bool,
    pub can_be_nullable: bool,
    pub starts_with_line_anchor: bool,
    pub starts_with_boundary_anchor: bool,
    pub contains_some_anchor: bool,
    pub contains_line_anchor: bool,
    pub contains_some_character: bool,
    pub is_lazy: bool,
}

impl Default for InfoFlags {
    fn default() -> Self {
        Self {
            is_always_nullable: false,
            can_be_nullable: false,
            starts_with_line_anchor: false,
            starts_with_boundary_anchor: false,
            contains_some_anchor: false,
            contains_line_anchor: false,
            contains_some_character: false,
            is_lazy: true,
        }
    }
}

fn bit(cond: bool, mask: u32) -> u32 {
    if cond {
        mask
    } else {
        0
    }
}

impl RegexInfo {
    pub fn mk(flags: InfoFlags) -> Self {
        let f = flags;
        RegexInfo(
            bit(f.is_always_nullable, IS_ALWAYS_NULLABLE)
                | bit(f.starts_with_line_anchor, STARTS_WITH_LINE_ANCHOR)
                | bit(f.starts_with_boundary_anchor, STARTS_WITH_BOUNDARY_ANCHOR)
                | bit(f.can_be_nullable || f.is_always_nullable, CAN_BE_NULLABLE)
                | bit(
                    f.starts_with_line_anchor
                        || f.starts_with_boundary_anchor
                        || f.contains_some_anchor
                        || f.contains_line_anchor,
                    CONTAINS_SOME_ANCHOR,
                )
                | bit(f.starts_with_line_anchor || f.contains_line_anchor, CONTAINS_LINE_ANCHOR)
                | bit(f.contains_some_character, CONTAINS_SOME_CHARACTER)
                | bit(f.is_lazy, IS_LAZY),
        )
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_nullable(self) -> bool {
        self.0 & IS_ALWAYS_NULLABLE != 0
    }
    pub fn can_be_nullable(self) -> bool {
        self.0 & CAN_BE_NULLABLE != 0
    }
    pub fn starts_with_some_anchor(self) -> bool {
        self.0 & (STARTS_WITH_LINE_ANCHOR | STARTS_WITH_BOUNDARY_ANCHOR) != 0
    }
    pub fn starts_with_line_anchor(self) -> bool {
        self.0 & STARTS_WITH_LINE_ANCHOR != 0
    }
    pub fn starts_with_boundary_anchor(self) -> bool {
        self.0 & STARTS_WITH_BOUNDARY_ANCHOR != 0
    }
    pub fn contains_some_anchor(self) -> bool {
        self.0 & CONTAINS_SOME_ANCHOR != 0
    }
    pub fn contains_line_anchor(self) -> bool {
        self.0 & CONTAINS_LINE_ANCHOR != 0
    }
    pub fn contains_some_character(self) -> bool {
        self.0 & CONTAINS_SOME_CHARACTER != 0
    }
    pub fn is_lazy(self) -> bool {
        self.0 & IS_LAZY != 0
    }

    /// A disjunction is lazy only if every member is; other bits are joined.
    pub fn or(infos: impl IntoIterator<Item = RegexInfo>) -> Self {
        let mut lazy = IS_LAZY;
        let mut i = 0;
        for info in infos {
            lazy &= info.0;
            i |= info.0;
        }
        RegexInfo((i & !IS_LAZY) | lazy)
    }

    /// Nullability and laziness are conjunctive, everything else is joined.
    pub fn and(infos: impl IntoIterator<Item = RegexInfo>) -> Self {
        let mut lazy = IS_LAZY;
        let mut nullable = IS_ALWAYS_NULLABLE | CAN_BE_NULLABLE;
        let mut i = 0;
        for info in infos {
            lazy &= info.0;
            nullable &= info.0;
            i |= info.0;
        }
        i = (i & !IS_LAZY) | lazy;
        i = (i & !(IS_ALWAYS_NULLABLE | CAN_BE_NULLABLE)) | nullable;
        RegexInfo(i)
    }

    pub fn concat(left: RegexInfo, right: RegexInfo) -> Self {
        RegexInfo::mk(InfoFlags {
            is_always_nullable: left.is_nullable() && right.is_nullable(),
            can_be_nullable: left.can_be_nullable() && right.can_be_nullable(),
            starts_with_line_anchor: left.starts_with_line_anchor()
                || (left.can_be_nullable() && right.starts_with_line_anchor()),
            starts_with_boundary_anchor: left.starts_with_boundary_anchor()
                || (left.can_be_nullable() && right.starts_with_boundary_anchor()),
            contains_some_anchor: left.contains_some_anchor() || right.contains_some_anchor(),
            contains_line_anchor: left.contains_line_anchor() || right.contains_line_anchor(),
            contains_some_character: left.contains_some_character() || right.contains_some_character(),
            is_lazy: left.is_lazy() && right.is_lazy(),
        })
    }

    /// Anchor bits come from the body; a zero lower bound makes the loop nullable.
    pub fn looped(body: RegexInfo, lower: u32, lazy: bool) -> Self {
        let mut i = body.0;
        if lower == 0 {
            i |= IS_ALWAYS_NULLABLE | CAN_BE_NULLABLE;
        }
        if lazy {
            i |= IS_LAZY;
        } else {
            i &= !IS_LAZY;
        }
        RegexInfo(i)
    }

    /// The complement matches the empty word exactly when the body cannot.
    pub fn not(inner: RegexInfo) -> Self {
        let mut i = inner.0 & !(IS_ALWAYS_NULLABLE | CAN_BE_NULLABLE);
        if !inner.can_be_nullable() {
            i |= IS_ALWAYS_NULLABLE | CAN_BE_NULLABLE;
        } else if !inner.is_nullable() {
            i |= CAN_BE_NULLABLE;
        }
        RegexInfo(i)
    }

    /// Uppercase hexadecimal.
    pub fn serialize(self) -> String {
        format!("{:X}", self.0)
    }

    pub fn parse(s: &str) -> Result<Self> {
        match u32::from_str_radix(s, 16) {
            Ok(i) if i <= ALL => Ok(RegexInfo(i)),
            _ => malformed(format!("invalid regex info {:?}", s)),
        }
    }
}

impl Display for RegexInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn character() -> RegexInfo {
        RegexInfo::mk(InfoFlags {
            contains_some_character: true,
            ..Default::default()
        })
    }

    fn epsilon() -> RegexInfo {
        RegexInfo::mk(InfoFlags {
            is_always_nullable: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_mk() {
        let info = RegexInfo::mk(InfoFlags {
            starts_with_line_anchor: true,
            ..Default::default()
        });
        assert!(info.contains_some_anchor());
        assert!(info.contains_line_anchor());
        assert!(info.is_lazy());
        assert!(epsilon().can_be_nullable());
    }

    #[test]
    fn test_combinators() {
        let c = character();
        let e = epsilon();
        assert!(!RegexInfo::concat(c, e).is_nullable());
        assert!(RegexInfo::concat(e, e).is_nullable());
        assert!(RegexInfo::or([c, e]).is_nullable());
        assert!(!RegexInfo::and([c, e]).is_nullable());

        let star = RegexInfo::looped(c, 0, false);
        assert!(star.is_nullable());
        assert!(!star.is_lazy());
        assert!(!RegexInfo::or([star, e]).is_lazy());
        assert!(!RegexInfo::looped(c, 1, true).is_nullable());

        let not_c = RegexInfo::not(c);
        assert!(not_c.is_nullable());
        let not_e = RegexInfo::not(e);
        assert!(!not_e.can_be_nullable());
    }

    #[test]
    fn test_serialize() {
        let info = RegexInfo::mk(InfoFlags {
            contains_some_character: true,
            starts_with_boundary_anchor: true,
            ..Default::default()
        });
        let s = info.serialize();
        assert_eq!(s, "D4");
        assert_eq!(RegexInfo::parse(&s), Ok(info));
        assert!(RegexInfo::parse("100").is_err());
        assert!(RegexInfo::parse("xyz").is_err());
    }
}
