//! Instruction prefix scanning (component E).
//!
//! x86 prefixes are order-independent and each belongs to one of five
//! groups; a guest instruction may carry at most one from each group. This
//! scans the byte stream greedily the way real decoders (and the original
//! `x86_insn` prefix bitfield) do, stopping at the first non-prefix byte.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOverride {
    Es,
    Cs,
    Ss,
    Ds,
    Fs,
    Gs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepPrefix {
    Repne,
    Rep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prefixes {
    pub lock: bool,
    pub rep: Option<RepPrefix>,
    pub segment: Option<SegmentOverride>,
    pub operand_size_override: bool,
    pub address_size_override: bool,
}

/// Scans prefix bytes starting at `bytes[0]`, returning the parsed set and
/// the number of bytes consumed.
pub fn scan_prefixes(bytes: &[u8]) -> (Prefixes, usize) {
    let mut prefixes = Prefixes::default();
    let mut consumed = 0;
    while consumed < bytes.len() {
        match bytes[consumed] {
            0xF0 => prefixes.lock = true,
            0xF2 => prefixes.rep = Some(RepPrefix::Repne),
            0xF3 => prefixes.rep = Some(RepPrefix::Rep),
            0x26 => prefixes.segment = Some(SegmentOverride::Es),
            0x2E => prefixes.segment = Some(SegmentOverride::Cs),
            0x36 => prefixes.segment = Some(SegmentOverride::Ss),
            0x3E => prefixes.segment = Some(SegmentOverride::Ds),
            0x64 => prefixes.segment = Some(SegmentOverride::Fs),
            0x65 => prefixes.segment = Some(SegmentOverride::Gs),
            0x66 => prefixes.operand_size_override = true,
            0x67 => prefixes.address_size_override = true,
            _ => break,
        }
        consumed += 1;
    }
    (prefixes, consumed)
}
