use std::fmt;

/// Writes `bits` as `(0x3: FIN | UNIDIRECTIONAL)`, naming every set flag
/// found in `names`.
pub(super) fn fmt_flags(fmt: &mut fmt::Formatter, bits: u8, names: &[(u8, &str)]) -> fmt::Result {
    write!(fmt, "({:#x}", bits)?;

    let mut sep = ": ";
    for &(mask, name) in names {
        if bits & mask == mask {
            write!(fmt, "{}{}", sep, name)?;
            sep = " | ";
        }
    }

    fmt.write_str(")")
}
