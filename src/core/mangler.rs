// This module maps Forth word names onto identifiers the GNU assembler accepts and back.
// Ordinary names are folded to lower case and prefixed with `v4_`; letters, digits and
// underscores pass through, a leading digit is protected with `z`, punctuation becomes an
// underscore-prefixed entity name (`!` -> `_Store`) and any other byte a two digit upper
// case hex escape (`_x7F`). Names that start with two underscores are "restricted": the
// underscores are stripped and the remainder keeps its case and skips the prefix, which is
// how runtime entry points and anonymous words get predictable assembler names. The output
// stops growing once it passes a fixed high-water mark. Demangling reverses the transform
// and never fails; anything without the prefix is reported as a restricted name.

//! Forth name mangling.

/// Mangled names stop growing once they pass this length.
pub const HIGH_WATER_MARK: usize = 4096 - 32;

/// Prefix carried by every unrestricted mangled name.
const PREFIX: &str = "v4_";

/// Names handed through both directions untouched.
const RESERVED: [&str; 2] = ["_start", "main"];

/// Punctuation and its entity spelling, in ascending byte order.
const ENTITIES: [(u8, &str); 31] = [
    (b'!', "Store"),
    (b'"', "Quote"),
    (b'#', "Hash"),
    (b'$', "Dollar"),
    (b'%', "Percent"),
    (b'&', "Amp"),
    (b'\'', "Tick"),
    (b'(', "Paren"),
    (b')', "Closeparen"),
    (b'*', "Star"),
    (b'+', "Plus"),
    (b',', "Comma"),
    (b'-', "Minus"),
    (b'.', "Dot"),
    (b'/', "Slash"),
    (b':', "Colon"),
    (b';', "Semicolon"),
    (b'<', "Less"),
    (b'=', "Equals"),
    (b'>', "Greater"),
    (b'?', "Question"),
    (b'@', "Fetch"),
    (b'[', "Leftbracket"),
    (b'\\', "Backslash"),
    (b']', "Rightbracket"),
    (b'^', "Caret"),
    (b'`', "Backtick"),
    (b'{', "Leftbrace"),
    (b'|', "Or"),
    (b'}', "Rightbrace"),
    (b'~', "Tilde"),
];

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

fn entity_name(byte: u8) -> Option<&'static str> {
    ENTITIES
        .iter()
        .find(|(b, _)| *b == byte)
        .map(|(_, name)| *name)
}

fn is_restricted(name: &str) -> bool {
    name.len() > 2 && name.starts_with("__")
}

fn is_simple(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Mangle a Forth name into an assembler identifier.
pub fn mangle(name: &str) -> String {
    if RESERVED.contains(&name) {
        return name.to_string();
    }
    if name == "__" {
        return String::new();
    }

    let restricted = is_restricted(name);
    let source: Vec<u8> = if restricted {
        name.as_bytes()[2..].to_vec()
    } else {
        name.bytes().map(|b| b.to_ascii_lowercase()).collect()
    };

    let mut mangled = String::new();
    for byte in source {
        if mangled.len() > HIGH_WATER_MARK {
            break;
        }
        if is_simple(byte) {
            if mangled.is_empty() && byte.is_ascii_digit() {
                mangled.push('z');
            }
            mangled.push(byte as char);
            continue;
        }

        if !mangled.is_empty() {
            mangled.push('_');
        }
        match entity_name(byte) {
            Some(entity) => mangled.push_str(entity),
            None => {
                mangled.push('x');
                mangled.push(HEX_DIGITS[(byte >> 4) as usize] as char);
                mangled.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
            }
        }
    }

    if restricted {
        mangled
    } else {
        format!("{PREFIX}{mangled}")
    }
}

/// Recover the Forth name from a mangled identifier.
///
/// Accepts arbitrary input. Names without the `v4_` prefix come back with a
/// leading `__`, marking them as restricted.
pub fn demangle(mangled: &str) -> String {
    if RESERVED.contains(&mangled) {
        return mangled.to_string();
    }
    if mangled == PREFIX {
        return String::new();
    }
    if mangled.len() < PREFIX.len() + 1 || !mangled.starts_with(PREFIX) {
        return format!("__{mangled}");
    }

    let rest = &mangled.as_bytes()[PREFIX.len()..];
    let mut out: Vec<u8> = Vec::with_capacity(rest.len());
    let mut pos = 0;

    while pos < rest.len() {
        // The first character of an escape carries no separating underscore,
        // so match against a view that restores it.
        let remainder = &rest[pos..];
        let view: Vec<u8> = if out.is_empty() {
            let mut v = Vec::with_capacity(remainder.len() + 1);
            v.push(b'_');
            v.extend_from_slice(remainder);
            v
        } else {
            remainder.to_vec()
        };
        let adjust = usize::from(out.is_empty());

        if let Some(byte) = untransform_hex(&view) {
            out.push(byte);
            pos += 4 - adjust;
            continue;
        }
        if let Some((byte, consumed)) = untransform_entity(&view) {
            out.push(byte);
            pos += consumed - adjust;
            continue;
        }

        if out.is_empty()
            && remainder.len() > 1
            && remainder[0] == b'z'
            && remainder[1].is_ascii_digit()
        {
            pos += 1;
        }
        out.push(rest[pos]);
        pos += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    HEX_DIGITS.iter().position(|&d| d == byte).map(|p| p as u8)
}

fn untransform_hex(view: &[u8]) -> Option<u8> {
    if view.len() < 4 || view[0] != b'_' || view[1] != b'x' {
        return None;
    }
    let high = hex_value(view[2])?;
    let low = hex_value(view[3])?;
    Some((high << 4) | low)
}

fn untransform_entity(view: &[u8]) -> Option<(u8, usize)> {
    if view.first() != Some(&b'_') {
        return None;
    }
    ENTITIES
        .iter()
        .find(|(_, name)| view[1..].starts_with(name.as_bytes()))
        .map(|(byte, name)| (*byte, name.len() + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_are_prefixed_and_folded() {
        assert_eq!(mangle("DUP"), "v4_dup");
        assert_eq!(mangle("swap"), "v4_swap");
        assert_eq!(mangle("2DUP"), "v4_z2dup");
    }

    #[test]
    fn test_reserved_names_pass_through() {
        assert_eq!(mangle("main"), "main");
        assert_eq!(mangle("_start"), "_start");
        assert_eq!(mangle("__"), "");
        assert_eq!(demangle("main"), "main");
        assert_eq!(demangle("_start"), "_start");
        assert_eq!(demangle("v4_"), "");
    }

    #[test]
    fn test_punctuation_entities() {
        assert_eq!(mangle("!"), "v4_Store");
        assert_eq!(mangle("c@"), "v4_c_Fetch");
        assert_eq!(mangle("+!"), "v4_Plus_Store");
        assert_eq!(mangle("2*"), "v4_z2_Star");
        assert_eq!(mangle("a b"), "v4_a_x20b");
    }

    #[test]
    fn test_restricted_names_keep_case() {
        assert_eq!(mangle("__Foo"), "Foo");
        assert_eq!(mangle("__v4_12"), "v4_12");
        assert_eq!(mangle("_dpush"), "v4__dpush");
    }

    #[test]
    fn test_demangle_inverts_mangle() {
        for name in ["dup", "c@", "+!", "2dup", "2*", "a b", "type", "r>", "0=", "?do"] {
            assert_eq!(demangle(&mangle(name)), name, "round trip of {name}");
        }
    }

    #[test]
    fn test_demangle_unprefixed_is_restricted() {
        assert_eq!(demangle("Foo"), "__Foo");
        assert_eq!(demangle("v4"), "__v4");
        assert_eq!(mangle(&demangle("printf")), "printf");
    }

    #[test]
    fn test_high_water_mark_bounds_length() {
        let long = "x".repeat(HIGH_WATER_MARK * 2);
        let mangled = mangle(&long);
        assert!(mangled.len() <= HIGH_WATER_MARK + 1 + PREFIX.len());

        let punct = "!".repeat(HIGH_WATER_MARK);
        assert!(mangle(&punct).len() < HIGH_WATER_MARK + 16);
    }

    #[test]
    fn test_demangle_never_panics() {
        let samples = [
            "v4__", "v4__x", "v4__xZ", "v4__x4", "v4_z", "v4_z9", "v4___", "v4_\u{e9}",
            "v4__Stor", "v4__x4G1", "v4_\u{1F600}_x41",
        ];
        for sample in samples {
            let _ = demangle(sample);
        }
        for byte in 0u8..=255 {
            let text = String::from_utf8_lossy(&[b'v', b'4', b'_', byte, b'_', byte]).into_owned();
            let _ = demangle(&text);
        }
    }
}
