//! Canonical string forms for ids and index keys, and the path-safety
//! normalization the sharded-file store applies to every path segment it
//! derives from user data (spec §4.6).

use bson::Bson;

/// A stable, type-tagged string representation of a BSON value, used both
/// for non-string ids and for index key buckets. Tagging by type keeps
/// `"30"` (the string) and `30` (the integer) from colliding.
pub fn canonical_value_string(value: &Bson) -> String {
    match value {
        Bson::String(s) => format!("s:{s}"),
        Bson::Int32(n) => format!("i:{n}"),
        Bson::Int64(n) => format!("l:{n}"),
        Bson::Double(n) => format!("d:{n}"),
        Bson::Boolean(b) => format!("b:{b}"),
        Bson::DateTime(dt) => format!("t:{}", dt.timestamp_millis()),
        Bson::ObjectId(oid) => format!("o:{}", oid.to_hex()),
        Bson::Null => "n:".to_string(),
        other => format!("j:{}", serde_json_or_debug(other)),
    }
}

#[cfg(feature = "fs")]
fn serde_json_or_debug(value: &Bson) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

#[cfg(not(feature = "fs"))]
fn serde_json_or_debug(value: &Bson) -> String {
    format!("{value:?}")
}

/// The canonical string form of a document id. Plain strings pass through
/// unmodified (so the common case produces readable paths); everything else
/// uses the tagged [`canonical_value_string`] form.
pub fn canonical_id_string(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        other => canonical_value_string(other),
    }
}

const RESERVED_WINDOWS_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const MAX_SEGMENT_LEN: usize = 200;

/// Normalize a path segment derived from user data into a path-safe form:
/// invalid filename characters are replaced, trailing dots/spaces are
/// stripped, reserved device names are prefixed, and length is capped while
/// preserving any apparent extension (spec §4.6).
pub fn safe_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_end_matches(['.', ' ']).to_string();
    let trimmed = if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed
    };

    let prefixed = if RESERVED_WINDOWS_NAMES
        .iter()
        .any(|n| n.eq_ignore_ascii_case(stem(&trimmed)))
    {
        format!("_{trimmed}")
    } else {
        trimmed
    };

    cap_length(&prefixed, MAX_SEGMENT_LEN)
}

fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) => name,
        Some(idx) => &name[..idx],
        None => name,
    }
}

fn cap_length(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let (stem, ext) = name.split_at(idx);
            let keep = max_len.saturating_sub(ext.chars().count());
            let truncated: String = stem.chars().take(keep).collect();
            format!("{truncated}{ext}")
        }
        _ => name.chars().take(max_len).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_characters_are_replaced() {
        assert_eq!(safe_name("a/b:c"), "a_b_c");
    }

    #[test]
    fn trailing_dots_and_spaces_are_stripped() {
        assert_eq!(safe_name("name.. "), "name");
    }

    #[test]
    fn reserved_device_names_are_prefixed() {
        assert_eq!(safe_name("con"), "_con");
        assert_eq!(safe_name("COM1"), "_COM1");
        assert_eq!(safe_name("console"), "console");
    }

    #[test]
    fn length_is_capped_preserving_extension() {
        let long = "a".repeat(300) + ".json";
        let capped = safe_name(&long);
        assert!(capped.chars().count() <= MAX_SEGMENT_LEN);
        assert!(capped.ends_with(".json"));
    }

    #[test]
    fn canonical_id_string_passes_strings_through() {
        assert_eq!(canonical_id_string(&Bson::String("abc".into())), "abc");
    }

    #[test]
    fn canonical_id_string_tags_non_strings() {
        assert_eq!(canonical_id_string(&Bson::Int32(30)), "i:30");
        assert_ne!(
            canonical_id_string(&Bson::Int32(30)),
            canonical_id_string(&Bson::String("30".into()))
        );
    }
}
