use anyhow::{Context, Result};
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Fill `{name}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text containing braces
/// cannot trigger a second substitution. Unknown placeholders stay verbatim.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];
        let replaced = candidate.find('}').and_then(|close| {
            let key = &candidate[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &candidate[close + 1..];
            }
            None => {
                out.push('{');
                rest = candidate;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Title-case text the way report headings expect: the first letter of every
/// alphabetic run is upper-cased and the rest lower-cased.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_cased = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_cased {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(ch);
            prev_cased = false;
        }
    }
    out
}

/// Human label for a snake_case field name (`estimated_total_cost` ->
/// `Estimated Total Cost`).
pub fn field_title(name: &str) -> String {
    title_case(&name.replace('_', " "))
}

/// Render a land size so whole numbers keep one decimal (`1.0`, `2.5`).
pub fn format_acres(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Make a location usable as a single file name component.
pub fn sanitize_file_stem(raw: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars =
        UNSAFE.get_or_init(|| Regex::new(r"[/\\\x00-\x1f]+").expect("valid file stem regex"));
    let cleaned = unsafe_chars.replace_all(raw.trim(), "_");
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        return "site".to_string();
    }
    cleaned.to_string()
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Replace `path` with `bytes` via a sibling temp file so readers never see a
/// half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_template_does_not_rescan_values() {
        let out = fill_template(
            "Site {location} sized {land_size}",
            &[("location", "{land_size}"), ("land_size", "2.0")],
        );
        assert_eq!(out, "Site {land_size} sized 2.0");
    }

    #[test]
    fn fill_template_keeps_unknown_and_unclosed_braces() {
        let out = fill_template("{\"a\": {x}} {open", &[("y", "1")]);
        assert_eq!(out, "{\"a\": {x}} {open");
    }

    #[test]
    fn title_case_matches_heading_rules() {
        assert_eq!(field_title("proposed_building"), "Proposed Building");
        assert_eq!(field_title("roi"), "Roi");
        assert_eq!(title_case("MIXED case-words"), "Mixed Case-Words");
        assert_eq!(title_case("3rd floor"), "3Rd Floor");
    }

    #[test]
    fn acres_keep_one_decimal_for_whole_numbers() {
        assert_eq!(format_acres(1.0), "1.0");
        assert_eq!(format_acres(2.5), "2.5");
        assert_eq!(format_acres(0.1), "0.1");
        assert_eq!(format_acres(100.0), "100.0");
    }

    #[test]
    fn file_stem_strips_separators() {
        assert_eq!(sanitize_file_stem("Cheras, KL"), "Cheras, KL");
        assert_eq!(sanitize_file_stem("Jalan 1/2\\3"), "Jalan 1_2_3");
        assert_eq!(sanitize_file_stem("  ..  "), "site");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_string("héllo", 2), "h");
        assert_eq!(truncate_string("abc", 10), "abc");
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested/state.json");
        write_atomic(&path, b"one").expect("first write");
        write_atomic(&path, b"two").expect("second write");
        assert_eq!(std::fs::read_to_string(&path).expect("read back"), "two");
    }
}
