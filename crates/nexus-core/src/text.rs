//! Text normalization for public aliases.
//!
//! Embed keys are stored lower-scored: whitespace becomes `_`, anything
//! outside `[A-Za-z0-9_]` is dropped, runs of `_` collapse, and leading or
//! trailing `_` are trimmed. `" Jazz & Blues!! "` becomes `jazz_blues`.

/// Conform `raw` to lower-scored form.
pub fn to_lower_scored(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = if c.is_whitespace() { '_' } else { c };
        if !(c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c.to_ascii_lowercase());
    }
    out.trim_matches('_').to_string()
}

/// Normalize an embed key; `None` when nothing survives normalization.
pub fn to_embed_key(raw: &str) -> Option<String> {
    let key = to_lower_scored(raw);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_scores_words() {
        assert_eq!(to_lower_scored("Buns and Jams"), "buns_and_jams");
        assert_eq!(to_lower_scored(" Jazz & Blues!! "), "jazz_blues");
        assert_eq!(to_lower_scored("__already_scored__"), "already_scored");
        assert_eq!(to_lower_scored("MiXeD123"), "mixed123");
    }

    #[test]
    fn empty_embed_key_is_none() {
        assert_eq!(to_embed_key("  !!  "), None);
        assert_eq!(to_embed_key(""), None);
        assert_eq!(to_embed_key("Coolair"), Some("coolair".to_string()));
    }

    mod proptests {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn lower_scored_is_idempotent(raw in ".{0,40}") {
                let once = to_lower_scored(&raw);
                prop_assert_eq!(to_lower_scored(&once), once.clone());
            }

            #[test]
            fn lower_scored_alphabet(raw in ".{0,40}") {
                let out = to_lower_scored(&raw);
                prop_assert!(
                    out.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                );
                prop_assert!(!out.starts_with('_') && !out.ends_with('_'));
                prop_assert!(!out.contains("__"));
            }
        }
    }
}
