//! `${VAR}` and `${VAR:-fallback}` expansion for raw config text.
//!
//! Expansion runs before parsing, so a placeholder works in any string value
//! (`url = "${N8N_WEBHOOK_URL:-http://localhost:5678/webhook/wa}"`). An empty
//! variable counts as unset when a fallback is given, as in POSIX shells.

/// Raw text after expansion, plus the names that had neither a value nor a
/// fallback. Those placeholders stay in the text verbatim.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Expanded {
    pub text: String,
    pub unresolved: Vec<String>,
}

/// Expand placeholders from the process environment.
pub fn expand(input: &str) -> Expanded {
    expand_with(input, |name| std::env::var(name).ok())
}

pub(crate) fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> Expanded {
    let mut out = Expanded {
        text: String::with_capacity(input.len()),
        unresolved: Vec::new(),
    };
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.text.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder as written.
            rest = &rest[start..];
            break;
        };
        let inner = &after[..end];
        rest = &after[end + 1..];

        let (name, fallback) = match inner.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (inner, None),
        };
        if !is_var_name(name) {
            out.text.push_str("${");
            out.text.push_str(inner);
            out.text.push('}');
            continue;
        }

        match (lookup(name), fallback) {
            (Some(value), Some(fallback)) if value.is_empty() => out.text.push_str(fallback),
            (Some(value), _) => out.text.push_str(&value),
            (None, Some(fallback)) => out.text.push_str(fallback),
            (None, None) => {
                out.text.push_str("${");
                out.text.push_str(name);
                out.text.push('}');
                if !out.unresolved.iter().any(|n| n == name) {
                    out.unresolved.push(name.to_string());
                }
            },
        }
    }
    out.text.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
