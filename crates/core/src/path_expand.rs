// SPDX-License-Identifier: MIT

//! `~`/`%USERPROFILE%` substitution in the two contexts the service needs
//! it: a plain string (job source/destination, already-parsed JSON values)
//! and raw JSON text (the whole config file, substituted before it is
//! parsed so that a path can legally contain a literal backslash).

use std::path::Path;

use regex::Regex;

/// Expand `~`, a leading `~/...`, and `%USERPROFILE%` against `home` in an
/// already-parsed string value, then expand any remaining `$NAME`/`${NAME}`
/// environment references from the process environment.
pub fn expand_plain(input: &str, home: &Path) -> String {
    let home_str = home.to_string_lossy();
    let mut out = if input == "~" {
        home_str.to_string()
    } else if let Some(rest) = input.strip_prefix("~/") {
        format!("{}/{}", home_str.trim_end_matches('/'), rest)
    } else {
        input.to_string()
    };

    out = replace_case_insensitive(&out, "%USERPROFILE%", &home_str);
    expand_env_vars(&out)
}

/// Expand `~`/`%USERPROFILE%` directly inside raw JSON *text*, before it is
/// parsed. Operates on the literal bytes of the document so that `~`
/// occurring inside a JSON string value is replaced by the home directory
/// even when that substitution introduces characters (backslashes on
/// Windows-style paths) that must be doubled to remain valid JSON escapes.
///
/// Substitution is confined to text that looks like a JSON string body:
/// this function does not fully parse JSON, so a `~` appearing outside any
/// string (which would already make the document invalid JSON) is left
/// untouched.
pub fn expand_json_text(input: &str, home: &Path) -> String {
    let home_str = home.to_string_lossy();
    let home_escaped = home_str.replace('\\', "\\\\");

    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    let mut in_string = false;
    let mut escaped = false;
    // Tracks whether the next character is the first one of the current
    // string's body, so `~` is only treated as a home-directory token at
    // the start of a string (mirroring `expand_plain`'s leading-`~` rule),
    // never when it merely occurs somewhere inside one.
    let mut at_string_start = false;

    while let Some((_, c)) = chars.next() {
        if !in_string {
            if c == '"' {
                in_string = true;
                at_string_start = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            at_string_start = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                at_string_start = false;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '~' if at_string_start
                && matches!(chars.peek(), Some((_, '/')) | Some((_, '\\')) | Some((_, '"'))) =>
            {
                out.push_str(&home_escaped);
                at_string_start = false;
            }
            _ => {
                at_string_start = false;
                out.push(c);
            }
        }
    }

    replace_case_insensitive(&out, "%USERPROFILE%", &home_escaped)
}

/// Case-insensitive literal substring replacement, preserving the
/// surrounding text byte-for-byte (used for `%USERPROFILE%`, which
/// Windows-style configs may spell in any case).
fn replace_case_insensitive(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut pos = 0;
    while let Some(found) = lower_haystack[pos..].find(&lower_needle) {
        let start = pos + found;
        let end = start + needle.len();
        out.push_str(&haystack[pos..start]);
        out.push_str(replacement);
        pos = end;
    }
    out.push_str(&haystack[pos..]);
    out
}

#[allow(clippy::expect_used, clippy::unwrap_used)]
fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("constant env-var pattern is valid");
    re.replace_all(input, |caps: &regex::Captures| {
        // one of the two alternation groups always matches when the whole pattern does
        let name = caps.get(1).or_else(|| caps.get(2)).unwrap().as_str();
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
#[path = "path_expand_tests.rs"]
mod tests;
