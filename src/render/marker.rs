// Marker-context compilation (spec.md section 4.8, step 1-3): rewrite the
// source template's brace-function syntax into sentinel tokens, then split
// the resulting text on the recorded token sequence to get the segment list.
//
// The dialect recognized here has no control flow left to resolve at render
// time (loop expansion already happened in the analyzer, section 4.7), so
// the "execute the intermediate template against a marker context" step and
// the rewrite step collapse into one regex pass: every recognized
// `{function}` or `{function:lo-hi}` occurrence is replaced in place with its
// token as we scan, in order.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::render::compiled::{Placeholder, PlaceholderKind};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)(?::(-?\d+)-(-?\d+))?\}").unwrap());

pub fn marker_token(kind: PlaceholderKind, index: usize) -> String {
    format!("__PH_{}_{}__", kind.marker_name(), index)
}

/// Returns the marker output (static text interleaved with sentinel tokens)
/// and the ordered placeholder list. Brace text that doesn't name a
/// recognized function passes through unchanged as literal content.
pub fn compile_to_marker_output(template: &str) -> (String, Vec<Placeholder>) {
    let mut placeholders = Vec::new();
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let whole = caps.get(0).unwrap();
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        let name = &caps[1];
        let Some(kind) = PlaceholderKind::from_name(name) else {
            out.push_str(whole.as_str());
            continue;
        };

        let num_range = match (caps.get(2), caps.get(3)) {
            (Some(a), Some(b)) => match (a.as_str().parse(), b.as_str().parse()) {
                (Ok(lo), Ok(hi)) => Some((lo, hi)),
                _ => None,
            },
            _ => None,
        };

        let index = placeholders.len();
        let token = marker_token(kind, index);
        out.push_str(&token);
        placeholders.push(Placeholder {
            token,
            kind,
            arg: None,
            num_range,
        });
    }
    out.push_str(&template[last..]);
    (out, placeholders)
}

/// Splits `marker_output` on the recorded token sequence, in order. Returns
/// `None` if a token is missing or the resulting segment count doesn't
/// satisfy `len(segments) == len(placeholders) + 1` — the caller discards
/// the compilation and falls back to the slow path for that render.
pub fn split_on_tokens(marker_output: &str, placeholders: &[Placeholder]) -> Option<Vec<String>> {
    let mut segments = Vec::with_capacity(placeholders.len() + 1);
    let mut rest = marker_output;
    for ph in placeholders {
        let idx = rest.find(ph.token.as_str())?;
        segments.push(rest[..idx].to_string());
        rest = &rest[idx + ph.token.len()..];
    }
    segments.push(rest.to_string());
    if segments.len() == placeholders.len() + 1 {
        Some(segments)
    } else {
        None
    }
}
