//! Map/taxlot code normalization.
//!
//! Sources disagree on lot padding: `391E04DB1400` and `391E04DB01400`
//! are the same parcel. The canonical form is 13 characters: a 4-character
//! township/range prefix, 2-digit section, 0–2 quarter letters, and the
//! lot number zero-padded to fill the rest.

use regex::Regex;
use std::sync::OnceLock;

/// Canonical code length.
pub const CANONICAL_LEN: usize = 13;

fn suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2})([A-Da-d]{0,2})(\d+)$").expect("valid regex"))
}

/// Canonical 13-character form. Codes that are already canonical, too
/// short, or not shaped like a map/taxlot are returned unchanged.
pub fn normalize(code: &str) -> String {
    if code.len() == CANONICAL_LEN || code.len() < 8 || !code.is_ascii() {
        return code.to_string();
    }

    let (prefix, rest) = code.split_at(4);
    let Some(caps) = suffix_re().captures(rest) else {
        return code.to_string();
    };

    let section = &caps[1];
    let quarter = &caps[2];
    let lot = &caps[3];
    let width = 7 - quarter.len();
    format!("{prefix}{section}{quarter}{lot:0>width$}")
}
