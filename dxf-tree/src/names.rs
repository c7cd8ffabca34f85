// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Group-code ↔ attribute-name alias table (§6) and the handful of fixed
//! node names the pipeline cares about by name (§3, §4.1, §6).

use std::borrow::Cow;

/// Maps a group code to the attribute name it is stored under, per the
/// range table in §6. Point-bearing ranges (10-range/20-range/30-range)
/// and the other repeating ranges follow the `<prefix><index>` pattern
/// with the base code left un-suffixed.
pub fn attr_name_for_code(code: u16) -> Cow<'static, str> {
    if let Some(name) = ranged_name(code, 10, 18, "x") {
        return name;
    }
    if let Some(name) = ranged_name(code, 20, 28, "y") {
        return name;
    }
    if let Some(name) = ranged_name(code, 30, 37, "z") {
        return name;
    }
    if let Some(name) = ranged_name(code, 40, 47, "float") {
        return name;
    }
    if let Some(name) = ranged_name(code, 50, 58, "angle") {
        return name;
    }
    if let Some(name) = ranged_name(code, 70, 78, "int") {
        return name;
    }
    if let Some(name) = ranged_name(code, 90, 98, "int_32") {
        return name;
    }
    if let Some(name) = ranged_name(code, 280, 289, "int_8") {
        return name;
    }
    if let Some(name) = ranged_name(code, 290, 299, "bool") {
        return name;
    }

    match code {
        1 => Cow::Borrowed("text"),
        2 => Cow::Borrowed("name"),
        3 => Cow::Borrowed("text2"),
        4 => Cow::Borrowed("text3"),
        5 => Cow::Borrowed("handle"),
        105 => Cow::Borrowed("dimvar_handle"),
        6 => Cow::Borrowed("linetype"),
        7 => Cow::Borrowed("textstyle"),
        8 => Cow::Borrowed("layer"),
        38 => Cow::Borrowed("elevation"),
        39 => Cow::Borrowed("thickness"),
        48 => Cow::Borrowed("linetype_scale"),
        60 => Cow::Borrowed("invisible"),
        62 => Cow::Borrowed("color"),
        66 => Cow::Borrowed("entities_follow"),
        67 => Cow::Borrowed("space"),
        100 => Cow::Borrowed("subclass"),
        102 => Cow::Borrowed("control_string"),
        210 => Cow::Borrowed("extrusion_direction_x"),
        220 => Cow::Borrowed("extrusion_direction_y"),
        230 => Cow::Borrowed("extrusion_direction_z"),
        999 => Cow::Borrowed("comment"),
        other => Cow::Owned(format!("i{}", other)),
    }
}

fn ranged_name(code: u16, start: u16, end: u16, prefix: &'static str) -> Option<Cow<'static, str>> {
    if code < start || code > end {
        return None;
    }
    let idx = code - start;
    Some(if idx == 0 {
        Cow::Borrowed(prefix)
    } else {
        Cow::Owned(format!("{}{}", prefix, idx))
    })
}

/// Reverses [`attr_name_for_code`]: given an attribute name, returns its
/// group code, so the emitter can walk attributes in ascending group-code
/// order (§4.1 "Emit").
pub fn code_for_attr_name(name: &str) -> Option<u16> {
    if let Some(c) = reverse_ranged(name, "x", 10) {
        return Some(c);
    }
    if let Some(c) = reverse_ranged(name, "y", 20) {
        return Some(c);
    }
    if let Some(c) = reverse_ranged(name, "z", 30) {
        return Some(c);
    }
    if let Some(c) = reverse_ranged(name, "float", 40) {
        return Some(c);
    }
    if let Some(c) = reverse_ranged(name, "angle", 50) {
        return Some(c);
    }
    if let Some(c) = reverse_ranged(name, "int_32", 90) {
        return Some(c);
    }
    if let Some(c) = reverse_ranged(name, "int_8", 280) {
        return Some(c);
    }
    if let Some(c) = reverse_ranged(name, "bool", 290) {
        return Some(c);
    }
    // `int` must be tried after `int_32`/`int_8`, since those share the
    // `int` prefix textually.
    if let Some(c) = reverse_ranged(name, "int", 70) {
        return Some(c);
    }

    match name {
        "text" => Some(1),
        "name" => Some(2),
        "text2" => Some(3),
        "text3" => Some(4),
        "handle" => Some(5),
        "dimvar_handle" => Some(105),
        "linetype" => Some(6),
        "textstyle" => Some(7),
        "layer" => Some(8),
        "elevation" => Some(38),
        "thickness" => Some(39),
        "linetype_scale" => Some(48),
        "invisible" => Some(60),
        "color" => Some(62),
        "entities_follow" => Some(66),
        "space" => Some(67),
        "subclass" => Some(100),
        "control_string" => Some(102),
        "extrusion_direction_x" => Some(210),
        "extrusion_direction_y" => Some(220),
        "extrusion_direction_z" => Some(230),
        "comment" => Some(999),
        other if other.starts_with('i') => other[1..].parse().ok(),
        _ => None,
    }
}

fn reverse_ranged(name: &str, prefix: &str, start: u16) -> Option<u16> {
    if name == prefix {
        return Some(start);
    }
    let suffix = name.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let idx: u16 = suffix.parse().ok()?;
    Some(start + idx)
}

/// General attributes propagated from a replaced node onto each of its
/// replacements, per §3 ("attribute inheritance").
pub const GENERAL_ATTRS: &[&str] = &[
    "layer",
    "color",
    "linetype",
    "linetype_scale",
    "elevation",
    "thickness",
    "invisible",
    "space",
    "textstyle",
    "comment",
];

/// The six canonical top-level sections, in canonical order (§4.2).
pub const CANONICAL_SECTIONS: &[&str] = &["HEADER", "CLASSES", "TABLES", "BLOCKS", "ENTITIES", "OBJECTS"];

/// Returns the end-node name that closes `starter`, if any (§3, §6).
pub fn end_node_for(starter: &str) -> Option<&'static str> {
    match starter {
        "SECTION" => Some("ENDSEC"),
        "TABLE" => Some("ENDTAB"),
        "BLOCK" => Some("ENDBLK"),
        "POLYLINE" => Some("SEQEND"),
        "ROOT" => Some("EOF"),
        _ => None,
    }
}

/// Returns the starter name an end-node closes, if any (reverse of
/// [`end_node_for`]).
pub fn starter_for_end_node(end: &str) -> Option<&'static str> {
    match end {
        "ENDSEC" => Some("SECTION"),
        "ENDTAB" => Some("TABLE"),
        "ENDBLK" => Some("BLOCK"),
        "SEQEND" => Some("POLYLINE"),
        "EOF" => Some("ROOT"),
        _ => None,
    }
}

/// Reserved `$ACADVER` version strings, R10 (`AC1006`) through 2018
/// (`AC1032`), per §6.
pub fn is_known_acadver(version: &str) -> bool {
    matches!(
        version,
        "AC1006"
            | "AC1009"
            | "AC1012"
            | "AC1014"
            | "AC1015"
            | "AC1018"
            | "AC1021"
            | "AC1024"
            | "AC1027"
            | "AC1032"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_range_round_trips() {
        for code in 10..=18u16 {
            let name = attr_name_for_code(code);
            assert_eq!(code_for_attr_name(&name), Some(code), "code {}", code);
        }
        for code in 20..=28u16 {
            let name = attr_name_for_code(code);
            assert_eq!(code_for_attr_name(&name), Some(code), "code {}", code);
        }
    }

    #[test]
    fn fixed_codes_round_trip() {
        for &(code, _) in &[(1u16, "text"), (8, "layer"), (999, "comment"), (230, "extrusion_direction_z")] {
            let name = attr_name_for_code(code);
            assert_eq!(code_for_attr_name(&name), Some(code));
        }
    }

    #[test]
    fn fallback_code_round_trips() {
        let name = attr_name_for_code(1071);
        assert_eq!(name, "i1071");
        assert_eq!(code_for_attr_name(&name), Some(1071));
    }

    #[test]
    fn end_node_table_is_complete() {
        assert_eq!(end_node_for("SECTION"), Some("ENDSEC"));
        assert_eq!(starter_for_end_node("ENDSEC"), Some("SECTION"));
        assert_eq!(end_node_for("POLYLINE"), Some("SEQEND"));
    }
}
