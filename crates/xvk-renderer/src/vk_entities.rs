// vk_entities.rs — static light entities from the map entity string
//
// Lights are classified and collected only. They are not fed into the
// light grid; the caller decides what to do with them.

use xvk_common::common::com_dprintf;
use xvk_common::q_shared::{com_parse_file, parse_floats, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Light,
    LightSpot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticLight {
    pub origin: Vec3,
    pub color: Vec3,
    pub kind: LightKind,
}

bitflags::bitflags! {
    /// Fields seen so far in the current entity block.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct Have: u32 {
        const ORIGIN = 0x01;
        const COLOR  = 0x02;
        const CLASS  = 0x04;
        const ALL    = Self::ORIGIN.bits() | Self::COLOR.bits() | Self::CLASS.bits();
    }
}

/// Decode a `_light` value: 1 component is a gray level, 3 are RGB, a
/// fourth scales the RGB. Everything is in 0..255 units.
fn parse_light_color(value: &str) -> Option<Vec3> {
    let mut v = [0.0f32; 4];
    match parse_floats(value, &mut v) {
        1 => {
            let c = v[0] / 255.0;
            Some([c, c, c])
        }
        3 => {
            let scale = 1.0 / 255.0;
            Some([v[0] * scale, v[1] * scale, v[2] * scale])
        }
        4 => {
            let scale = v[3] / (255.0 * 255.0);
            Some([v[0] * scale, v[1] * scale, v[2] * scale])
        }
        _ => None,
    }
}

/// Scan entity text for `light` and `light_spot` blocks that carry an
/// origin and a color.
pub fn parse_static_light_entities(entities: &str) -> Vec<StaticLight> {
    let mut lights = Vec::new();

    let mut have = Have::empty();
    let mut origin: Vec3 = [0.0; 3];
    let mut color: Vec3 = [0.0; 3];
    let mut kind: Option<LightKind> = None;

    let mut pos = entities;
    loop {
        let Some((key, rest)) = com_parse_file(pos) else {
            break;
        };
        pos = rest;

        if key == "{" {
            have = Have::empty();
            kind = None;
            continue;
        }

        if key == "}" {
            if have == Have::ALL {
                if let Some(kind) = kind {
                    com_dprintf(&format!(
                        "Static light {:?} at ({} {} {}) color ({} {} {})\n",
                        kind, origin[0], origin[1], origin[2], color[0], color[1], color[2]
                    ));
                    lights.push(StaticLight { origin, color, kind });
                }
            }
            continue;
        }

        let Some((value, rest)) = com_parse_file(pos) else {
            break;
        };
        pos = rest;

        match key.as_str() {
            "origin" => {
                let mut v = [0.0f32; 3];
                if parse_floats(&value, &mut v) == 3 {
                    origin = v;
                    have |= Have::ORIGIN;
                }
            }
            "_light" => {
                if let Some(c) = parse_light_color(&value) {
                    color = c;
                    have |= Have::COLOR;
                }
            }
            "classname" => {
                kind = match value.as_str() {
                    "light" => Some(LightKind::Light),
                    "light_spot" => Some(LightKind::LightSpot),
                    _ => None,
                };
                have |= Have::CLASS;
            }
            _ => {}
        }
    }

    lights
}

/// Value of `key` in the first entity block (worldspawn).
pub fn worldspawn_value(entities: &str, key: &str) -> Option<String> {
    let (open, mut pos) = com_parse_file(entities)?;
    if open != "{" {
        return None;
    }

    loop {
        let (k, rest) = com_parse_file(pos)?;
        if k == "}" {
            return None;
        }
        let (v, rest) = com_parse_file(rest)?;
        if k == key {
            return Some(v);
        }
        pos = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    // ============================================================
    // Classification
    // ============================================================

    #[test]
    fn test_light_entities() {
        let text = r#"
{
"classname" "worldspawn"
"wad" "\half-life\valve\halflife.wad"
}
{
"origin" "64 -32 128"
"_light" "255 128 0 200"
"classname" "light"
}
{
"classname" "light_spot"
"_light" "51"
"origin" "0 0 0"
}
"#;
        let lights = parse_static_light_entities(text);
        assert_eq!(lights.len(), 2);

        assert_eq!(lights[0].kind, LightKind::Light);
        assert_eq!(lights[0].origin, [64.0, -32.0, 128.0]);
        let s = 200.0 / (255.0 * 255.0);
        assert!(approx(lights[0].color, [255.0 * s, 128.0 * s, 0.0]));

        assert_eq!(lights[1].kind, LightKind::LightSpot);
        assert!(approx(lights[1].color, [0.2, 0.2, 0.2]));
    }

    #[test]
    fn test_three_component_light() {
        let lights = parse_static_light_entities(
            r#"{ "classname" "light" "origin" "1 2 3" "_light" "255 0 51" }"#,
        );
        assert_eq!(lights.len(), 1);
        assert!(approx(lights[0].color, [1.0, 0.0, 0.2]));
    }

    #[test]
    fn test_incomplete_blocks_discarded() {
        let text = r#"
{ "classname" "light" "origin" "1 2 3" }
{ "classname" "light" "_light" "200" }
{ "classname" "light" "origin" "1 2" "_light" "200" }
{ "classname" "info_player_start" "origin" "1 2 3" "_light" "200" }
{ "origin" "1 2 3" "_light" "1 2" "classname" "light" }
"#;
        assert!(parse_static_light_entities(text).is_empty());
    }

    #[test]
    fn test_fields_reset_between_blocks() {
        let text = r#"
{ "origin" "1 2 3" "_light" "100" }
{ "classname" "light" }
"#;
        assert!(parse_static_light_entities(text).is_empty());
    }

    #[test]
    fn test_truncated_text() {
        assert!(parse_static_light_entities("").is_empty());
        assert!(parse_static_light_entities(r#"{ "classname" "light" "origin""#).is_empty());
    }

    // ============================================================
    // Worldspawn keys
    // ============================================================

    #[test]
    fn test_worldspawn_value() {
        let text = r#"{ "classname" "worldspawn" "wad" "a.wad;b.wad" } { "wad" "other" }"#;
        assert_eq!(worldspawn_value(text, "wad").as_deref(), Some("a.wad;b.wad"));
        assert_eq!(worldspawn_value(text, "message"), None);
        assert_eq!(worldspawn_value("", "wad"), None);
    }
}
