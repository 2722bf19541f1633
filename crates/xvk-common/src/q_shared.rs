// q_shared.rs — foundational types and functions shared by all modules

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

pub const MAX_TOKEN_CHARS: usize = 1024; // max length of an individual token

// ============================================================
// CVARS (console variables) flags
// ============================================================

pub const CVAR_NOSET: i32 = 8; // don't allow change from console at all
pub const CVAR_LATCH: i32 = 16; // save changes until restart

// ============================================================
// MATHLIB: vector operations
// ============================================================

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

/// Largest of the three components.
#[inline]
pub fn vector_max_component(v: &Vec3) -> f32 {
    v[0].max(v[1]).max(v[2])
}

/// Strip directory and extension: "maps/c1a0.bsp" -> "c1a0".
pub fn com_file_base(path: &str) -> &str {
    let start = path.rfind(['/', '\\']).map_or(0, |p| p + 1);
    let name = &path[start..];
    match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}

// ============================================================
// Token parser (COM_ParseFile equivalent)
// ============================================================

/// Characters that always form a token of their own outside quotes.
#[inline]
fn is_single_char_token(c: u8) -> bool {
    matches!(c, b'{' | b'}' | b'(' | b')')
}

/// Parse one token from `data`, handling `//` comments, "quoted strings"
/// and the brace/paren single-character tokens used by entity text.
///
/// Returns `None` once the input holds no further token (the engine's
/// `NULL` return); otherwise `(token, remaining)`. A quoted empty string
/// yields an empty token, which is distinct from end of input.
pub fn com_parse_file(data: &str) -> Option<(String, &str)> {
    let bytes = data.as_bytes();
    let mut pos = 0usize;

    // skip whitespace and comments
    loop {
        while pos < bytes.len() && bytes[pos] <= b' ' {
            pos += 1;
        }
        if pos >= bytes.len() {
            return None;
        }
        if bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'/') {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        break;
    }

    // handle quoted strings
    if bytes[pos] == b'"' {
        let start = pos + 1;
        let mut end = start;
        while end < bytes.len() && bytes[end] != b'"' {
            end += 1;
        }
        let token = truncate_token(&data[start..end]);
        let rest = if end < bytes.len() { end + 1 } else { end };
        return Some((token, &data[rest..]));
    }

    if is_single_char_token(bytes[pos]) {
        return Some((data[pos..pos + 1].to_string(), &data[pos + 1..]));
    }

    // parse a regular word
    let start = pos;
    while pos < bytes.len() && bytes[pos] > b' ' && !is_single_char_token(bytes[pos]) && bytes[pos] != b'"' {
        pos += 1;
    }
    Some((truncate_token(&data[start..pos]), &data[pos..]))
}

fn truncate_token(s: &str) -> String {
    if s.len() < MAX_TOKEN_CHARS {
        return s.to_string();
    }
    let mut end = MAX_TOKEN_CHARS - 1;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Parse up to `out.len()` leading whitespace-separated floats from `s`,
/// stopping at the first token that is not a number. Returns how many
/// were stored, matching what a `sscanf("%f %f ...")` conversion count
/// reports.
pub fn parse_floats(s: &str, out: &mut [f32]) -> usize {
    let mut count = 0;
    for tok in s.split_whitespace() {
        if count == out.len() {
            break;
        }
        match tok.parse::<f32>() {
            Ok(v) => {
                out[count] = v;
                count += 1;
            }
            Err(_) => break,
        }
    }
    count
}
