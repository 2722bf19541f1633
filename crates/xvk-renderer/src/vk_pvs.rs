// vk_pvs.rs — potentially visible set decompression
//
// Each caller owns its scratch row. The returned slice borrows the buffer,
// so it is valid until the next decompression into the same buffer.

use crate::vk_local::{LightsError, MAX_VISBYTES};
use xvk_common::common::com_dprintf;

/// Expand a run-length encoded visibility row into `out`, writing exactly
/// `out.len()` bytes. Nonzero bytes are literal, a zero byte is followed by
/// a count of zero bytes. `None` means no vis data: everything is visible.
pub fn mod_decompress_pvs_into(input: Option<&[u8]>, out: &mut [u8]) {
    let row = out.len();

    let input = match input {
        Some(input) => input,
        None => {
            // no vis info, so make all visible
            out.fill(0xff);
            return;
        }
    };

    let mut o = 0;
    let mut i = 0;
    while o < row {
        let Some(&b) = input.get(i) else {
            com_dprintf(&format!("Mod_DecompressPVS: truncated vis row ({} of {} bytes)\n", o, row));
            out[o..].fill(0);
            return;
        };

        if b != 0 {
            out[o] = b;
            o += 1;
            i += 1;
            continue;
        }

        let c = input.get(i + 1).copied().unwrap_or(0) as usize;
        i += 2;
        let end = (o + c).min(row);
        out[o..end].fill(0);
        o = end;
        if c == 0 && i > input.len() {
            // trailing zero without a count
            out[o..].fill(0);
            return;
        }
    }
}

/// Test visibility bit `cluster` of a decompressed row.
#[inline]
pub fn check_vis_bit(vis: &[u8], cluster: i32) -> bool {
    if cluster < 0 {
        return false;
    }
    let c = cluster as usize;
    vis.get(c >> 3).is_some_and(|b| b & (1 << (c & 7)) != 0)
}

// ============================================================
// Scratch buffer
// ============================================================

/// Reusable decompression row sized for the largest supported level.
pub struct PvsBuffer {
    data: Box<[u8; MAX_VISBYTES]>,
}

impl Default for PvsBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PvsBuffer {
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; MAX_VISBYTES]),
        }
    }

    /// Decompress `input` into the scratch row and return the first
    /// `visbytes` bytes of it.
    pub fn decompress(&mut self, input: Option<&[u8]>, visbytes: usize) -> Result<&[u8], LightsError> {
        if visbytes > MAX_VISBYTES {
            return Err(LightsError::VisTooLarge { visbytes });
        }
        let out = &mut self.data[..visbytes];
        mod_decompress_pvs_into(input, out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    /// Reference encoder: zero runs become (0, count) pairs of at most 255.
    fn compress(row: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < row.len() {
            if row[i] != 0 {
                out.push(row[i]);
                i += 1;
                continue;
            }
            let mut rep = 0;
            while i < row.len() && row[i] == 0 && rep < 255 {
                rep += 1;
                i += 1;
            }
            out.push(0);
            out.push(rep as u8);
        }
        out
    }

    // ============================================================
    // Decompression
    // ============================================================

    #[test]
    fn test_absent_input_is_all_visible() {
        let mut buf = PvsBuffer::new();
        let row = buf.decompress(None, 5).unwrap();
        assert_eq!(row, &[0xff; 5]);
    }

    #[test]
    fn test_literal_and_zero_runs() {
        let mut buf = PvsBuffer::new();
        let row = buf.decompress(Some(&[0x81, 0x00, 0x03, 0x42]), 5).unwrap();
        assert_eq!(row, &[0x81, 0, 0, 0, 0x42]);
    }

    #[test]
    fn test_overshooting_run_is_clipped() {
        let mut out = [0xaau8; 4];
        mod_decompress_pvs_into(Some(&[0x01, 0x00, 0xff, 0x07]), &mut out);
        assert_eq!(out, [0x01, 0, 0, 0]);
    }

    #[test]
    fn test_truncated_input_zero_fills() {
        let mut out = [0xaau8; 6];
        mod_decompress_pvs_into(Some(&[0x0f, 0xf0]), &mut out);
        assert_eq!(out, [0x0f, 0xf0, 0, 0, 0, 0]);

        let mut out = [0xaau8; 3];
        mod_decompress_pvs_into(Some(&[0x0f, 0x00]), &mut out);
        assert_eq!(out, [0x0f, 0, 0]);
    }

    #[test]
    fn test_zero_length_row() {
        let mut buf = PvsBuffer::new();
        assert!(buf.decompress(Some(&[0x01]), 0).unwrap().is_empty());
    }

    #[test]
    fn test_visbytes_over_capacity() {
        let mut buf = PvsBuffer::new();
        assert_eq!(
            buf.decompress(None, MAX_VISBYTES + 1),
            Err(LightsError::VisTooLarge { visbytes: MAX_VISBYTES + 1 })
        );
        assert_eq!(buf.decompress(None, MAX_VISBYTES).unwrap().len(), MAX_VISBYTES);
    }

    #[test]
    fn test_random_rows_decode_to_exact_length() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        let mut buf = PvsBuffer::new();
        for _ in 0..200 {
            let len = rng.gen_range(1..600);
            let row: Vec<u8> = (0..len)
                .map(|_| if rng.gen_bool(0.6) { 0 } else { rng.gen_range(1..=255) })
                .collect();
            let packed = compress(&row);
            let out = buf.decompress(Some(&packed), len).unwrap();
            assert_eq!(out.len(), len);
            assert_eq!(out, &row[..]);
        }
    }

    // ============================================================
    // Bit tests
    // ============================================================

    #[test]
    fn test_check_vis_bit() {
        let vis = [0b0000_0101u8, 0b1000_0000];
        assert!(check_vis_bit(&vis, 0));
        assert!(!check_vis_bit(&vis, 1));
        assert!(check_vis_bit(&vis, 2));
        assert!(check_vis_bit(&vis, 15));
        assert!(!check_vis_bit(&vis, 16));
        assert!(!check_vis_bit(&vis, -1));
    }
}
