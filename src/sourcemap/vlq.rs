// src/sourcemap/vlq.rs

//! Base64 VLQ as used by the `mappings` field of Source Map v3.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const SHIFT: u32 = 5;
const CONTINUATION: u32 = 1 << SHIFT;
const MASK: u32 = CONTINUATION - 1;

pub fn encode(value: i64, out: &mut String) {
    let mut vlq: u64 = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        (value as u64) << 1
    };

    loop {
        let mut digit = (vlq & MASK as u64) as u32;
        vlq >>= SHIFT;
        if vlq > 0 {
            digit |= CONTINUATION;
        }
        out.push(ALPHABET[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

fn digit_of(c: u8) -> Option<u32> {
    ALPHABET.iter().position(|&a| a == c).map(|p| p as u32)
}

/// Decode every value of one comma-separated segment.
///
/// Returns `None` on an invalid character or a truncated value.
pub fn decode_segment(segment: &str) -> Option<Vec<i64>> {
    let mut values = Vec::new();
    let mut acc: u64 = 0;
    let mut shift: u32 = 0;
    let mut pending = false;

    for c in segment.bytes() {
        let digit = digit_of(c)?;
        acc |= ((digit & MASK) as u64) << shift;
        if digit & CONTINUATION != 0 {
            shift += SHIFT;
            pending = true;
            if shift > 60 {
                return None;
            }
            continue;
        }

        let negative = acc & 1 == 1;
        let magnitude = (acc >> 1) as i64;
        values.push(if negative { -magnitude } else { magnitude });
        acc = 0;
        shift = 0;
        pending = false;
    }

    if pending { None } else { Some(values) }
}
