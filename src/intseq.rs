//! Integer-sequence codec.
//!
//! Chosen representation is recorded in two metadata bytes written
//! ahead of the payload: a strategy selector (dense bit-packing,
//! byte-packing, or varint) plus a bit/byte width, and a flag marking
//! whether the values were zig-zag transformed before packing (used
//! for signed sequences). The payload's element count is always
//! supplied by the caller — it comes from the outer offset/score
//! format, never re-derived here.
//!
//! No third-party integer-sequence library fits this crate's
//! dependency stack, so the strategy selection (dense bit-packing vs.
//! byte-packing vs. varint, plus zig-zag for signed sequences) is
//! implemented directly here rather than pulled in from an existing
//! Rust crate.

use crate::error::FormatError;
use crate::varint::VarintLsbFirst;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    BitPacked = 0,
    BytePacked = 1,
    Varint = 2,
}

impl Strategy {
    fn from_tag(tag: u8) -> Result<Strategy, FormatError> {
        match tag {
            0 => Ok(Strategy::BitPacked),
            1 => Ok(Strategy::BytePacked),
            2 => Ok(Strategy::Varint),
            other => Err(FormatError::malformed(format!(
                "unknown integer sequence strategy tag {other}"
            ))),
        }
    }
}

fn bits_needed(max: u64) -> u32 {
    if max == 0 {
        0
    } else {
        64 - max.leading_zeros()
    }
}

fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn zigzag_decode(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

fn varint_len(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

fn select_strategy(values: &[u64]) -> (Strategy, u8) {
    if values.is_empty() {
        return (Strategy::BitPacked, 0);
    }
    let max = values.iter().copied().max().unwrap();
    let bits = bits_needed(max);
    let bit_width = bits as u8;
    let byte_width = ((bits + 7) / 8).max(if max == 0 { 0 } else { 1 }) as u8;

    let bitpacked_bytes = (values.len() * bit_width as usize + 7) / 8;
    let bytepacked_bytes = values.len() * byte_width as usize;
    let varint_bytes: usize = values.iter().map(|&v| varint_len(v)).sum();

    let mut best = (Strategy::BitPacked, bit_width, bitpacked_bytes);
    if bytepacked_bytes < best.2 {
        best = (Strategy::BytePacked, byte_width, bytepacked_bytes);
    }
    if varint_bytes < best.2 {
        best = (Strategy::Varint, 0, varint_bytes);
    }
    (best.0, best.1)
}

fn write_bitpacked(out: &mut Vec<u8>, values: &[u64], width: u8) {
    if width == 0 {
        return;
    }
    let mask: u128 = if width == 64 {
        u64::MAX as u128
    } else {
        (1u128 << width) - 1
    };
    let mut acc: u128 = 0;
    let mut nbits: u32 = 0;
    for &v in values {
        acc |= ((v as u128) & mask) << nbits;
        nbits += width as u32;
        while nbits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            nbits -= 8;
        }
    }
    if nbits > 0 {
        out.push((acc & 0xff) as u8);
    }
}

fn read_bitpacked(
    input: &[u8],
    count: usize,
    width: u8,
) -> Result<(Vec<u64>, usize), FormatError> {
    if width == 0 {
        return Ok((vec![0u64; count], 0));
    }
    let mask: u128 = if width == 64 {
        u64::MAX as u128
    } else {
        (1u128 << width) - 1
    };
    let total_bits = count * width as usize;
    let total_bytes = (total_bits + 7) / 8;
    if input.len() < total_bytes {
        return Err(FormatError::truncated("reading a bit-packed integer sequence"));
    }
    let mut acc: u128 = 0;
    let mut nbits: u32 = 0;
    let mut pos = 0;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        while nbits < width as u32 {
            acc |= (input[pos] as u128) << nbits;
            pos += 1;
            nbits += 8;
        }
        out.push((acc & mask) as u64);
        acc >>= width as u32;
        nbits -= width as u32;
    }
    Ok((out, total_bytes))
}

fn write_bytepacked(out: &mut Vec<u8>, values: &[u64], width: u8) {
    for &v in values {
        let bytes = v.to_le_bytes();
        out.extend_from_slice(&bytes[..width as usize]);
    }
}

fn read_bytepacked(
    input: &[u8],
    count: usize,
    width: u8,
) -> Result<(Vec<u64>, usize), FormatError> {
    let total = count * width as usize;
    if input.len() < total {
        return Err(FormatError::truncated("reading a byte-packed integer sequence"));
    }
    let mut out = Vec::with_capacity(count);
    let mut pos = 0;
    for _ in 0..count {
        let mut bytes = [0u8; 8];
        bytes[..width as usize].copy_from_slice(&input[pos..pos + width as usize]);
        out.push(u64::from_le_bytes(bytes));
        pos += width as usize;
    }
    Ok((out, total))
}

fn encode_values(out: &mut Vec<u8>, values: &[u64], zigzag: bool) {
    let (strategy, width) = select_strategy(values);
    let meta = (strategy as u8) | if zigzag { 0x04 } else { 0 };
    out.push(meta);
    out.push(width);
    match strategy {
        Strategy::BitPacked => write_bitpacked(out, values, width),
        Strategy::BytePacked => write_bytepacked(out, values, width),
        Strategy::Varint => {
            for &v in values {
                VarintLsbFirst::encode(out, v);
            }
        }
    }
}

fn decode_values(input: &[u8], count: usize) -> Result<(Vec<u64>, bool, usize), FormatError> {
    let meta = *input
        .first()
        .ok_or_else(|| FormatError::truncated("reading integer sequence metadata"))?;
    let width = *input
        .get(1)
        .ok_or_else(|| FormatError::truncated("reading integer sequence metadata"))?;
    let strategy = Strategy::from_tag(meta & 0x03)?;
    let zigzag = meta & 0x04 != 0;
    let payload = &input[2..];
    let (values, consumed) = match strategy {
        Strategy::BitPacked => read_bitpacked(payload, count, width)?,
        Strategy::BytePacked => read_bytepacked(payload, count, width)?,
        Strategy::Varint => {
            let mut values = Vec::with_capacity(count);
            let mut pos = 0;
            for _ in 0..count {
                let (v, n) = VarintLsbFirst::decode(&payload[pos..])?;
                values.push(v);
                pos += n;
            }
            (values, pos)
        }
    };
    Ok((values, zigzag, consumed + 2))
}

/// Encodes an unsigned integer sequence (used for offset deltas).
pub fn encode_u64(out: &mut Vec<u8>, values: &[u64]) {
    encode_values(out, values, false);
}

/// Decodes `count` unsigned integers, returning the values and the
/// number of bytes consumed.
pub fn decode_u64(input: &[u8], count: usize) -> Result<(Vec<u64>, usize), FormatError> {
    let (values, _zigzag, consumed) = decode_values(input, count)?;
    Ok((values, consumed))
}

/// Encodes a signed integer sequence (used for integer-packed scores).
/// Values are zig-zag transformed before strategy selection.
pub fn encode_i64(out: &mut Vec<u8>, values: &[i64]) {
    let zz: Vec<u64> = values.iter().map(|&v| zigzag_encode(v)).collect();
    encode_values(out, &zz, true);
}

/// Decodes `count` signed integers, returning the values and the number
/// of bytes consumed.
pub fn decode_i64(input: &[u8], count: usize) -> Result<(Vec<i64>, usize), FormatError> {
    let (zz, _zigzag, consumed) = decode_values(input, count)?;
    let values = zz.into_iter().map(zigzag_decode).collect();
    Ok((values, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_unsigned_run() {
        let values = vec![10u64, 10, 10, 10, 10];
        let mut buf = Vec::new();
        encode_u64(&mut buf, &values);
        let (decoded, consumed) = decode_u64(&buf, values.len()).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn round_trips_wide_unsigned_values() {
        let values = vec![0u64, u64::MAX, 12345678901234, 1];
        let mut buf = Vec::new();
        encode_u64(&mut buf, &values);
        let (decoded, _) = decode_u64(&buf, values.len()).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn round_trips_empty_sequence() {
        let values: Vec<u64> = Vec::new();
        let mut buf = Vec::new();
        encode_u64(&mut buf, &values);
        let (decoded, _) = decode_u64(&buf, 0).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn round_trips_signed_sequence_with_negatives() {
        let values = vec![-5i64, 3, -1000000, 0, i64::MIN, i64::MAX];
        let mut buf = Vec::new();
        encode_i64(&mut buf, &values);
        let (decoded, _) = decode_i64(&buf, values.len()).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn zigzag_is_a_bijection_on_sample_values() {
        for v in [-5i64, -1, 0, 1, 5, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }

    #[test]
    fn bit_packing_chosen_for_uniform_small_values() {
        let values = vec![3u64; 64];
        let mut buf = Vec::new();
        encode_u64(&mut buf, &values);
        assert_eq!(buf[0] & 0x03, Strategy::BitPacked as u8);
    }

    #[test]
    fn bytes_are_bounded_by_varint_of_max_times_count_plus_constant() {
        let values: Vec<u64> = (0..50).map(|i| i * 1000).collect();
        let max = *values.iter().max().unwrap();
        let mut buf = Vec::new();
        encode_u64(&mut buf, &values);
        let bound = varint_len(max) * values.len() + 16;
        assert!(buf.len() <= bound, "{} > {}", buf.len(), bound);
    }
}
