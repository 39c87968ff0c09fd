//! The ten-format tagged offset/score codec.
//!
//! Each record pairs a monotonically non-decreasing `offset` with a
//! 32-bit float `score`, optionally
//! accompanied by four finite prediction-band percentiles. A file is a
//! concatenation of independently tagged blocks; this module encodes
//! and decodes exactly one block's worth of records per call, and a
//! second set of entry points (`count`, `max_offset`) walk a whole
//! concatenated byte stream.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::FormatError;
use crate::intseq;
use crate::rle::RleReader;
use crate::varint::{VarintLsbFirst, VarintMsbFirst};

/// The four prediction-band percentiles, present only as a unit — a
/// record either has all four (finite) or none.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PredictionBands {
    pub p5: f32,
    pub p25: f32,
    pub p75: f32,
    pub p95: f32,
}

impl PredictionBands {
    fn all_finite(&self) -> bool {
        self.p5.is_finite() && self.p25.is_finite() && self.p75.is_finite() && self.p95.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OffsetScore {
    pub offset: u64,
    pub score: f32,
    pub bands: Option<PredictionBands>,
}

impl OffsetScore {
    pub fn new(offset: u64, score: f32) -> Self {
        OffsetScore {
            offset,
            score,
            bands: None,
        }
    }

    pub fn with_bands(offset: u64, score: f32, bands: PredictionBands) -> Self {
        OffsetScore {
            offset,
            score,
            bands: Some(bands),
        }
    }

    fn has_finite_bands(&self) -> bool {
        self.bands.map(|b| b.all_finite()).unwrap_or(false)
    }
}

/// Per-call decoding options. Callers that want filter pushdown pass the
/// allowed-offset set directly here instead of mutating any shared state.
#[derive(Default)]
pub struct DecodeOptions<'a> {
    pub filter: Option<&'a HashSet<u64>>,
}

impl<'a> DecodeOptions<'a> {
    pub fn none() -> Self {
        DecodeOptions { filter: None }
    }

    pub fn with_filter(filter: &'a HashSet<u64>) -> Self {
        DecodeOptions { filter: Some(filter) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum Tag {
    Empty = 0,
    WithPrediction = 1,
    Flexi = 2,
    DeltaOrochFloat = 3,
    DeltaOrochOroch = 4,
    SinglePositive1 = 5,
    SinglePositive2 = 6,
    SinglePositive3 = 7,
    SingleNegative1 = 8,
    SingleNegative2 = 9,
    SingleNegative3 = 10,
    SingleFloat = 11,
}

impl Tag {
    fn from_u8(tag: u8) -> Result<Tag, FormatError> {
        Ok(match tag {
            0 => Tag::Empty,
            1 => Tag::WithPrediction,
            2 => Tag::Flexi,
            3 => Tag::DeltaOrochFloat,
            4 => Tag::DeltaOrochOroch,
            5 => Tag::SinglePositive1,
            6 => Tag::SinglePositive2,
            7 => Tag::SinglePositive3,
            8 => Tag::SingleNegative1,
            9 => Tag::SingleNegative2,
            10 => Tag::SingleNegative3,
            11 => Tag::SingleFloat,
            other => return Err(FormatError::malformed(format!("unknown format tag {other}"))),
        })
    }
}

fn read_f32(input: &[u8], pos: &mut usize) -> Result<f32, FormatError> {
    let bytes = input
        .get(*pos..*pos + 4)
        .ok_or_else(|| FormatError::truncated("reading a raw f32 score"))?;
    *pos += 4;
    Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_le_uint(input: &[u8], pos: &mut usize, width: usize) -> Result<u32, FormatError> {
    let bytes = input
        .get(*pos..*pos + width)
        .ok_or_else(|| FormatError::truncated("reading a single-record packed score"))?;
    let mut v = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        v |= (b as u32) << (8 * i);
    }
    *pos += width;
    Ok(v)
}

/// Conservative upper bound on the encoded size of `count` records,
/// used to pre-allocate the output buffer. `OffsetScore` plus its
/// optional bands is 8 (offset) + 4 (score) + 16 (bands) = 28 bytes.
pub fn size_upper_bound(count: usize) -> usize {
    32 + count * 28
}

// ---------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------

pub fn encode(records: &[OffsetScore]) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(size_upper_bound(records.len()));

    if records.is_empty() {
        out.push(Tag::Empty as u8);
        return Ok(out);
    }

    for w in records.windows(2) {
        if w[1].offset < w[0].offset {
            return Err(FormatError::invariant("offsets must be non-decreasing"));
        }
    }

    if records.iter().any(|r| r.has_finite_bands()) {
        encode_with_prediction(&mut out, records);
    } else {
        encode_oroch(&mut out, records);
    }

    Ok(out)
}

fn encode_oroch(out: &mut Vec<u8>, records: &[OffsetScore]) {
    if records.len() == 1 {
        encode_single(out, &records[0]);
        return;
    }

    let all_integer = records
        .iter()
        .all(|r| (r.score.round() as i64) as f32 == r.score);
    let tag = if all_integer {
        Tag::DeltaOrochOroch
    } else {
        Tag::DeltaOrochFloat
    };
    out.push(tag as u8);

    VarintLsbFirst::encode(out, records.len() as u64);
    VarintLsbFirst::encode(out, records[0].offset);

    let deltas: Vec<u64> = records
        .windows(2)
        .map(|w| w[1].offset - w[0].offset)
        .collect();
    intseq::encode_u64(out, &deltas);

    if all_integer {
        let scores: Vec<i64> = records.iter().map(|r| r.score.round() as i64).collect();
        intseq::encode_i64(out, &scores);
    } else {
        for r in records {
            out.extend_from_slice(&r.score.to_le_bytes());
        }
    }
}

fn encode_single(out: &mut Vec<u8>, record: &OffsetScore) {
    let mut tag = Tag::SingleFloat;
    let mut magnitude: u64 = 0;
    let score_i = record.score.round() as i64;

    if (score_i as f32) == record.score {
        if score_i >= 0 {
            if score_i <= 0xff {
                tag = Tag::SinglePositive1;
                magnitude = score_i as u64;
            } else if score_i <= 0xffff {
                tag = Tag::SinglePositive2;
                magnitude = score_i as u64;
            } else if score_i <= 0xffffff {
                tag = Tag::SinglePositive3;
                magnitude = score_i as u64;
            }
        } else {
            let inverted = !score_i;
            if inverted <= 0xff {
                tag = Tag::SingleNegative1;
                magnitude = inverted as u64;
            } else if inverted <= 0xffff {
                tag = Tag::SingleNegative2;
                magnitude = inverted as u64;
            } else if inverted <= 0xffffff {
                tag = Tag::SingleNegative3;
                magnitude = inverted as u64;
            }
        }
    }

    out.push(tag as u8);
    VarintLsbFirst::encode(out, record.offset);

    match tag {
        Tag::SinglePositive1 | Tag::SingleNegative1 => out.push(magnitude as u8),
        Tag::SinglePositive2 | Tag::SingleNegative2 => {
            out.push(magnitude as u8);
            out.push((magnitude >> 8) as u8);
        }
        Tag::SinglePositive3 | Tag::SingleNegative3 => {
            out.push(magnitude as u8);
            out.push((magnitude >> 8) as u8);
            out.push((magnitude >> 16) as u8);
        }
        _ => out.extend_from_slice(&record.score.to_le_bytes()),
    }
}

fn encode_with_prediction(out: &mut Vec<u8>, records: &[OffsetScore]) {
    out.push(Tag::WithPrediction as u8);
    let count = records.len();
    VarintMsbFirst::encode(out, count as u64);
    VarintMsbFirst::encode(out, records[0].offset);

    let mut steps = BTreeSet::new();
    for w in records.windows(2) {
        steps.insert(w[1].offset - w[0].offset);
    }

    let mut use_step_map = false;
    let mut step_keys: HashMap<u64, u64> = HashMap::new();

    if count > 1 {
        if steps.len() < 256 && steps.len() < (count >> 2) {
            VarintMsbFirst::encode(out, steps.len() as u64);
            use_step_map = true;
            let mut prev_step = 0u64;
            let mut next_key = 0u64;
            for &step in &steps {
                step_keys.insert(step, next_key);
                next_key += 1;
                VarintMsbFirst::encode(out, step - prev_step);
                prev_step = step;
            }
        } else {
            VarintMsbFirst::encode(out, 0);
        }
    }

    if use_step_map {
        for w in records.windows(2) {
            let step = w[1].offset - w[0].offset;
            VarintMsbFirst::encode(out, step_keys[&step]);
        }
    } else {
        for w in records.windows(2) {
            VarintMsbFirst::encode(out, w[1].offset - w[0].offset);
        }
    }

    let mut prob_mask = vec![0u8; (count + 7) / 8];
    for (i, r) in records.iter().enumerate() {
        if r.has_finite_bands() {
            prob_mask[i >> 3] |= 1 << (i & 7);
        }
    }
    out.extend_from_slice(&crate::rle::encode(&prob_mask));

    for (i, r) in records.iter().enumerate() {
        out.extend_from_slice(&r.score.to_le_bytes());
        if prob_mask[i >> 3] & (1 << (i & 7)) != 0 {
            let b = r.bands.expect("prob_mask bit set implies bands present");
            out.extend_from_slice(&b.p5.to_le_bytes());
            out.extend_from_slice(&b.p25.to_le_bytes());
            out.extend_from_slice(&b.p75.to_le_bytes());
            out.extend_from_slice(&b.p95.to_le_bytes());
        }
    }
}

// ---------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------

pub fn decode(bytes: &[u8], opts: &DecodeOptions) -> Result<Vec<OffsetScore>, FormatError> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let tag = Tag::from_u8(bytes[pos])?;
        pos += 1;
        let (mut records, consumed) = decode_block(tag, &bytes[pos..])?;
        pos += consumed;
        if let Some(filter) = opts.filter {
            records.retain(|r| filter.contains(&r.offset));
        }
        out.extend(records);
    }
    Ok(out)
}

fn decode_block(tag: Tag, input: &[u8]) -> Result<(Vec<OffsetScore>, usize), FormatError> {
    match tag {
        Tag::Empty => Ok((Vec::new(), 0)),
        Tag::WithPrediction => decode_with_prediction(input),
        Tag::Flexi => decode_flexi(input),
        Tag::DeltaOrochFloat => decode_oroch(input, false),
        Tag::DeltaOrochOroch => decode_oroch(input, true),
        Tag::SingleFloat
        | Tag::SinglePositive1
        | Tag::SinglePositive2
        | Tag::SinglePositive3
        | Tag::SingleNegative1
        | Tag::SingleNegative2
        | Tag::SingleNegative3 => {
            let (record, consumed) = decode_single(tag, input)?;
            Ok((vec![record], consumed))
        }
    }
}

fn decode_single(tag: Tag, input: &[u8]) -> Result<(OffsetScore, usize), FormatError> {
    let mut pos = 0;
    let (offset, n) = VarintLsbFirst::decode(input)?;
    pos += n;

    let score = match tag {
        Tag::SingleFloat => read_f32(input, &mut pos)?,
        Tag::SinglePositive1 => read_le_uint(input, &mut pos, 1)? as f32,
        Tag::SinglePositive2 => read_le_uint(input, &mut pos, 2)? as f32,
        Tag::SinglePositive3 => read_le_uint(input, &mut pos, 3)? as f32,
        Tag::SingleNegative1 => (!read_le_uint(input, &mut pos, 1)?) as i32 as f32,
        Tag::SingleNegative2 => (!read_le_uint(input, &mut pos, 2)?) as i32 as f32,
        Tag::SingleNegative3 => (!read_le_uint(input, &mut pos, 3)?) as i32 as f32,
        _ => unreachable!("decode_single called with a non-SINGLE tag"),
    };

    Ok((OffsetScore::new(offset, score), pos))
}

fn decode_oroch(input: &[u8], integer_score: bool) -> Result<(Vec<OffsetScore>, usize), FormatError> {
    let mut pos = 0;
    let (count, n) = VarintLsbFirst::decode(input)?;
    pos += n;
    if count == 0 {
        return Ok((Vec::new(), pos));
    }
    let count = count as usize;

    let (first_offset, n) = VarintLsbFirst::decode(&input[pos..])?;
    pos += n;

    let (deltas, n) = intseq::decode_u64(&input[pos..], count - 1)?;
    pos += n;

    let scores: Vec<f32> = if integer_score {
        let (ints, n) = intseq::decode_i64(&input[pos..], count)?;
        pos += n;
        ints.into_iter().map(|v| v as f32).collect()
    } else {
        let mut v = Vec::with_capacity(count);
        for _ in 0..count {
            v.push(read_f32(input, &mut pos)?);
        }
        v
    };

    let mut offsets = vec![0u64; count];
    offsets[0] = first_offset;
    for i in 1..count {
        offsets[i] = offsets[i - 1] + deltas[i - 1];
    }

    let records = offsets
        .into_iter()
        .zip(scores)
        .map(|(offset, score)| OffsetScore::new(offset, score))
        .collect();
    Ok((records, pos))
}

fn decode_with_prediction(input: &[u8]) -> Result<(Vec<OffsetScore>, usize), FormatError> {
    let mut pos = 0;
    let (count, n) = VarintMsbFirst::decode(input)?;
    pos += n;
    if count == 0 {
        return Ok((Vec::new(), pos));
    }
    let count = count as usize;

    let (first_offset, n) = VarintMsbFirst::decode(&input[pos..])?;
    pos += n;

    let mut offsets = vec![0u64; count];
    offsets[0] = first_offset;

    let mut steps: Vec<u64> = Vec::new();
    if count > 1 {
        let (step_count, n) = VarintMsbFirst::decode(&input[pos..])?;
        pos += n;
        if step_count > 0 {
            let mut prev_step = 0u64;
            for _ in 0..step_count {
                let (delta, n) = VarintMsbFirst::decode(&input[pos..])?;
                pos += n;
                let step = delta + prev_step;
                steps.push(step);
                prev_step = step;
            }
        }
    }

    if !steps.is_empty() {
        for i in 1..count {
            let (step_index, n) = VarintMsbFirst::decode(&input[pos..])?;
            pos += n;
            let step_index = step_index as usize;
            if step_index >= steps.len() {
                return Err(FormatError::malformed("step dictionary index out of range"));
            }
            offsets[i] = offsets[i - 1] + steps[step_index];
        }
    } else {
        for i in 1..count {
            let (step, n) = VarintMsbFirst::decode(&input[pos..])?;
            pos += n;
            offsets[i] = offsets[i - 1] + step;
        }
    }

    let bitmap_len = (count + 7) / 8;
    let mut reader = RleReader::new(&input[pos..]);
    let mut prob_mask = vec![0u8; bitmap_len];
    for slot in &mut prob_mask {
        *slot = reader
            .read_byte()
            .ok_or_else(|| FormatError::truncated("reading prediction bitmap"))?;
    }
    if reader.pending_run() != 0 {
        return Err(FormatError::invariant("prediction bitmap RLE run leftover"));
    }
    pos += reader.position();

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let score = read_f32(input, &mut pos)?;
        let bands = if prob_mask[i >> 3] & (1 << (i & 7)) != 0 {
            let p5 = read_f32(input, &mut pos)?;
            let p25 = read_f32(input, &mut pos)?;
            let p75 = read_f32(input, &mut pos)?;
            let p95 = read_f32(input, &mut pos)?;
            Some(PredictionBands { p5, p25, p75, p95 })
        } else {
            None
        };
        records.push(OffsetScore {
            offset: offsets[i],
            score,
            bands,
        });
    }

    Ok((records, pos))
}

// ---------------------------------------------------------------------
// Flexi (legacy tag 2) — decode-only, per Design Notes open question (i).
// ---------------------------------------------------------------------

struct FlexiOffsets {
    offsets: Vec<u64>,
    consumed: usize,
}

fn decode_flexi_offsets(input: &[u8], count: usize, first_offset: u64) -> Result<FlexiOffsets, FormatError> {
    let mut pos = 0;
    let mut offsets = vec![0u64; count];
    offsets[0] = first_offset;

    let (step_gcd, n) = VarintMsbFirst::decode(&input[pos..])?;
    pos += n;

    if step_gcd == 0 {
        for o in offsets.iter_mut().skip(1) {
            *o = offsets[0];
        }
        return Ok(FlexiOffsets { offsets, consumed: pos });
    }

    let (min_step, n) = VarintMsbFirst::decode(&input[pos..])?;
    pos += n;
    let (max_step_delta, n) = VarintMsbFirst::decode(&input[pos..])?;
    pos += n;
    let max_step = max_step_delta + min_step;

    if min_step == max_step {
        for i in 1..count {
            offsets[i] = offsets[i - 1] + step_gcd * min_step;
        }
    } else if max_step - min_step <= 0x0f {
        let mut reader = RleReader::new(&input[pos..]);
        let mut i = 1;
        while i < count {
            let tmp = reader
                .read_byte()
                .ok_or_else(|| FormatError::truncated("reading flexi nibble-packed offsets"))?;
            offsets[i] = offsets[i - 1] + step_gcd * (min_step + (tmp & 0x0f) as u64);
            if i + 1 < count {
                offsets[i + 1] = offsets[i] + step_gcd * (min_step + (tmp >> 4) as u64);
            }
            i += 2;
        }
        if reader.pending_run() != 0 {
            return Err(FormatError::invariant("flexi offset RLE run leftover"));
        }
        pos += reader.position();
    } else if max_step - min_step <= 0xff {
        let mut reader = RleReader::new(&input[pos..]);
        for i in 1..count {
            let tmp = reader
                .read_byte()
                .ok_or_else(|| FormatError::truncated("reading flexi byte-packed offsets"))?;
            offsets[i] = offsets[i - 1] + step_gcd * (min_step + tmp as u64);
        }
        if reader.pending_run() != 0 {
            return Err(FormatError::invariant("flexi offset RLE run leftover"));
        }
        pos += reader.position();
    } else {
        for i in 1..count {
            let (v, n) = VarintMsbFirst::decode(&input[pos..])?;
            pos += n;
            offsets[i] = offsets[i - 1] + step_gcd * (min_step + v);
        }
    }

    Ok(FlexiOffsets { offsets, consumed: pos })
}

fn decode_flexi(input: &[u8]) -> Result<(Vec<OffsetScore>, usize), FormatError> {
    let mut pos = 0;
    let (count, n) = VarintMsbFirst::decode(input)?;
    pos += n;
    if count == 0 {
        return Ok((Vec::new(), pos));
    }
    let count = count as usize;

    let (first_offset, n) = VarintMsbFirst::decode(&input[pos..])?;
    pos += n;

    let offs = decode_flexi_offsets(&input[pos..], count, first_offset)?;
    pos += offs.consumed;
    let offsets = offs.offsets;

    let score_flags = *input
        .get(pos)
        .ok_or_else(|| FormatError::truncated("reading flexi score_flags"))?;
    pos += 1;

    let min_score: u32 = if score_flags & 0x03 != 0 {
        let (v, n) = VarintMsbFirst::decode(&input[pos..])?;
        pos += n;
        v as u32
    } else {
        0
    };

    let parse_score_count = if score_flags & 0x80 != 0 { 1 } else { count };

    let mut scores = vec![0f32; count];
    match score_flags & 0x03 {
        0x00 => {
            for slot in scores.iter_mut().take(parse_score_count) {
                *slot = read_f32(input, &mut pos)?;
            }
        }
        0x01 => {
            for slot in scores.iter_mut().take(parse_score_count) {
                let b = *input
                    .get(pos)
                    .ok_or_else(|| FormatError::truncated("reading flexi 1-byte score"))?;
                pos += 1;
                *slot = (min_score + b as u32) as f32;
            }
        }
        0x02 => {
            for slot in scores.iter_mut().take(parse_score_count) {
                let bytes = input
                    .get(pos..pos + 2)
                    .ok_or_else(|| FormatError::truncated("reading flexi 2-byte score"))?;
                let v = ((bytes[0] as u32) << 8) + bytes[1] as u32;
                pos += 2;
                *slot = (min_score + v) as f32;
            }
        }
        0x03 => {
            for slot in scores.iter_mut().take(parse_score_count) {
                let bytes = input
                    .get(pos..pos + 3)
                    .ok_or_else(|| FormatError::truncated("reading flexi 3-byte score"))?;
                let v = ((bytes[0] as u32) << 16) + ((bytes[1] as u32) << 8) + bytes[2] as u32;
                pos += 3;
                *slot = (min_score + v) as f32;
            }
        }
        _ => unreachable!(),
    }
    for i in parse_score_count..count {
        scores[i] = scores[0];
    }

    let records = offsets
        .into_iter()
        .zip(scores)
        .map(|(offset, score)| OffsetScore::new(offset, score))
        .collect();
    Ok((records, pos))
}

// ---------------------------------------------------------------------
// count() / max_offset() — cheap passes that skip score material.
// ---------------------------------------------------------------------

pub fn count(bytes: &[u8]) -> Result<usize, FormatError> {
    let mut total = 0;
    let mut pos = 0;
    while pos < bytes.len() {
        let tag = Tag::from_u8(bytes[pos])?;
        pos += 1;
        let (n, consumed) = count_block(tag, &bytes[pos..])?;
        total += n;
        pos += consumed;
    }
    Ok(total)
}

fn count_block(tag: Tag, input: &[u8]) -> Result<(usize, usize), FormatError> {
    // Counting re-uses the full decoders; the offset/score format has
    // no faster path that avoids touching the integer-sequence payload,
    // since its length isn't self-describing without decoding it.
    let (records, consumed) = decode_block(tag, input)?;
    Ok((records.len(), consumed))
}

pub fn max_offset(bytes: &[u8]) -> Result<u64, FormatError> {
    let mut result = 0u64;
    let mut pos = 0;
    while pos < bytes.len() {
        let tag = Tag::from_u8(bytes[pos])?;
        pos += 1;
        let (records, consumed) = decode_block(tag, &bytes[pos..])?;
        if let Some(last) = records.last() {
            if last.offset > result {
                result = last.offset;
            }
        }
        pos += consumed;
    }
    Ok(result)
}
