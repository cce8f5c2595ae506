//! Save-file format (§6): ASCII, one record per elaborated instance, each
//! naming its instantiation path followed by a hex dump of its input and
//! state variable maps. Restart reads the file back and hands each
//! record's maps to the matching instance's engine via `set_input`/
//! `set_state`.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::bits::{BitType, Bits};
use crate::error::{CascadeError, Result};
use crate::isolate::Vid;

pub type VidMap = HashMap<Vid, Bits>;

pub struct InstanceRecord {
    pub path: String,
    pub input: VidMap,
    pub state: VidMap,
}

pub fn save(records: &[InstanceRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", records.len());
    for r in records {
        out.push_str("MODULE:\n");
        out.push_str(&r.path);
        out.push('\n');
        out.push_str("INPUT:\n");
        out.push_str(&dump_map(&r.input));
        out.push_str("STATE:\n");
        out.push_str(&dump_map(&r.state));
    }
    out
}

fn dump_map(m: &VidMap) -> String {
    let mut keys: Vec<_> = m.keys().copied().collect();
    keys.sort_unstable();
    let mut out = String::new();
    let _ = writeln!(out, "{}", keys.len());
    for k in keys {
        let b = &m[&k];
        let _ = writeln!(out, "{:08x} {} {}", k, type_code(b.bit_type()), b.width());
        let bytes = bits_to_bytes(b);
        if bytes.is_empty() {
            out.push('\n');
        } else {
            for line in bytes.chunks(16) {
                for byte in line {
                    let _ = write!(out, "{:02x}", byte);
                }
                out.push('\n');
            }
        }
    }
    out
}

fn type_code(ty: BitType) -> char {
    match ty {
        BitType::Unsigned => 'u',
        BitType::Signed => 's',
        BitType::Real => 'r',
    }
}

fn type_from_code(c: char) -> Result<BitType> {
    match c {
        'u' => Ok(BitType::Unsigned),
        's' => Ok(BitType::Signed),
        'r' => Ok(BitType::Real),
        other => Err(CascadeError::SaveFileFormat(format!("unknown type code '{other}'"))),
    }
}

fn bits_to_bytes(b: &Bits) -> Vec<u8> {
    let nbytes = (b.width() + 7) / 8;
    let mut out = Vec::with_capacity(nbytes);
    for i in 0..nbytes {
        let word = b.get_word(i / 8);
        let shift = (i % 8) * 8;
        out.push(((word >> shift) & 0xff) as u8);
    }
    out
}

fn bytes_to_bits(bytes: &[u8], width: usize, ty: BitType) -> Bits {
    let mut words = vec![0u64; (width + 63) / 64];
    for (i, byte) in bytes.iter().enumerate() {
        let word = i / 8;
        let shift = (i % 8) * 8;
        if word < words.len() {
            words[word] |= (*byte as u64) << shift;
        }
    }
    Bits::from_words(width, ty, words)
}

/// Parses a buffer produced by [`save`] back into its per-instance records.
pub fn restore(text: &str) -> Result<Vec<InstanceRecord>> {
    let mut lines = text.lines();
    let count: usize = lines
        .next()
        .ok_or_else(|| CascadeError::SaveFileFormat("empty save file".into()))?
        .trim()
        .parse()
        .map_err(|_| CascadeError::SaveFileFormat("bad module count".into()))?;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        expect(&mut lines, "MODULE:")?;
        let path = lines
            .next()
            .ok_or_else(|| CascadeError::SaveFileFormat("missing module path".into()))?
            .to_string();
        expect(&mut lines, "INPUT:")?;
        let input = parse_map(&mut lines)?;
        expect(&mut lines, "STATE:")?;
        let state = parse_map(&mut lines)?;
        records.push(InstanceRecord { path, input, state });
    }
    Ok(records)
}

fn expect<'a>(lines: &mut impl Iterator<Item = &'a str>, tag: &str) -> Result<()> {
    match lines.next() {
        Some(l) if l == tag => Ok(()),
        Some(other) => Err(CascadeError::SaveFileFormat(format!("expected '{tag}', found '{other}'"))),
        None => Err(CascadeError::SaveFileFormat(format!("expected '{tag}', found eof"))),
    }
}

fn parse_map<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<VidMap> {
    let bad = || CascadeError::SaveFileFormat("malformed variable map".into());
    let count: usize = lines.next().ok_or_else(bad)?.trim().parse().map_err(|_| bad())?;
    let mut map = HashMap::with_capacity(count);
    for _ in 0..count {
        let header = lines.next().ok_or_else(bad)?;
        let mut parts = header.split_whitespace();
        let vid = u32::from_str_radix(parts.next().ok_or_else(bad)?, 16).map_err(|_| bad())?;
        let ty = type_from_code(parts.next().ok_or_else(bad)?.chars().next().ok_or_else(bad)?)?;
        let width: usize = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;

        let nbytes = (width + 7) / 8;
        let nlines = if nbytes == 0 { 1 } else { (nbytes + 15) / 16 };
        let mut bytes = Vec::with_capacity(nbytes);
        for _ in 0..nlines {
            let line = lines.next().ok_or_else(bad)?;
            let chars: Vec<char> = line.chars().collect();
            for pair in chars.chunks(2) {
                if pair.len() < 2 {
                    continue;
                }
                let byte_str: String = pair.iter().collect();
                bytes.push(u8::from_str_radix(&byte_str, 16).map_err(|_| bad())?);
            }
        }
        bytes.truncate(nbytes);
        map.insert(vid, bytes_to_bits(&bytes, width, ty));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn round_trips_a_single_instance_record() {
        let mut input = HashMap::new();
        input.insert(0u32, Bits::from_u64(8, BitType::Unsigned, 0xab));
        let mut state = HashMap::new();
        state.insert(1u32, Bits::from_i64(16, -5));
        let records = vec![InstanceRecord {
            path: "top".to_string(),
            input,
            state,
        }];
        let text = save(&records);
        let parsed = restore(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].path, "top");
        assert_eq!(parsed[0].input[&0].to_u64(), 0xab);
        assert_eq!(parsed[0].state[&1].to_i128(), -5);
    }
}
