//! Parsers for the `[addr]:[...]|[addr]:[...]` address-list syntax used by
//! `--read`, `--write`, and `--fuses`.
//!
//! All numbers are hexadecimal, with or without a `0x` prefix, matching the
//! reference tool's own `strtol(..., 16)` parsing.

/// One `--read` entry: `addr` bytes starting at `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSpec {
    pub addr: u32,
    pub len: usize,
}

/// One `--write`/`--fuses` entry: a run of bytes starting at `addr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSpec {
    pub addr: u32,
    pub bytes: Vec<u8>,
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u32::from_str_radix(s, 16).map_err(|_| format!("'{s}' is not a valid hex number"))
}

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u8::from_str_radix(s, 16).map_err(|_| format!("'{s}' is not a valid hex byte"))
}

/// Parse `[addr1]:[n1]|[addr2]:[n2]...`.
pub fn parse_read_list(s: &str) -> Result<Vec<ReadSpec>, String> {
    s.split('|')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (addr_str, len_str) = entry
                .split_once(':')
                .ok_or_else(|| format!("'{entry}' is missing ':'"))?;
            Ok(ReadSpec {
                addr: parse_hex_u32(addr_str)?,
                len: parse_hex_u32(len_str)? as usize,
            })
        })
        .collect()
}

/// Parse `[addr0]:[dat0];[dat1];...|[addr1]:...`.
pub fn parse_write_list(s: &str) -> Result<Vec<WriteSpec>, String> {
    s.split('|')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (addr_str, data_str) = entry
                .split_once(':')
                .ok_or_else(|| format!("'{entry}' is missing ':'"))?;
            let bytes = data_str
                .split(';')
                .filter(|tok| !tok.is_empty())
                .map(parse_hex_u8)
                .collect::<Result<Vec<u8>, _>>()?;
            if bytes.is_empty() {
                return Err(format!("'{entry}' has no data bytes"));
            }
            Ok(WriteSpec {
                addr: parse_hex_u32(addr_str)?,
                bytes,
            })
        })
        .collect()
}

/// Parse the same syntax as [`parse_write_list`] but flatten each entry's
/// run of bytes into individual `(address, value)` pairs, the shape
/// `operation::write_fuses` and one-fuse-at-a-time writes want.
pub fn parse_fuse_list(s: &str) -> Result<Vec<(u32, u8)>, String> {
    let specs = parse_write_list(s)?;
    Ok(specs
        .into_iter()
        .flat_map(|spec| {
            spec.bytes
                .into_iter()
                .enumerate()
                .map(move |(i, value)| (spec.addr + i as u32, value))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_list_parses_multiple_entries() {
        let specs = parse_read_list("8000:10|1400:4").unwrap();
        assert_eq!(
            specs,
            vec![
                ReadSpec { addr: 0x8000, len: 0x10 },
                ReadSpec { addr: 0x1400, len: 0x4 },
            ]
        );
    }

    #[test]
    fn write_list_parses_semicolon_separated_bytes() {
        let specs = parse_write_list("8000:aa;bb;cc").unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].addr, 0x8000);
        assert_eq!(specs[0].bytes, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn fuse_list_flattens_to_addressed_bytes() {
        let pairs = parse_fuse_list("1280:01;02|1288:ff").unwrap();
        assert_eq!(pairs, vec![(0x1280, 0x01), (0x1281, 0x02), (0x1288, 0xFF)]);
    }

    #[test]
    fn missing_colon_is_rejected() {
        assert!(parse_read_list("8000").is_err());
    }

    #[test]
    fn accepts_0x_prefixed_numbers() {
        let specs = parse_read_list("0x8000:0x10").unwrap();
        assert_eq!(specs[0].addr, 0x8000);
        assert_eq!(specs[0].len, 0x10);
    }
}
