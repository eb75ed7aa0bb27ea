//! `gbbq` corporate-action file
//!
//! `u32 count`, then `count` records of 29 bytes. The first 24 bytes of a
//! record are three 8-byte blocks run through a 16-round Feistel network keyed
//! by an external table (P array at 0x00, S boxes at 0x48/0x448/0x848/0xc48);
//! the trailing 5 bytes are stored in the clear. Deciphered layout:
//! `u8 market, [u8; 7] code, u32 date, u8 category, f32 × 4`.

use chrono::NaiveDate;

use super::{CorporateActionRecord, fixed_str, le_f32, le_u32};

const RECORD_LEN: usize = 29;
pub(super) const KEY_TABLE_LEN: usize = 0x1048;

const ENCIPHERED_BLOCKS: usize = 3;
const BLOCK_LEN: usize = 8;

fn key_word(key: &[u8], off: usize) -> u32 {
    // Callers guarantee key.len() >= KEY_TABLE_LEN and off < KEY_TABLE_LEN - 3
    u32::from_le_bytes([key[off], key[off + 1], key[off + 2], key[off + 3]])
}

fn round(key: &[u8], num: u32) -> u32 {
    let b = num.to_le_bytes();
    let mut eax = key_word(key, 0x448 + usize::from(b[2]) * 4);
    eax = eax.wrapping_add(key_word(key, 0x48 + usize::from(b[3]) * 4));
    eax ^= key_word(key, 0x848 + usize::from(b[1]) * 4);
    eax.wrapping_add(key_word(key, 0xc48 + usize::from(b[0]) * 4))
}

/// Decipher one 8-byte block in place
fn decipher_block(key: &[u8], block: &mut [u8; 8]) {
    let w0 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
    let w1 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let mut num = key_word(key, 0x44) ^ w0;
    let mut numold = w1;
    for j in (4..=0x40).rev().step_by(4) {
        let eax = round(key, num) ^ key_word(key, j);
        (num, numold) = (numold ^ eax, num);
    }
    numold ^= key_word(key, 0);

    block[..4].copy_from_slice(&numold.to_le_bytes());
    block[4..].copy_from_slice(&num.to_le_bytes());
}

pub(super) fn decode(data: &[u8], key: &[u8]) -> Result<Vec<CorporateActionRecord>, String> {
    if key.len() < KEY_TABLE_LEN {
        return Err(format!("key table is {} bytes, need {KEY_TABLE_LEN}", key.len()));
    }
    let count = le_u32(data, 0).ok_or("missing record count")? as usize;
    let needed = 4 + count * RECORD_LEN;
    if data.len() < needed {
        return Err(format!(
            "{count} records need {needed} bytes, file has {}",
            data.len()
        ));
    }

    let mut records = Vec::with_capacity(count);
    for (i, raw) in data[4..needed].chunks_exact(RECORD_LEN).enumerate() {
        let mut clear = [0u8; RECORD_LEN];
        clear.copy_from_slice(raw);
        for b in 0..ENCIPHERED_BLOCKS {
            let range = b * BLOCK_LEN..(b + 1) * BLOCK_LEN;
            let mut block = [0u8; BLOCK_LEN];
            block.copy_from_slice(&clear[range.clone()]);
            decipher_block(key, &mut block);
            clear[range].copy_from_slice(&block);
        }
        records.push(parse_record(&clear).map_err(|e| format!("record {i}: {e}"))?);
    }
    Ok(records)
}

fn parse_record(clear: &[u8; RECORD_LEN]) -> Result<CorporateActionRecord, String> {
    // clear[0] is the market byte
    let code = fixed_str(&clear[1..8]);
    let date = le_u32(clear, 8).ok_or("short record")?;
    let ex_rights_date = NaiveDate::from_ymd_opt(
        (date / 10_000) as i32,
        date / 100 % 100,
        date % 100,
    )
    .ok_or_else(|| format!("invalid date {date}"))?;
    let float = |off| le_f32(clear, off).map(f64::from).ok_or("short record");

    Ok(CorporateActionRecord {
        code,
        ex_rights_date,
        category_code: i64::from(clear[12]),
        pre_float_shares: float(13)?,
        pre_total_shares: float(17)?,
        post_float_shares: float(21)?,
        post_total_shares: float(25)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_record(code: &str, date: u32, category: u8, vals: [f32; 4]) -> [u8; RECORD_LEN] {
        let mut rec = [0u8; RECORD_LEN];
        rec[0] = 1;
        rec[1..1 + code.len()].copy_from_slice(code.as_bytes());
        rec[8..12].copy_from_slice(&date.to_le_bytes());
        rec[12] = category;
        for (i, v) in vals.iter().enumerate() {
            rec[13 + i * 4..17 + i * 4].copy_from_slice(&v.to_le_bytes());
        }
        rec
    }

    /// With an all-zero key every round is a plain swap, so enciphering a
    /// block under that key is swapping its two halves.
    fn zero_key_encipher(rec: &[u8; RECORD_LEN]) -> [u8; RECORD_LEN] {
        let mut out = *rec;
        for b in 0..ENCIPHERED_BLOCKS {
            let s = b * BLOCK_LEN;
            out[s..s + 4].copy_from_slice(&rec[s + 4..s + 8]);
            out[s + 4..s + 8].copy_from_slice(&rec[s..s + 4]);
        }
        out
    }

    fn file_of(records: &[[u8; RECORD_LEN]]) -> Vec<u8> {
        let mut data = (records.len() as u32).to_le_bytes().to_vec();
        for r in records {
            data.extend_from_slice(r);
        }
        data
    }

    #[test]
    fn zero_key_swaps_halves() {
        let key = vec![0u8; KEY_TABLE_LEN];
        let mut block = [1, 2, 3, 4, 5, 6, 7, 8];
        decipher_block(&key, &mut block);
        assert_eq!(block, [5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn p_array_whitening_applies() {
        let mut key = vec![0u8; KEY_TABLE_LEN];
        key[0..4].copy_from_slice(&0xffff_ffffu32.to_le_bytes());
        let mut block = [0u8; 8];
        decipher_block(&key, &mut block);
        assert_eq!(block, [0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
    }

    #[test]
    fn decodes_records() {
        let key = vec![0u8; KEY_TABLE_LEN];
        let recs = [
            clear_record("600000", 20230615, 1, [1.5, 100.0, 0.3, 120.0]),
            clear_record("000001", 19910403, 14, [0.0, 1.0, 2.0, 3.0]),
        ];
        let data = file_of(&recs.map(|r| zero_key_encipher(&r)));

        let out = decode(&data, &key).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].code, "600000");
        assert_eq!(
            out[0].ex_rights_date,
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap()
        );
        assert_eq!(out[0].category_code, 1);
        assert_eq!(out[0].pre_float_shares, 1.5);
        assert_eq!(out[0].post_total_shares, 120.0);
        assert_eq!(out[1].category_code, 14);
        assert_eq!(out[1].post_float_shares, 2.0);
    }

    #[test]
    fn out_of_range_category_is_passed_through() {
        let key = vec![0u8; KEY_TABLE_LEN];
        let data = file_of(&[zero_key_encipher(&clear_record("1", 20200101, 99, [0.0; 4]))]);
        assert_eq!(decode(&data, &key).unwrap()[0].category_code, 99);
    }

    #[test]
    fn empty_file_has_no_records() {
        let key = vec![0u8; KEY_TABLE_LEN];
        assert!(decode(&0u32.to_le_bytes(), &key).unwrap().is_empty());
        assert!(decode(&[], &key).is_err());
    }

    #[test]
    fn truncated_file_fails() {
        let key = vec![0u8; KEY_TABLE_LEN];
        let mut data = file_of(&[clear_record("600000", 20230615, 1, [0.0; 4])]);
        data.truncate(20);
        assert!(decode(&data, &key).unwrap_err().contains("need 33 bytes"));
    }

    #[test]
    fn invalid_date_fails() {
        let key = vec![0u8; KEY_TABLE_LEN];
        let data = file_of(&[zero_key_encipher(&clear_record("600000", 20231345, 1, [0.0; 4]))]);
        let err = decode(&data, &key).unwrap_err();
        assert!(err.contains("record 0: invalid date 20231345"), "{err}");
    }
}
