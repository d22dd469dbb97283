//! Compact numeral encoding used by all textual serializations.
//!
//! Numbers are written most-significant digit first in base 64 over the alphabet
//! `0-9A-Za-z+/`; negative numbers carry a leading `-`. Arrays are `.`-separated
//! and the empty array is the empty string, so the whole format stays within
//! `[0-9A-Za-z+/.\-]` and can be embedded in the node grammar.

use crate::error::{malformed, Result};

const ENCODING: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz+/";

fn digit_value(c: char) -> Option<u64> {
    let v = match c {
        '0'..='9' => c as u32 - '0' as u32,
        'A'..='Z' => c as u32 - 'A' as u32 + 10,
        'a'..='z' => c as u32 - 'a' as u32 + 36,
        '+' => 62,
        '/' => 63,
        _ => return None,
    };
    Some(v as u64)
}

/// Append the digits of `n` (no sign).
pub fn encode_u64(mut n: u64, out: &mut String) {
    if n == 0 {
        out.push(ENCODING[0] as char);
        return;
    }
    let mut digits = [0u8; 11];
    let mut pos = digits.len();
    while n > 0 {
        pos -= 1;
        digits[pos] = ENCODING[(n & 0x3F) as usize];
        n >>= 6;
    }
    out.extend(digits[pos..].iter().map(|&b| b as char));
}

pub fn encode_i64(n: i64, out: &mut String) {
    if n < 0 {
        out.push('-');
    }
    encode_u64(n.unsigned_abs(), out);
}

pub fn encode_i32(n: i32, out: &mut String) {
    encode_i64(n as i64, out);
}

fn encode_array<T: Copy>(arr: &[T], out: &mut String, encode: impl Fn(T, &mut String)) {
    for (i, &x) in arr.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        encode(x, out);
    }
}

pub fn encode_u64_array(arr: &[u64], out: &mut String) {
    encode_array(arr, out, encode_u64);
}

pub fn encode_i64_array(arr: &[i64], out: &mut String) {
    encode_array(arr, out, encode_i64);
}

pub fn encode_i32_array(arr: &[i32], out: &mut String) {
    encode_array(arr, out, encode_i32);
}

/// Encode UTF-16 code units, one numeral per unit.
pub fn encode_chars(units: &[u16], out: &mut String) {
    encode_array(units, out, |u, out| encode_u64(u as u64, out));
}

pub fn decode_u64(s: &str) -> Result<u64> {
    if s.is_empty() {
        return malformed("empty numeral");
    }
    let mut res: u64 = 0;
    for c in s.chars() {
        let Some(d) = digit_value(c) else {
            return malformed(format!("invalid base64 digit {:?} in {:?}", c, s));
        };
        if res >> 58 != 0 {
            return malformed(format!("numeral {:?} overflows 64 bits", s));
        }
        res = (res << 6) | d;
    }
    Ok(res)
}

pub fn decode_i64(s: &str) -> Result<i64> {
    match s.strip_prefix('-') {
        Some(digits) => {
            let magnitude = decode_u64(digits)?;
            if magnitude > i64::MAX as u64 + 1 {
                return malformed(format!("numeral {:?} overflows i64", s));
            }
            Ok((magnitude as i64).wrapping_neg())
        }
        None => {
            let value = decode_u64(s)?;
            i64::try_from(value).or_else(|_| malformed(format!("numeral {:?} overflows i64", s)))
        }
    }
}

pub fn decode_i32(s: &str) -> Result<i32> {
    let value = decode_i64(s)?;
    i32::try_from(value).or_else(|_| malformed(format!("numeral {:?} overflows i32", s)))
}

pub fn decode_u32(s: &str) -> Result<u32> {
    let value = decode_u64(s)?;
    u32::try_from(value).or_else(|_| malformed(format!("numeral {:?} overflows u32", s)))
}

fn decode_array<T>(s: &str, decode: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split('.').map(decode).collect()
}

pub fn decode_u64_array(s: &str) -> Result<Vec<u64>> {
    decode_array(s, decode_u64)
}

pub fn decode_i64_array(s: &str) -> Result<Vec<i64>> {
    decode_array(s, decode_i64)
}

pub fn decode_i32_array(s: &str) -> Result<Vec<i32>> {
    decode_array(s, decode_i32)
}

pub fn decode_chars(s: &str) -> Result<Vec<u16>> {
    decode_array(s, |d| {
        let v = decode_u64(d)?;
        u16::try_from(v).or_else(|_| malformed(format!("numeral {:?} is not a code unit", d)))
    })
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn enc_i64(n: i64) -> String {
        let mut s = String::new();
        encode_i64(n, &mut s);
        s
    }

    #[test]
    fn test_digits() {
        assert_eq!(enc_i64(0), "0");
        assert_eq!(enc_i64(9), "9");
        assert_eq!(enc_i64(10), "A");
        assert_eq!(enc_i64(36), "a");
        assert_eq!(enc_i64(63), "/");
        assert_eq!(enc_i64(64), "10");
        assert_eq!(enc_i64(-62), "-+");
    }

    #[test]
    fn test_signed_roundtrip() {
        for n in [0, 1, -1, 4095, -4096, i64::MAX, i64::MIN, i32::MIN as i64] {
            assert_eq!(decode_i64(&enc_i64(n)), Ok(n), "n = {}", n);
        }
        let mut s = String::new();
        encode_u64(u64::MAX, &mut s);
        assert_eq!(s, "F//////////");
        assert_eq!(decode_u64(&s), Ok(u64::MAX));
    }

    #[test]
    fn test_arrays() {
        let mut s = String::new();
        encode_i64_array(&[], &mut s);
        assert_eq!(s, "");
        assert_eq!(decode_i64_array(""), Ok(vec![]));

        let mut s = String::new();
        encode_i64_array(&[-5], &mut s);
        assert_eq!(s, "-5");
        assert_eq!(decode_i64_array(&s), Ok(vec![-5]));

        let mut s = String::new();
        encode_i32_array(&[1, -64, 100], &mut s);
        assert_eq!(s, "1.-10.1a");
        assert_eq!(decode_i32_array(&s), Ok(vec![1, -64, 100]));

        let mut s = String::new();
        encode_u64_array(&[7, 0, 64], &mut s);
        assert_eq!(decode_u64_array(&s), Ok(vec![7, 0, 64]));
    }

    #[test]
    fn test_chars() {
        let units: Vec<u16> = "a\u{FFFF}\n".encode_utf16().collect();
        let mut s = String::new();
        encode_chars(&units, &mut s);
        assert_eq!(decode_chars(&s), Ok(units));
    }

    #[test]
    fn test_malformed() {
        assert!(decode_u64("").is_err());
        assert!(decode_u64("12*").is_err());
        assert!(decode_u64("G//////////").is_err());
        assert!(decode_i32("-").is_err());
        assert!(decode_i32("1000000").is_err());
        assert!(decode_i64_array("1..2").is_err());
    }
}
