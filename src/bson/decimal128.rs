use num_bigint::BigUint;

use crate::error::{MdbError, MdbResult};

const BIAS: i64 = 6176;
/// Maximum number of significant decimal digits the short (BID)
/// coefficient form can carry; coefficients with more digits would
/// need the IEEE 754 long-coefficient encoding, which this crate does
/// not produce (see `DESIGN.md`). Some 34-digit coefficients still
/// don't fit in the 14-byte (112-bit) field this form encodes them
/// into, so `parse` additionally checks the coefficient's bit length.
const MAX_DIGITS: usize = 34;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Exponent {
    Finite(i32),
    /// Quiet NaN.
    NaN,
    /// `'N'`: signaling NaN.
    SignalingNaN,
    /// `'F'`: (signed) infinity.
    Infinite,
}

/// An IEEE 754-2008 decimal128 value, encoded/decoded in the BID
/// short-coefficient form MongoDB uses on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decimal128 {
    sign: bool,
    /// Most-significant-digit-first, no leading zeros (except a lone
    /// `0` for the zero value).
    digits: Vec<u8>,
    exponent: Exponent,
}

impl Decimal128 {
    #[must_use]
    pub fn nan() -> Self {
        Self {
            sign: false,
            digits: Vec::new(),
            exponent: Exponent::NaN,
        }
    }

    #[must_use]
    pub fn infinity(sign: bool) -> Self {
        Self {
            sign,
            digits: vec![0],
            exponent: Exponent::Infinite,
        }
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self.exponent, Exponent::NaN | Exponent::SignalingNaN)
    }

    #[must_use]
    pub fn is_infinite(&self) -> bool {
        matches!(self.exponent, Exponent::Infinite)
    }

    pub fn parse(s: &str) -> MdbResult<Self> {
        let special = match s {
            "NaN" => Some(Self {
                sign: false,
                digits: Vec::new(),
                exponent: Exponent::NaN,
            }),
            "-NaN" => Some(Self {
                sign: true,
                digits: Vec::new(),
                exponent: Exponent::NaN,
            }),
            "sNaN" => Some(Self {
                sign: false,
                digits: Vec::new(),
                exponent: Exponent::SignalingNaN,
            }),
            "-sNaN" => Some(Self {
                sign: true,
                digits: Vec::new(),
                exponent: Exponent::SignalingNaN,
            }),
            "Infinity" | "Inf" => Some(Self::infinity(false)),
            "-Infinity" | "-Inf" => Some(Self::infinity(true)),
            _ => None,
        };
        if let Some(v) = special {
            return Ok(v);
        }

        if s.is_empty() || (s == "-") {
            return Err(MdbError::decode(format!("invalid decimal literal: {s:?}")));
        }
        let (sign, rest) = match s.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, s),
        };
        let (digits_str, exponent) = match rest.find('.') {
            None => (rest.to_owned(), 0_i32),
            Some(i) => {
                let mut merged = String::with_capacity(rest.len() - 1);
                merged.push_str(&rest[..i]);
                merged.push_str(&rest[i + 1..]);
                let exponent = -i32::try_from(merged.len() - i)
                    .map_err(|_| MdbError::decode("decimal literal too long"))?;
                (merged, exponent)
            }
        };
        let value: BigUint = digits_str
            .parse()
            .map_err(|_| MdbError::decode(format!("invalid decimal literal: {s:?}")))?;
        let digits = digits_from_biguint(&value);
        if digits.len() > MAX_DIGITS || value.bits() > 112 {
            return Err(MdbError::encode(
                "decimal128 long-coefficient form is not supported",
            ));
        }
        if !(-6176..=6111).contains(&exponent) {
            return Err(MdbError::encode("decimal128 exponent out of range"));
        }
        Ok(Self {
            sign,
            digits,
            exponent: Exponent::Finite(exponent),
        })
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let special_pattern = match (&self.exponent, self.sign) {
            (Exponent::NaN, false) => Some(0x7C_u8),
            (Exponent::NaN, true) => Some(0xFC),
            (Exponent::SignalingNaN, false) => Some(0x7E),
            (Exponent::SignalingNaN, true) => Some(0xFE),
            (Exponent::Infinite, false) => Some(0x78),
            (Exponent::Infinite, true) => Some(0xF8),
            (Exponent::Finite(_), _) => None,
        };
        if let Some(last) = special_pattern {
            let mut bytes = [0_u8; 16];
            bytes[15] = last;
            return bytes;
        }

        let Exponent::Finite(exponent) = self.exponent else {
            unreachable!("special values are returned above");
        };
        let coefficient = biguint_from_digits(&self.digits);
        let mut fraction = [0_u8; 14];
        let coeff_bytes = coefficient.to_bytes_le();
        fraction[..coeff_bytes.len().min(14)].copy_from_slice(&coeff_bytes[..coeff_bytes.len().min(14)]);

        let biased = i64::from(exponent) + BIAS;
        #[allow(clippy::cast_sign_loss)]
        let encoded_exponent: u16 = if fraction[13] & 0b0010_0000 != 0 {
            ((biased) / 2) as u16
        } else {
            ((biased) * 2) as u16
        };
        let mut exponent_bytes = encoded_exponent.to_le_bytes();
        if self.sign {
            exponent_bytes[1] |= 0x80;
        }

        let mut out = [0_u8; 16];
        out[..14].copy_from_slice(&fraction);
        out[14..16].copy_from_slice(&exponent_bytes);
        out
    }

    pub fn from_bytes(bytes: [u8; 16]) -> MdbResult<Self> {
        let sign = bytes[15] & 0x80 != 0;
        let biased: i64 = if bytes[15] & 0x60 == 0x60 {
            i64::from(u16::from_le_bytes([bytes[14], bytes[15] & 0x1f])) * 2 - BIAS
        } else {
            i64::from(u16::from_le_bytes([bytes[14], bytes[15] & 0x7f])) / 2 - BIAS
        };
        let coefficient = BigUint::from_bytes_le(&bytes[..14]);
        let is_zero = coefficient == BigUint::from(0_u8);

        if let Some(v) = special_from_biased(sign, is_zero, biased) {
            return Ok(v);
        }

        let exponent = i32::try_from(biased)
            .map_err(|_| MdbError::decode("decimal128 exponent out of range"))?;
        let digits = digits_from_biguint(&coefficient);
        Ok(Self {
            sign,
            digits,
            exponent: Exponent::Finite(exponent),
        })
    }
}

fn special_from_biased(sign: bool, is_zero_coefficient: bool, biased: i64) -> Option<Decimal128> {
    if !is_zero_coefficient {
        return None;
    }
    match biased {
        8160 => Some(Decimal128 {
            sign,
            digits: Vec::new(),
            exponent: Exponent::NaN,
        }),
        9184 => Some(Decimal128 {
            sign,
            digits: Vec::new(),
            exponent: Exponent::SignalingNaN,
        }),
        6112 => Some(Decimal128 {
            sign,
            digits: vec![0],
            exponent: Exponent::Infinite,
        }),
        _ => None,
    }
}

fn digits_from_biguint(n: &BigUint) -> Vec<u8> {
    if *n == BigUint::from(0_u8) {
        return vec![0];
    }
    n.to_str_radix(10)
        .bytes()
        .map(|b| b - b'0')
        .collect()
}

fn biguint_from_digits(digits: &[u8]) -> BigUint {
    let mut n = BigUint::from(0_u8);
    let ten = BigUint::from(10_u8);
    for &d in digits {
        n = n * &ten + BigUint::from(d);
    }
    n
}

impl std::fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.exponent {
            Exponent::NaN => return write!(f, "{}NaN", if self.sign { "-" } else { "" }),
            Exponent::SignalingNaN => return write!(f, "{}sNaN", if self.sign { "-" } else { "" }),
            Exponent::Infinite => return write!(f, "{}Infinity", if self.sign { "-" } else { "" }),
            Exponent::Finite(_) => {}
        }
        let Exponent::Finite(exponent) = self.exponent else {
            unreachable!()
        };
        let mut s: String = self.digits.iter().map(|d| (d + b'0') as char).collect();
        if self.sign {
            s.insert(0, '-');
        }
        match exponent.cmp(&0) {
            std::cmp::Ordering::Greater => {
                for _ in 0..exponent {
                    s.push('0');
                }
            }
            std::cmp::Ordering::Less => {
                let split = s.len() - usize::try_from(-exponent).unwrap_or(s.len());
                s.insert(split, '.');
            }
            std::cmp::Ordering::Equal => {}
        }
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(d: &Decimal128) -> (bool, Vec<u8>, String) {
        let exp = match d.exponent {
            Exponent::Finite(e) => e.to_string(),
            Exponent::NaN => "n".to_owned(),
            Exponent::SignalingNaN => "N".to_owned(),
            Exponent::Infinite => "F".to_owned(),
        };
        (d.sign, d.digits.clone(), exp)
    }

    #[test]
    fn parses_vector_table() {
        assert_eq!(
            tuple(&Decimal128::parse("100").unwrap()),
            (false, vec![1, 0, 0], "0".to_owned())
        );
        assert_eq!(
            tuple(&Decimal128::parse("-100").unwrap()),
            (true, vec![1, 0, 0], "0".to_owned())
        );
        assert_eq!(
            tuple(&Decimal128::parse("12.3456789").unwrap()),
            (false, vec![1, 2, 3, 4, 5, 6, 7, 8, 9], "-7".to_owned())
        );
        assert_eq!(
            tuple(&Decimal128::parse("NaN").unwrap()),
            (false, vec![], "n".to_owned())
        );
        assert_eq!(
            tuple(&Decimal128::parse("-Infinity").unwrap()),
            (true, vec![0], "F".to_owned())
        );
        assert_eq!(
            tuple(&Decimal128::parse("Inf").unwrap()),
            (false, vec![0], "F".to_owned())
        );
    }

    #[test]
    fn display_matches_vector_table() {
        assert_eq!(Decimal128::parse("100").unwrap().to_string(), "100");
        assert_eq!(Decimal128::parse("-100").unwrap().to_string(), "-100");
        assert_eq!(
            Decimal128::parse("12.3456789").unwrap().to_string(),
            "12.3456789"
        );
        assert_eq!(Decimal128::parse("NaN").unwrap().to_string(), "NaN");
        assert_eq!(
            Decimal128::parse("-Infinity").unwrap().to_string(),
            "-Infinity"
        );
    }

    #[test]
    fn round_trips_through_wire_bytes() {
        for literal in ["100", "-100", "12.3456789", "0", "-0.001", "NaN", "-NaN", "sNaN", "-sNaN", "Infinity", "-Infinity"] {
            let d = Decimal128::parse(literal).unwrap();
            let bytes = d.to_bytes();
            let back = Decimal128::from_bytes(bytes).unwrap();
            assert_eq!(d, back, "round trip failed for {literal}");
        }
    }

    #[test]
    fn rejects_overflowing_coefficient() {
        let too_many_digits = "1".repeat(MAX_DIGITS + 1);
        assert!(Decimal128::parse(&too_many_digits).is_err());
    }

    #[test]
    fn rejects_34_digit_coefficient_that_overflows_112_bits() {
        // 9999999999999999999999999999999999 has exactly MAX_DIGITS (34)
        // digits but needs 113 bits, one more than the 14-byte (112-bit)
        // short-coefficient field can carry.
        let value = "9".repeat(MAX_DIGITS);
        assert!(Decimal128::parse(&value).is_err());
    }
}
