use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;

/// Decimal places of the remediated token
pub const TOKEN_DECIMALS: u32 = 18;

/// `10^decimals` as a big integer
pub fn scale(decimals: u32) -> BigUint {
    BigUint::from(10u32).pow(decimals)
}

/// Format a raw amount as a human readable number with exactly
/// `decimals` fractional digits. Never rounds up.
pub fn format_amount(raw: &BigUint, decimals: u32) -> String {
    if decimals == 0 {
        return raw.to_str_radix(10);
    }

    let (whole, fraction) = raw.div_rem(&scale(decimals));
    format!(
        "{}.{:0>width$}",
        whole,
        fraction.to_str_radix(10),
        width = decimals as usize
    )
}

/// Sum of a sequence of amounts
pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a BigUint>) -> BigUint {
    amounts
        .into_iter()
        .fold(BigUint::zero(), |acc, next| acc + next)
}

/// `ceil(numerator / denominator)` for non-zero denominators
pub fn ceil_div(numerator: usize, denominator: usize) -> usize {
    if denominator.is_zero() {
        return 0;
    }
    numerator.div_ceil(denominator)
}

/// Serde adapter storing a `BigUint` as a base-10 string, which is how
/// indexers and receipts carry 256-bit-plus quantities.
pub mod decimal_string {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        BigUint::from_str(raw.trim()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_amount_truncates() {
        let raw = BigUint::from_str("1234567890123456789999").unwrap();
        assert_eq!(format_amount(&raw, 18), "1234.567890123456789999");

        let raw = BigUint::from(5u32);
        assert_eq!(format_amount(&raw, 18), "0.000000000000000005");

        assert_eq!(format_amount(&BigUint::zero(), 18), "0.000000000000000000");
    }

    #[test]
    fn test_exact_multiples_have_zero_fraction() {
        let raw = BigUint::from_str("42000000000000000000").unwrap();
        assert_eq!(format_amount(&raw, TOKEN_DECIMALS), "42.000000000000000000");

        // one raw unit short never rounds up to the next whole token
        let raw = BigUint::from_str("41999999999999999999").unwrap();
        assert_eq!(format_amount(&raw, TOKEN_DECIMALS), "41.999999999999999999");
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(500, 167), 3);
        assert_eq!(ceil_div(501, 167), 3);
        assert_eq!(ceil_div(502, 167), 4);
        assert_eq!(ceil_div(0, 167), 0);
        assert_eq!(ceil_div(10, 0), 0);
    }

    #[test]
    fn test_decimal_string_serde() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "decimal_string")]
            value: BigUint,
        }

        let parsed: Wrapper = serde_json::from_str(r#"{"value":"1000000000000000000000000000000000000"}"#).unwrap();
        assert_eq!(parsed.value, scale(36));
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"value":"1000000000000000000000000000000000000"}"#
        );
    }
}
