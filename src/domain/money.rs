use std::fmt;

/// Money is stored as integer cents so balances never pick up float drift.
/// One unit is 100 cents: a seeded balance of 100.00 is 10000 cents.
pub type Cents = i64;

pub const CENTS_PER_UNIT: Cents = 100;

/// Render cents as a decimal amount of units.
/// Example: 7000 -> "70.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let per_unit = CENTS_PER_UNIT as u64;
    format!("{}{}.{:02}", sign, abs / per_unit, abs % per_unit)
}

/// Parse a decimal amount of units into cents.
/// Sub-cent precision is rejected; trailing zeros past the cents are fine.
/// Example: "30" -> 3000, "0.5" -> 50, "1.250" -> 125, "12.345" -> error
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };

    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (digits, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: Cents = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| ParseCentsError::Overflow)?
    };

    let (fraction, rest) = fraction.split_at(fraction.len().min(2));
    if rest.bytes().any(|b| b != b'0') {
        return Err(ParseCentsError::TooPrecise);
    }

    let fraction_cents: Cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<Cents>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        _ => fraction
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(CENTS_PER_UNIT)
        .and_then(|c| c.checked_add(fraction_cents))
        .ok_or(ParseCentsError::Overflow)?;

    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    /// More than two significant decimal places
    TooPrecise,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::TooPrecise => write!(f, "amount has more than two decimal places"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

/// Serde adapter that puts cents on the wire as a number of units.
///
/// Serializes `7000` as `70.0`. Deserializes integers, floats and decimal
/// strings, so `{"amount": 30}`, `{"amount": 30.5}` and `{"amount": "30.50"}`
/// are all accepted.
pub mod units {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    use super::{parse_cents, Cents, CENTS_PER_UNIT};

    pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(*cents as f64 / CENTS_PER_UNIT as f64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
        deserializer.deserialize_any(UnitsVisitor)
    }

    struct UnitsVisitor;

    impl Visitor<'_> for UnitsVisitor {
        type Value = Cents;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an amount of money as a number or decimal string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Cents, E> {
            v.checked_mul(CENTS_PER_UNIT)
                .ok_or_else(|| E::custom("amount is too large"))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Cents, E> {
            let v = i64::try_from(v).map_err(|_| E::custom("amount is too large"))?;
            self.visit_i64(v)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Cents, E> {
            if !v.is_finite() {
                return Err(E::custom("amount must be finite"));
            }
            // f64 Display never uses exponent notation, so the decimal parser applies.
            parse_cents(&v.to_string()).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Cents, E> {
            parse_cents(v).map_err(E::custom)
        }
    }
}
