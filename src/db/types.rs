//! PostgreSQL → JSON value mapping for result rows.
//!
//! Type conversion uses a two-phase approach:
//! 1. The driver's type kind routes enums, arrays and domains
//! 2. `TypeCategory` classifies everything else and picks a per-category decoder
//!
//! Values without a lossless JSON number representation (NUMERIC, temporal
//! and network types) are rendered as strings in PostgreSQL's output format.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind, PgValueFormat, PgValueRef, Postgres};
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use std::fmt::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for PostgreSQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Decimal,
    Money,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Oid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    TimeTz,
    Interval,
    Inet,
    MacAddr,
    Unknown,
}

/// Classify a PostgreSQL type name (as reported by the driver) into a category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_ascii_lowercase().as_str() {
        "int2" | "smallint" | "smallserial" => TypeCategory::SmallInt,
        "int4" | "int" | "integer" | "serial" => TypeCategory::Int,
        "int8" | "bigint" | "bigserial" => TypeCategory::BigInt,
        "float4" | "real" => TypeCategory::Real,
        "float8" | "double precision" => TypeCategory::Double,
        "numeric" | "decimal" => TypeCategory::Decimal,
        "money" => TypeCategory::Money,
        "bool" | "boolean" => TypeCategory::Boolean,
        "text" | "varchar" | "character varying" | "bpchar" | "char" | "character"
        | "\"char\"" | "name" | "citext" | "xml" | "unknown" => TypeCategory::Text,
        "bytea" => TypeCategory::Binary,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "oid" => TypeCategory::Oid,
        "timestamp" | "timestamp without time zone" => TypeCategory::Timestamp,
        "timestamptz" | "timestamp with time zone" => TypeCategory::TimestampTz,
        "date" => TypeCategory::Date,
        "time" | "time without time zone" => TypeCategory::Time,
        "timetz" | "time with time zone" => TypeCategory::TimeTz,
        "interval" => TypeCategory::Interval,
        "inet" | "cidr" => TypeCategory::Inet,
        "macaddr" | "macaddr8" => TypeCategory::MacAddr,
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// NUMERIC Support
// =============================================================================

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;
const NUMERIC_MAX_DSCALE: u16 = 0x3FFF;

/// NUMERIC rendered exactly as PostgreSQL would print it.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        ty.name().eq_ignore_ascii_case("numeric")
    }
}

impl<'r> Decode<'r, Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Binary => Ok(RawDecimal(format_numeric(value.as_bytes()?)?)),
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
        }
    }
}

/// Render the binary NUMERIC wire format: `ndigits`, `weight`, `sign`,
/// `dscale` (all 16-bit big-endian) followed by `ndigits` base-10000 digits,
/// the first of which is scaled by `10000^weight`.
pub fn format_numeric(bytes: &[u8]) -> Result<String, BoxDynError> {
    if bytes.len() < 8 {
        return Err("NUMERIC value shorter than its header".into());
    }
    let word = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);

    let ndigits = word(0) as usize;
    let weight = word(2) as i16 as i32;
    let sign = word(4);
    let dscale = word(6) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid NUMERIC sign 0x{:04X}", other).into()),
    }
    if bytes.len() < 8 + ndigits * 2 {
        return Err("NUMERIC value shorter than its digit count".into());
    }

    let digits: Vec<u16> = (0..ndigits).map(|i| word(8 + i * 2)).collect();
    let digit_at = |i: i32| -> u16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                let _ = write!(out, "{}", digit_at(i));
            } else {
                let _ = write!(out, "{:04}", digit_at(i));
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit_at(i));
            i += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// Encode a decimal string into the binary NUMERIC wire format.
///
/// Accepts an optional sign, digits with an optional fractional part, and
/// the special values `NaN`, `Infinity` and `-Infinity`. Exponent notation
/// is rejected.
pub fn encode_numeric(input: &str) -> Result<Vec<u8>, BoxDynError> {
    let s = input.trim();
    let special = match s.to_ascii_lowercase().as_str() {
        "nan" => Some(NUMERIC_NAN),
        "infinity" | "+infinity" | "inf" | "+inf" => Some(NUMERIC_PINF),
        "-infinity" | "-inf" => Some(NUMERIC_NINF),
        _ => None,
    };
    if let Some(sign) = special {
        return Ok(numeric_bytes(0, sign, 0, &[]));
    }

    let (negative, unsigned) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(format!("invalid input syntax for type numeric: \"{}\"", input).into());
    }
    let dscale = u16::try_from(frac_part.len())
        .ok()
        .filter(|d| *d <= NUMERIC_MAX_DSCALE)
        .ok_or("NUMERIC scale out of range")?;

    // Group into base-10000 digits aligned on the decimal point.
    let int_part = int_part.trim_start_matches('0');
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let mut padded = "0".repeat(int_pad);
    padded.push_str(int_part);
    padded.push_str(frac_part);
    padded.push_str(&"0".repeat(frac_pad));
    if padded.len() / 4 > usize::from(u16::MAX) {
        return Err("NUMERIC value out of range".into());
    }

    let mut digits: Vec<u16> = padded
        .as_bytes()
        .chunks(4)
        .map(|group| group.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0')))
        .collect();
    let mut weight = ((int_part.len() + int_pad) / 4) as i32 - 1;

    let leading = digits.iter().take_while(|d| **d == 0).count();
    digits.drain(..leading);
    weight -= leading as i32;
    while digits.last() == Some(&0) {
        digits.pop();
    }

    if digits.is_empty() {
        return Ok(numeric_bytes(0, NUMERIC_POS, dscale, &[]));
    }
    let weight = i16::try_from(weight).map_err(|_| "NUMERIC value out of range")?;
    let sign = if negative { NUMERIC_NEG } else { NUMERIC_POS };
    Ok(numeric_bytes(weight, sign, dscale, &digits))
}

fn numeric_bytes(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + digits.len() * 2);
    buf.extend_from_slice(&(digits.len() as u16).to_be_bytes());
    buf.extend_from_slice(&weight.to_be_bytes());
    buf.extend_from_slice(&sign.to_be_bytes());
    buf.extend_from_slice(&dscale.to_be_bytes());
    for digit in digits {
        buf.extend_from_slice(&digit.to_be_bytes());
    }
    buf
}

// =============================================================================
// Interval, Network and Time Zone Output
// =============================================================================

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

const MICROS_PER_HOUR: u64 = 3_600_000_000;
const MICROS_PER_MINUTE: u64 = 60_000_000;
const MICROS_PER_SECOND: u64 = 1_000_000;

/// Render an interval in PostgreSQL's default `postgres` IntervalStyle,
/// e.g. `1 year 2 mons 3 days 04:05:06`.
///
/// A positive field that follows a negative one carries an explicit `+`.
pub fn format_interval(months: i32, days: i32, microseconds: i64) -> String {
    let mut out = String::new();
    let mut is_before = false;

    for (value, unit) in [(months / 12, "year"), (months % 12, "mon"), (days, "day")] {
        if value == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        if is_before && value > 0 {
            out.push('+');
        }
        let plural = if value == 1 { "" } else { "s" };
        let _ = write!(out, "{} {}{}", value, unit, plural);
        is_before = value < 0;
    }

    if out.is_empty() || microseconds != 0 {
        if !out.is_empty() {
            out.push(' ');
        }
        if microseconds < 0 {
            out.push('-');
        } else if is_before {
            out.push('+');
        }
        let total = microseconds.unsigned_abs();
        let _ = write!(
            out,
            "{:02}:{:02}:{:02}",
            total / MICROS_PER_HOUR,
            total % MICROS_PER_HOUR / MICROS_PER_MINUTE,
            total % MICROS_PER_MINUTE / MICROS_PER_SECOND
        );
        let fraction = total % MICROS_PER_SECOND;
        if fraction != 0 {
            let digits = format!("{:06}", fraction);
            out.push('.');
            out.push_str(digits.trim_end_matches('0'));
        }
    }

    out
}

/// Render the binary `inet`/`cidr` layout: family, prefix bits, cidr flag,
/// address length, address bytes.
///
/// The prefix is printed for `cidr` and for `inet` values narrower than a
/// host address.
pub fn format_inet(bytes: &[u8]) -> Result<String, BoxDynError> {
    let [family, bits, is_cidr, len, addr @ ..] = bytes else {
        return Err("inet value shorter than its header".into());
    };
    if addr.len() != usize::from(*len) {
        return Err("inet address length does not match its header".into());
    }

    let (text, max_bits) = match (*family, addr) {
        (PGSQL_AF_INET, [a, b, c, d]) => (Ipv4Addr::new(*a, *b, *c, *d).to_string(), 32),
        (PGSQL_AF_INET6, _) => {
            let octets: [u8; 16] = addr
                .try_into()
                .map_err(|_| "invalid IPv6 address length")?;
            (Ipv6Addr::from(octets).to_string(), 128)
        }
        (other, _) => return Err(format!("unsupported inet family {}", other).into()),
    };

    if *is_cidr != 0 || *bits != max_bits {
        Ok(format!("{}/{}", text, bits))
    } else {
        Ok(text)
    }
}

/// `macaddr` / `macaddr8` as lowercase colon-separated hex.
pub fn format_macaddr(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// `timetz` the way PostgreSQL prints it: `10:30:00+02`, `10:30:00-03:30`.
pub fn format_time_tz(time: NaiveTime, offset: FixedOffset) -> String {
    let east = offset.local_minus_utc();
    let sign = if east < 0 { '-' } else { '+' };
    let east = east.unsigned_abs();
    let (hours, minutes, seconds) = (east / 3600, east % 3600 / 60, east % 60);

    let mut out = format!("{}{}{:02}", time, sign, hours);
    if minutes != 0 || seconds != 0 {
        let _ = write!(out, ":{:02}", minutes);
    }
    if seconds != 0 {
        let _ = write!(out, ":{:02}", seconds);
    }
    out
}

/// `money` as a plain decimal with two fraction digits, independent of
/// the server's `lc_monetary`.
pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

// =============================================================================
// Text Input for Parameters
// =============================================================================

/// Encode `inet` / `cidr` text (`192.168.0.1`, `10.0.0.0/8`, `::1`) into the
/// binary layout read by [`format_inet`].
pub fn encode_inet(input: &str, cidr: bool) -> Result<Vec<u8>, BoxDynError> {
    let s = input.trim();
    let (addr, bits) = match s.split_once('/') {
        Some((addr, bits)) => (addr, Some(bits.parse::<u8>()?)),
        None => (s, None),
    };
    let (family, octets, max_bits) = match addr.parse::<IpAddr>()? {
        IpAddr::V4(v4) => (PGSQL_AF_INET, v4.octets().to_vec(), 32u8),
        IpAddr::V6(v6) => (PGSQL_AF_INET6, v6.octets().to_vec(), 128u8),
    };
    let bits = bits.unwrap_or(max_bits);
    if bits > max_bits {
        return Err(format!("invalid prefix length /{} in \"{}\"", bits, input).into());
    }
    if cidr {
        let host_bits_set = octets.iter().enumerate().any(|(i, byte)| {
            let keep = u32::from(bits).saturating_sub(i as u32 * 8).min(8);
            keep < 8 && byte & (0xFFu8 >> keep) != 0
        });
        if host_bits_set {
            return Err(format!("invalid cidr value \"{}\": has bits set to right of mask", input).into());
        }
    }

    let mut buf = vec![family, bits, u8::from(cidr), octets.len() as u8];
    buf.extend_from_slice(&octets);
    Ok(buf)
}

/// Parse `08:00:2b:01:02:03` (or `-` separated) into exactly `len` octets.
pub fn encode_macaddr(input: &str, len: usize) -> Result<Vec<u8>, BoxDynError> {
    let octets = input
        .trim()
        .split([':', '-'])
        .map(|part| {
            if part.len() == 2 && part.bytes().all(|b| b.is_ascii_hexdigit()) {
                Ok(u8::from_str_radix(part, 16)?)
            } else {
                Err(BoxDynError::from(format!("invalid octet \"{}\"", part)))
            }
        })
        .collect::<Result<Vec<u8>, BoxDynError>>()?;
    if octets.len() != len {
        return Err(format!("expected {} octets, found {}", len, octets.len()).into());
    }
    Ok(octets)
}

/// Parse the interval forms [`format_interval`] prints, plus `week`,
/// `hour`, `minute` and `second` units: `1 year 2 mons 3 days 04:05:06`,
/// `-1 days +01:00:00`, `90 minutes`.
pub fn parse_interval(input: &str) -> Result<PgInterval, BoxDynError> {
    let overflow = || BoxDynError::from(format!("interval out of range: \"{}\"", input));
    let mut interval = PgInterval::default();
    let mut tokens = input.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return Err("empty interval".into());
    }

    while let Some(token) = tokens.next() {
        if token.contains(':') {
            let micros = parse_clock(token)?;
            interval.microseconds = interval.microseconds.checked_add(micros).ok_or_else(overflow)?;
            continue;
        }

        let amount: i64 = token.parse()?;
        let unit = tokens
            .next()
            .ok_or_else(|| format!("missing unit after {}", token))?
            .to_ascii_lowercase();
        let unit = unit.strip_suffix('s').unwrap_or(&unit);
        let as_i32 = |v: i64| i32::try_from(v).map_err(|_| overflow());
        match unit {
            "year" | "yr" => {
                let months = as_i32(amount.checked_mul(12).ok_or_else(overflow)?)?;
                interval.months = interval.months.checked_add(months).ok_or_else(overflow)?;
            }
            "mon" | "month" => {
                interval.months = interval.months.checked_add(as_i32(amount)?).ok_or_else(overflow)?;
            }
            "week" => {
                let days = as_i32(amount.checked_mul(7).ok_or_else(overflow)?)?;
                interval.days = interval.days.checked_add(days).ok_or_else(overflow)?;
            }
            "day" => {
                interval.days = interval.days.checked_add(as_i32(amount)?).ok_or_else(overflow)?;
            }
            "hour" | "hr" | "min" | "minute" | "sec" | "second" => {
                let scale = match unit {
                    "hour" | "hr" => MICROS_PER_HOUR,
                    "min" | "minute" => MICROS_PER_MINUTE,
                    _ => MICROS_PER_SECOND,
                };
                let micros = amount.checked_mul(scale as i64).ok_or_else(overflow)?;
                interval.microseconds = interval.microseconds.checked_add(micros).ok_or_else(overflow)?;
            }
            other => return Err(format!("unknown interval unit \"{}\"", other).into()),
        }
    }

    Ok(interval)
}

/// `[+-]H:MM[:SS[.ffffff]]` as signed microseconds.
fn parse_clock(token: &str) -> Result<i64, BoxDynError> {
    let (negative, clock) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    if !clock.bytes().all(|b| b.is_ascii_digit() || b == b':' || b == b'.') {
        return Err(format!("invalid time \"{}\"", token).into());
    }
    let mut parts = clock.split(':');
    let hours: i64 = parts.next().unwrap_or_default().parse()?;
    let minutes: i64 = parts.next().unwrap_or_default().parse()?;
    let (seconds, fraction) = match parts.next() {
        Some(sec) => match sec.split_once('.') {
            Some((whole, frac)) => (whole.parse::<i64>()?, frac),
            None => (sec.parse::<i64>()?, ""),
        },
        None => (0, ""),
    };
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 || fraction.len() > 6 {
        return Err(format!("invalid time \"{}\"", token).into());
    }
    let fraction_micros = if fraction.is_empty() {
        0
    } else {
        format!("{:0<6}", fraction).parse::<i64>()?
    };

    let micros = hours
        .checked_mul(MICROS_PER_HOUR as i64)
        .and_then(|h| h.checked_add(minutes * MICROS_PER_MINUTE as i64))
        .and_then(|t| t.checked_add(seconds * MICROS_PER_SECOND as i64 + fraction_micros))
        .ok_or_else(|| format!("time out of range: \"{}\"", token))?;
    Ok(if negative { -micros } else { micros })
}

/// Parse `10:30:00+02`, `10:30:00.5-03:30` or `10:30+0530`.
pub fn parse_time_tz(input: &str) -> Result<PgTimeTz<NaiveTime, FixedOffset>, BoxDynError> {
    let s = input.trim();
    let split = s
        .rfind(['+', '-'])
        .ok_or_else(|| format!("missing UTC offset in \"{}\"", input))?;
    let (clock, offset) = s.split_at(split);

    let time = ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(clock, format).ok())
        .ok_or_else(|| format!("invalid time \"{}\"", clock))?;

    let sign = if offset.starts_with('-') { -1 } else { 1 };
    let digits: String = offset[1..].chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() % 2 != 0 || digits.len() > 6 {
        return Err(format!("invalid UTC offset \"{}\"", offset).into());
    }
    let mut east = 0i32;
    for (i, pair) in digits.as_bytes().chunks(2).enumerate() {
        let value: i32 = std::str::from_utf8(pair)?.parse()?;
        east += value * [3600, 60, 1][i];
    }
    let offset = FixedOffset::east_opt(sign * east)
        .ok_or_else(|| format!("UTC offset out of range: \"{}\"", offset))?;

    Ok(PgTimeTz { time, offset })
}

/// Parse a money amount (`12.34`, `-$1,000.5`) into cents.
pub fn parse_money(input: &str) -> Result<i64, BoxDynError> {
    let s = input.trim();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        _ => (false, s),
    };
    let rest: String = rest.trim_start_matches('$').chars().filter(|c| *c != ',').collect();
    let (whole, cents) = rest.split_once('.').unwrap_or((rest.as_str(), ""));
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !digits_only(whole) || !digits_only(cents) || cents.len() > 2 {
        return Err(format!("invalid input syntax for type money: \"{}\"", input).into());
    }

    let amount = whole
        .parse::<i64>()?
        .checked_mul(100)
        .and_then(|c| c.checked_add(format!("{:0<2}", cents).parse::<i64>().ok()?))
        .ok_or_else(|| format!("value \"{}\" is out of range for type money", input))?;
    Ok(if negative { -amount } else { amount })
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// bytea values are always base64 (standard alphabet, padded).
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// Row to JSON
// =============================================================================

/// Conversion of a result row into a column-name → value map.
pub trait RowToJson {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue>;
    /// Value of the first column, `Null` for a zero-column row.
    fn first_value(&self) -> JsonValue;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.name().to_string(), decode_column(self, idx)))
            .collect()
    }

    fn first_value(&self) -> JsonValue {
        if self.columns().is_empty() {
            JsonValue::Null
        } else {
            decode_column(self, 0)
        }
    }
}

/// Decode one column; undecodable values are logged and become `Null`.
pub fn decode_column(row: &PgRow, idx: usize) -> JsonValue {
    match row.try_get::<Option<JsonCell>, _>(idx) {
        Ok(Some(cell)) => cell.0,
        Ok(None) => JsonValue::Null,
        Err(e) => {
            let type_name = row
                .columns()
                .get(idx)
                .map(|col| col.type_info().name().to_string())
                .unwrap_or_default();
            tracing::error!(column = idx, pg_type = %type_name, "Failed to decode value: {:?}", e);
            JsonValue::Null
        }
    }
}

/// A non-NULL value of any column type, decoded by its runtime type.
struct JsonCell(JsonValue);

impl Type<Postgres> for JsonCell {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, Postgres> for JsonCell {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let ty = value.type_info().into_owned();
        decode_value(value, &ty).map(JsonCell)
    }
}

fn decode_value(value: PgValueRef<'_>, ty: &PgTypeInfo) -> Result<JsonValue, BoxDynError> {
    match ty.kind() {
        PgTypeKind::Enum(_) => return Ok(JsonValue::String(value.as_str()?.to_string())),
        PgTypeKind::Domain(base) => return decode_value(value, base),
        PgTypeKind::Array(_) => {
            // One-dimensional only; elements are typed by the array header.
            let elements = <Vec<Option<JsonCell>> as Decode<Postgres>>::decode(value)?;
            return Ok(JsonValue::Array(
                elements
                    .into_iter()
                    .map(|e| e.map_or(JsonValue::Null, |cell| cell.0))
                    .collect(),
            ));
        }
        _ => {}
    }

    let json = match categorize_type(ty.name()) {
        TypeCategory::SmallInt => JsonValue::from(<i16 as Decode<Postgres>>::decode(value)?),
        TypeCategory::Int => JsonValue::from(<i32 as Decode<Postgres>>::decode(value)?),
        TypeCategory::BigInt => JsonValue::from(<i64 as Decode<Postgres>>::decode(value)?),
        TypeCategory::Real => float_value(<f32 as Decode<Postgres>>::decode(value)? as f64),
        TypeCategory::Double => float_value(<f64 as Decode<Postgres>>::decode(value)?),
        TypeCategory::Decimal => JsonValue::String(RawDecimal::decode(value)?.0),
        TypeCategory::Money => JsonValue::String(format_money(PgMoney::decode(value)?.0)),
        TypeCategory::Boolean => JsonValue::Bool(<bool as Decode<Postgres>>::decode(value)?),
        TypeCategory::Text => JsonValue::String(<String as Decode<Postgres>>::decode(value)?),
        TypeCategory::Binary => encode_binary_value(&<Vec<u8> as Decode<Postgres>>::decode(value)?),
        TypeCategory::Json => decode_json(value, ty)?,
        TypeCategory::Uuid => {
            JsonValue::String(<uuid::Uuid as Decode<Postgres>>::decode(value)?.to_string())
        }
        TypeCategory::Oid => JsonValue::from(<Oid as Decode<Postgres>>::decode(value)?.0),
        TypeCategory::Timestamp => {
            JsonValue::String(<NaiveDateTime as Decode<Postgres>>::decode(value)?.to_string())
        }
        TypeCategory::TimestampTz => JsonValue::String(
            <DateTime<Utc> as Decode<Postgres>>::decode(value)?
                .format("%Y-%m-%d %H:%M:%S%.f%:z")
                .to_string(),
        ),
        TypeCategory::Date => {
            JsonValue::String(<NaiveDate as Decode<Postgres>>::decode(value)?.to_string())
        }
        TypeCategory::Time => {
            JsonValue::String(<NaiveTime as Decode<Postgres>>::decode(value)?.to_string())
        }
        TypeCategory::TimeTz => {
            let v = <PgTimeTz<NaiveTime, FixedOffset> as Decode<Postgres>>::decode(value)?;
            JsonValue::String(format_time_tz(v.time, v.offset))
        }
        TypeCategory::Interval => {
            let v = PgInterval::decode(value)?;
            JsonValue::String(format_interval(v.months, v.days, v.microseconds))
        }
        TypeCategory::Inet => JsonValue::String(match value.format() {
            PgValueFormat::Binary => format_inet(value.as_bytes()?)?,
            PgValueFormat::Text => value.as_str()?.to_string(),
        }),
        TypeCategory::MacAddr => JsonValue::String(match value.format() {
            PgValueFormat::Binary => format_macaddr(value.as_bytes()?),
            PgValueFormat::Text => value.as_str()?.to_string(),
        }),
        TypeCategory::Unknown => decode_raw(&value)?,
    };
    Ok(json)
}

/// `json` is sent as-is; binary `jsonb` carries a leading version byte.
fn decode_json(value: PgValueRef<'_>, ty: &PgTypeInfo) -> Result<JsonValue, BoxDynError> {
    let mut bytes = value.as_bytes()?;
    if matches!(value.format(), PgValueFormat::Binary) && ty.name().eq_ignore_ascii_case("jsonb") {
        bytes = match bytes.split_first() {
            Some((1, rest)) => rest,
            _ => return Err("unsupported jsonb version".into()),
        };
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Types without a dedicated decoder: text when the server sent text or
/// printable UTF-8, base64 otherwise.
fn decode_raw(value: &PgValueRef<'_>) -> Result<JsonValue, BoxDynError> {
    if matches!(value.format(), PgValueFormat::Text) {
        return Ok(JsonValue::String(value.as_str()?.to_string()));
    }
    let bytes = value.as_bytes()?;
    match std::str::from_utf8(bytes) {
        Ok(text) if is_printable(text) => Ok(JsonValue::String(text.to_string())),
        _ => Ok(encode_binary_value(bytes)),
    }
}

fn is_printable(text: &str) -> bool {
    text.chars()
        .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}
