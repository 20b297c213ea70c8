//! Concrete evaluation of the operations the interpreter constant-folds.
//!
//! Every function returns [`EvalError`] when the runtime would raise an
//! exception or emit a diagnostic, so that callers only fold operations
//! whose concrete execution is silent.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::value::{ArrayKey, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("bit shift by negative number")]
    NegativeShift,
    #[error("unsupported operand types: {lhs} and {rhs}")]
    UnsupportedOperands {
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("unsupported operand type {0}")]
    UnsupportedOperand(&'static str),
    #[error("non-numeric value")]
    NonNumeric,
    #[error("{0} to string conversion")]
    StringConversion(&'static str),
    #[error("invalid array key of type {0}")]
    InvalidKey(&'static str),
    #[error("comparison of {lhs} with {rhs} is not silent")]
    Incomparable {
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("no foldable builtin named {0}")]
    UnknownBuiltin(String),
    #[error("builtin {0} rejects its arguments")]
    BadArguments(String),
}

pub type EvalResult<T = Value> = Result<T, EvalError>;

fn unsupported(a: &Value, b: &Value) -> EvalError {
    EvalError::UnsupportedOperands {
        lhs: a.kind_name(),
        rhs: b.kind_name(),
    }
}

fn incomparable(a: &Value, b: &Value) -> EvalError {
    EvalError::Incomparable {
        lhs: a.kind_name(),
        rhs: b.kind_name(),
    }
}

// ============================================================================
// Numeric conversion
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
enum Number {
    Int(i64),
    Dbl(f64),
}

impl Number {
    fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Dbl(d) => d,
        }
    }
}

/// Scan the longest numeric prefix of `s`, returning the number and the
/// length consumed (0 when there is no numeric prefix).
fn scan_numeric(s: &str) -> (Number, usize) {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c') {
        i += 1;
    }
    let start = i;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut is_float = false;
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            is_float = true;
            i = j;
        }
    }
    if digits == 0 {
        return (Number::Int(0), 0);
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            is_float = true;
            i = j;
        }
    }
    let text = &s[start..i];
    if !is_float {
        if let Ok(v) = text.parse::<i64>() {
            return (Number::Int(v), i);
        }
    }
    (Number::Dbl(text.parse::<f64>().unwrap_or(0.0)), i)
}

/// The number a string denotes when the whole string is numeric.
fn parse_numeric(s: &str) -> Option<Number> {
    let (n, len) = scan_numeric(s);
    (len > 0 && len == s.len()).then_some(n)
}

/// Integer conversion of a double. Non-finite and out-of-range values
/// convert to zero.
pub fn double_to_int(d: f64) -> i64 {
    if !d.is_finite() || d >= 9.223_372_036_854_775_807e18 || d < -9.223_372_036_854_775_808e18 {
        return 0;
    }
    d.trunc() as i64
}

/// Operand conversion for arithmetic: silent only for null, bools, numbers
/// and fully numeric strings.
fn to_number(v: &Value) -> EvalResult<Number> {
    match v {
        Value::Uninit | Value::Null => Ok(Number::Int(0)),
        Value::Bool(b) => Ok(Number::Int(*b as i64)),
        Value::Int(i) => Ok(Number::Int(*i)),
        Value::Dbl(d) => Ok(Number::Dbl(*d)),
        Value::Str(s) => parse_numeric(s).ok_or(EvalError::NonNumeric),
        other => Err(EvalError::UnsupportedOperand(other.kind_name())),
    }
}

pub fn to_bool(v: &Value) -> bool {
    match v {
        Value::Uninit | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Dbl(d) => *d != 0.0,
        Value::Str(s) => !(s.is_empty() || &**s == "0"),
        other => other.len().is_some_and(|n| n > 0),
    }
}

pub fn to_int(v: &Value) -> i64 {
    match v {
        Value::Uninit | Value::Null => 0,
        Value::Bool(b) => *b as i64,
        Value::Int(i) => *i,
        Value::Dbl(d) => double_to_int(*d),
        Value::Str(s) => match scan_numeric(s).0 {
            Number::Int(i) => i,
            Number::Dbl(d) => double_to_int(d),
        },
        other => other.len().is_some_and(|n| n > 0) as i64,
    }
}

pub fn to_double(v: &Value) -> f64 {
    match v {
        Value::Dbl(d) => *d,
        Value::Str(s) => scan_numeric(s).0.to_f64(),
        other => to_int(other) as f64,
    }
}

/// `%.14G`-style rendering of a double.
fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NAN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:.13e}", d);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
    if (-5..15).contains(&exp) {
        let (sign, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", mantissa),
        };
        let digits: String = digits.chars().filter(|c| *c != '.').collect();
        let point = exp + 1;
        let body = if point <= 0 {
            format!("0.{}{}", "0".repeat((-point) as usize), digits)
        } else if point as usize >= digits.len() {
            format!("{}{}", digits, "0".repeat(point as usize - digits.len()))
        } else {
            format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
        };
        format!("{sign}{body}")
    } else {
        let mantissa = if mantissa.contains('.') {
            mantissa.to_string()
        } else {
            format!("{mantissa}.0")
        };
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}E{sign}{}", exp.abs())
    }
}

pub fn to_string(v: &Value) -> EvalResult<Arc<str>> {
    match v {
        Value::Uninit | Value::Null => Ok("".into()),
        Value::Bool(true) => Ok("1".into()),
        Value::Bool(false) => Ok("".into()),
        Value::Int(i) => Ok(i.to_string().into()),
        Value::Dbl(d) => Ok(format_double(*d).into()),
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::StringConversion(other.kind_name())),
    }
}

/// Key conversion for legacy arrays: integer-like strings, bools, null and
/// doubles are coerced.
pub fn to_arr_key(v: &Value) -> EvalResult<ArrayKey> {
    match v {
        Value::Int(i) => Ok(ArrayKey::Int(*i)),
        Value::Str(s) => match s.parse::<i64>() {
            Ok(i) if i.to_string() == **s => Ok(ArrayKey::Int(i)),
            _ => Ok(ArrayKey::Str(s.clone())),
        },
        Value::Bool(b) => Ok(ArrayKey::Int(*b as i64)),
        Value::Null => Ok(ArrayKey::Str("".into())),
        Value::Dbl(d) if d.is_finite() => Ok(ArrayKey::Int(double_to_int(*d))),
        other => Err(EvalError::InvalidKey(other.kind_name())),
    }
}

/// Key conversion for hack arrays: only ints and strings are keys.
pub fn to_hack_key(v: &Value) -> EvalResult<ArrayKey> {
    match v {
        Value::Int(i) => Ok(ArrayKey::Int(*i)),
        Value::Str(s) => Ok(ArrayKey::Str(s.clone())),
        other => Err(EvalError::InvalidKey(other.kind_name())),
    }
}

fn upsert(entries: &mut Vec<(ArrayKey, Value)>, key: ArrayKey, val: Value) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = val,
        None => entries.push((key, val)),
    }
}

// ============================================================================
// Arithmetic and bitwise operators
// ============================================================================

fn numeric_binop(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    dbl_op: fn(f64, f64) -> f64,
) -> EvalResult {
    if a.is_array_like() || b.is_array_like() {
        return Err(unsupported(a, b));
    }
    match (to_number(a)?, to_number(b)?) {
        (Number::Int(x), Number::Int(y)) => Ok(match int_op(x, y) {
            Some(r) => Value::Int(r),
            None => Value::Dbl(dbl_op(x as f64, y as f64)),
        }),
        (x, y) => Ok(Value::Dbl(dbl_op(x.to_f64(), y.to_f64()))),
    }
}

pub fn add(a: &Value, b: &Value) -> EvalResult {
    if let (Value::Arr(x), Value::Arr(y)) = (a, b) {
        let mut out = x.clone();
        for (k, v) in y {
            if !out.iter().any(|(ok, _)| ok == k) {
                out.push((k.clone(), v.clone()));
            }
        }
        return Ok(Value::Arr(out));
    }
    numeric_binop(a, b, i64::checked_add, |x, y| x + y)
}

pub fn sub(a: &Value, b: &Value) -> EvalResult {
    numeric_binop(a, b, i64::checked_sub, |x, y| x - y)
}

pub fn mul(a: &Value, b: &Value) -> EvalResult {
    numeric_binop(a, b, i64::checked_mul, |x, y| x * y)
}

pub fn div(a: &Value, b: &Value) -> EvalResult {
    if a.is_array_like() || b.is_array_like() {
        return Err(unsupported(a, b));
    }
    let (x, y) = (to_number(a)?, to_number(b)?);
    if y.to_f64() == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    match (x, y) {
        (Number::Int(x), Number::Int(y)) if x.checked_rem(y) == Some(0) => Ok(Value::Int(x / y)),
        (x, y) => Ok(Value::Dbl(x.to_f64() / y.to_f64())),
    }
}

fn int_operand(v: &Value) -> EvalResult<i64> {
    match to_number(v)? {
        Number::Int(i) => Ok(i),
        Number::Dbl(d) => Ok(double_to_int(d)),
    }
}

pub fn modulo(a: &Value, b: &Value) -> EvalResult {
    if a.is_array_like() || b.is_array_like() {
        return Err(unsupported(a, b));
    }
    let (x, y) = (int_operand(a)?, int_operand(b)?);
    if y == 0 {
        return Err(EvalError::ModuloByZero);
    }
    Ok(Value::Int(x.wrapping_rem(y)))
}

pub fn pow(a: &Value, b: &Value) -> EvalResult {
    if a.is_array_like() || b.is_array_like() {
        return Err(unsupported(a, b));
    }
    match (to_number(a)?, to_number(b)?) {
        (Number::Int(x), Number::Int(y)) if y >= 0 => Ok(u32::try_from(y)
            .ok()
            .and_then(|y| x.checked_pow(y))
            .map(Value::Int)
            .unwrap_or_else(|| Value::Dbl((x as f64).powf(y as f64)))),
        (x, y) => Ok(Value::Dbl(x.to_f64().powf(y.to_f64()))),
    }
}

fn string_bitop(x: &str, y: &str, op: fn(u8, u8) -> u8, pad: bool) -> EvalResult {
    let (xb, yb) = (x.as_bytes(), y.as_bytes());
    let len = if pad { xb.len().max(yb.len()) } else { xb.len().min(yb.len()) };
    let bytes: Vec<u8> = (0..len)
        .map(|i| op(*xb.get(i).unwrap_or(&0), *yb.get(i).unwrap_or(&0)))
        .collect();
    String::from_utf8(bytes)
        .map(|s| Value::Str(s.into()))
        .map_err(|_| EvalError::UnsupportedOperands {
            lhs: "string",
            rhs: "string",
        })
}

fn int_bitop(a: &Value, b: &Value, op: fn(i64, i64) -> i64) -> EvalResult {
    if a.is_array_like() || b.is_array_like() {
        return Err(unsupported(a, b));
    }
    Ok(Value::Int(op(int_operand(a)?, int_operand(b)?)))
}

pub fn bit_and(a: &Value, b: &Value) -> EvalResult {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => string_bitop(x, y, |l, r| l & r, false),
        _ => int_bitop(a, b, |l, r| l & r),
    }
}

pub fn bit_or(a: &Value, b: &Value) -> EvalResult {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => string_bitop(x, y, |l, r| l | r, true),
        _ => int_bitop(a, b, |l, r| l | r),
    }
}

pub fn bit_xor(a: &Value, b: &Value) -> EvalResult {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => string_bitop(x, y, |l, r| l ^ r, false),
        _ => int_bitop(a, b, |l, r| l ^ r),
    }
}

pub fn shl(a: &Value, b: &Value) -> EvalResult {
    let (x, y) = (int_operand(a)?, int_operand(b)?);
    if y < 0 {
        return Err(EvalError::NegativeShift);
    }
    Ok(Value::Int(if y >= 64 { 0 } else { x.wrapping_shl(y as u32) }))
}

pub fn shr(a: &Value, b: &Value) -> EvalResult {
    let (x, y) = (int_operand(a)?, int_operand(b)?);
    if y < 0 {
        return Err(EvalError::NegativeShift);
    }
    Ok(Value::Int(if y >= 64 { if x < 0 { -1 } else { 0 } } else { x >> y }))
}

pub fn bit_not(a: &Value) -> EvalResult {
    match a {
        Value::Int(i) => Ok(Value::Int(!i)),
        Value::Dbl(d) => Ok(Value::Int(!double_to_int(*d))),
        Value::Str(s) => {
            let bytes: Vec<u8> = s.bytes().map(|b| !b).collect();
            String::from_utf8(bytes)
                .map(|s| Value::Str(s.into()))
                .map_err(|_| EvalError::UnsupportedOperand("string"))
        }
        other => Err(EvalError::UnsupportedOperand(other.kind_name())),
    }
}

pub fn concat(a: &Value, b: &Value) -> EvalResult {
    let mut s = to_string(a)?.to_string();
    s.push_str(&to_string(b)?);
    Ok(Value::Str(s.into()))
}

// ============================================================================
// Comparison
// ============================================================================

/// Strict identity (`===`). Doubles compare with IEEE equality, so `NAN`
/// is never identical to itself and `0.0` is identical to `-0.0`.
pub fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Uninit | Value::Null, Value::Uninit | Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Dbl(x), Value::Dbl(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Vec(x), Value::Vec(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| same(l, r))
        }
        (Value::Keyset(x), Value::Keyset(y)) => x == y,
        (Value::Arr(x), Value::Arr(y)) | (Value::Dict(x), Value::Dict(y)) => {
            x.len() == y.len()
                && x.iter().zip(y).all(|((kx, vx), (ky, vy))| kx == ky && same(vx, vy))
        }
        _ => false,
    }
}

fn number_cmp(x: Number, y: Number) -> Option<Ordering> {
    match (x, y) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
    }
}

/// Loose equality (`==`).
pub fn equal(a: &Value, b: &Value) -> EvalResult<bool> {
    match (a, b) {
        (Value::Uninit | Value::Null, Value::Uninit | Value::Null) => Ok(true),
        (Value::Uninit | Value::Null, Value::Str(s)) | (Value::Str(s), Value::Uninit | Value::Null) => {
            Ok(s.is_empty())
        }
        (Value::Bool(_) | Value::Null | Value::Uninit, _)
        | (_, Value::Bool(_) | Value::Null | Value::Uninit) => Ok(to_bool(a) == to_bool(b)),
        (Value::Str(x), Value::Str(y)) => match (parse_numeric(x), parse_numeric(y)) {
            (Some(nx), Some(ny)) => Ok(number_cmp(nx, ny) == Some(Ordering::Equal)),
            _ => Ok(x == y),
        },
        (Value::Int(_) | Value::Dbl(_) | Value::Str(_), Value::Int(_) | Value::Dbl(_) | Value::Str(_)) => {
            let nx = loose_number(a);
            let ny = loose_number(b);
            Ok(number_cmp(nx, ny) == Some(Ordering::Equal))
        }
        (Value::Vec(x), Value::Vec(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for (l, r) in x.iter().zip(y) {
                if !equal(l, r)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Keyset(x), Value::Keyset(y)) => {
            Ok(x.len() == y.len() && x.iter().all(|k| y.contains(k)))
        }
        (Value::Arr(x), Value::Arr(y)) | (Value::Dict(x), Value::Dict(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for (k, v) in x {
                match y.iter().find(|(ky, _)| ky == k) {
                    Some((_, w)) if equal(v, w)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        _ => Err(incomparable(a, b)),
    }
}

fn loose_number(v: &Value) -> Number {
    match v {
        Value::Int(i) => Number::Int(*i),
        Value::Dbl(d) => Number::Dbl(*d),
        Value::Str(s) => scan_numeric(s).0,
        other => Number::Int(to_int(other)),
    }
}

/// Relational comparison (`<=>`). Unordered doubles and container
/// comparisons are not folded.
pub fn compare(a: &Value, b: &Value) -> EvalResult<Ordering> {
    let ord = match (a, b) {
        (Value::Str(x), Value::Str(y)) => match (parse_numeric(x), parse_numeric(y)) {
            (Some(nx), Some(ny)) => number_cmp(nx, ny),
            _ => Some(x.as_bytes().cmp(y.as_bytes())),
        },
        (Value::Uninit | Value::Null, Value::Str(s)) => Some("".cmp(&**s)),
        (Value::Str(s), Value::Uninit | Value::Null) => Some((**s).cmp("")),
        (Value::Bool(_) | Value::Null | Value::Uninit, _)
        | (_, Value::Bool(_) | Value::Null | Value::Uninit) => {
            if a.is_array_like() || b.is_array_like() {
                return Err(incomparable(a, b));
            }
            Some(to_bool(a).cmp(&to_bool(b)))
        }
        (Value::Int(_) | Value::Dbl(_) | Value::Str(_), Value::Int(_) | Value::Dbl(_) | Value::Str(_)) => {
            number_cmp(loose_number(a), loose_number(b))
        }
        _ => None,
    };
    ord.ok_or_else(|| incomparable(a, b))
}

// ============================================================================
// Casts
// ============================================================================

pub fn cast_vec(v: &Value) -> EvalResult {
    match v {
        Value::Vec(_) => Ok(v.clone()),
        Value::Arr(_) | Value::Dict(_) | Value::Keyset(_) => {
            Ok(Value::Vec(v.entries().into_iter().map(|(_, e)| e).collect()))
        }
        other => Err(EvalError::UnsupportedOperand(other.kind_name())),
    }
}

pub fn cast_dict(v: &Value) -> EvalResult {
    match v {
        Value::Dict(_) => Ok(v.clone()),
        Value::Arr(_) | Value::Vec(_) | Value::Keyset(_) => Ok(Value::Dict(v.entries())),
        other => Err(EvalError::UnsupportedOperand(other.kind_name())),
    }
}

pub fn cast_keyset(v: &Value) -> EvalResult {
    match v {
        Value::Keyset(_) => Ok(v.clone()),
        Value::Arr(_) | Value::Vec(_) | Value::Dict(_) => {
            let mut keys: Vec<ArrayKey> = Vec::new();
            for (_, e) in v.entries() {
                let k = to_hack_key(&e)?;
                if !keys.contains(&k) {
                    keys.push(k);
                }
            }
            Ok(Value::Keyset(keys))
        }
        other => Err(EvalError::UnsupportedOperand(other.kind_name())),
    }
}

pub fn cast_array(v: &Value) -> EvalResult {
    match v {
        Value::Uninit | Value::Null => Ok(Value::Arr(Vec::new())),
        Value::Arr(_) => Ok(v.clone()),
        Value::Vec(_) | Value::Dict(_) | Value::Keyset(_) => Ok(Value::Arr(v.entries())),
        scalar => Ok(Value::Arr(vec![(ArrayKey::Int(0), scalar.clone())])),
    }
}

/// Append a value to a container under the next integer key.
pub fn append(container: &Value, v: Value) -> EvalResult {
    match container {
        Value::Vec(elems) => {
            let mut elems = elems.clone();
            elems.push(v);
            Ok(Value::Vec(elems))
        }
        Value::Keyset(keys) => {
            let k = to_hack_key(&v)?;
            let mut keys = keys.clone();
            if !keys.contains(&k) {
                keys.push(k);
            }
            Ok(Value::Keyset(keys))
        }
        Value::Arr(entries) | Value::Dict(entries) => {
            let next = entries
                .iter()
                .filter_map(|(k, _)| match k {
                    ArrayKey::Int(i) => Some(*i + 1),
                    ArrayKey::Str(_) => None,
                })
                .max()
                .unwrap_or(0)
                .max(0);
            let mut entries = entries.clone();
            entries.push((ArrayKey::Int(next), v));
            Ok(match container {
                Value::Arr(_) => Value::Arr(entries),
                _ => Value::Dict(entries),
            })
        }
        other => Err(EvalError::UnsupportedOperand(other.kind_name())),
    }
}

/// Store `v` under `key` in a keyed container.
pub fn set_elem(container: &Value, key: &Value, v: Value) -> EvalResult {
    match container {
        Value::Arr(entries) => {
            let mut entries = entries.clone();
            upsert(&mut entries, to_arr_key(key)?, v);
            Ok(Value::Arr(entries))
        }
        Value::Dict(entries) => {
            let mut entries = entries.clone();
            upsert(&mut entries, to_hack_key(key)?, v);
            Ok(Value::Dict(entries))
        }
        other => Err(EvalError::UnsupportedOperand(other.kind_name())),
    }
}

// ============================================================================
// Foldable builtins
// ============================================================================

fn exactly<'a, const N: usize>(name: &str, args: &'a [Value]) -> EvalResult<&'a [Value; N]> {
    args.try_into()
        .map_err(|_| EvalError::BadArguments(name.to_string()))
}

/// Evaluate a pure builtin on literal arguments.
pub fn call_builtin(name: &str, args: &[Value]) -> EvalResult {
    let bad = || EvalError::BadArguments(name.to_string());
    match name.to_ascii_lowercase().as_str() {
        "strlen" => match exactly::<1>(name, args)? {
            [Value::Str(s)] => Ok(Value::Int(s.len() as i64)),
            _ => Err(bad()),
        },
        "abs" => match exactly::<1>(name, args)? {
            [Value::Int(i)] => Ok(i.checked_abs().map(Value::Int).unwrap_or(Value::Dbl(-(*i as f64)))),
            [Value::Dbl(d)] => Ok(Value::Dbl(d.abs())),
            _ => Err(bad()),
        },
        "count" => match exactly::<1>(name, args)? {
            [v] => v.len().map(|n| Value::Int(n as i64)).ok_or_else(bad),
        },
        "min" | "max" => {
            if args.len() < 2 {
                return Err(bad());
            }
            let mut best = args[0].clone();
            for arg in &args[1..] {
                let ord = compare(arg, &best)?;
                let better = if name.eq_ignore_ascii_case("min") {
                    ord == Ordering::Less
                } else {
                    ord == Ordering::Greater
                };
                if better {
                    best = arg.clone();
                }
            }
            Ok(best)
        }
        "intval" => match exactly::<1>(name, args)? {
            [v] if !v.is_array_like() => Ok(Value::Int(to_int(v))),
            _ => Err(bad()),
        },
        "floatval" => match exactly::<1>(name, args)? {
            [v] if !v.is_array_like() => Ok(Value::Dbl(to_double(v))),
            _ => Err(bad()),
        },
        "boolval" => match exactly::<1>(name, args)? {
            [v] => Ok(Value::Bool(to_bool(v))),
        },
        "strval" => match exactly::<1>(name, args)? {
            [v] => to_string(v).map(Value::Str),
        },
        "strtolower" => match exactly::<1>(name, args)? {
            [Value::Str(s)] => Ok(Value::Str(s.to_ascii_lowercase().into())),
            _ => Err(bad()),
        },
        "strtoupper" => match exactly::<1>(name, args)? {
            [Value::Str(s)] => Ok(Value::Str(s.to_ascii_uppercase().into())),
            _ => Err(bad()),
        },
        "str_repeat" => match exactly::<2>(name, args)? {
            [Value::Str(s), Value::Int(n)] if *n >= 0 && *n <= 4096 => {
                Ok(Value::Str(s.repeat(*n as usize).into()))
            }
            _ => Err(bad()),
        },
        "chr" => match exactly::<1>(name, args)? {
            [Value::Int(i)] => {
                let b = i.rem_euclid(256) as u8;
                if b.is_ascii() {
                    Ok(Value::Str(char::from(b).to_string().into()))
                } else {
                    Err(bad())
                }
            }
            _ => Err(bad()),
        },
        "ord" => match exactly::<1>(name, args)? {
            [Value::Str(s)] => Ok(Value::Int(s.as_bytes().first().copied().unwrap_or(0) as i64)),
            _ => Err(bad()),
        },
        "is_int" => exactly::<1>(name, args).map(|[v]| Value::Bool(matches!(v, Value::Int(_)))),
        "is_float" => exactly::<1>(name, args).map(|[v]| Value::Bool(matches!(v, Value::Dbl(_)))),
        "is_string" => exactly::<1>(name, args).map(|[v]| Value::Bool(matches!(v, Value::Str(_)))),
        "is_bool" => exactly::<1>(name, args).map(|[v]| Value::Bool(matches!(v, Value::Bool(_)))),
        "is_null" => exactly::<1>(name, args)
            .map(|[v]| Value::Bool(matches!(v, Value::Null | Value::Uninit))),
        "is_array" => exactly::<1>(name, args).map(|[v]| Value::Bool(matches!(v, Value::Arr(_)))),
        _ => Err(EvalError::UnknownBuiltin(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_promotes_on_overflow() {
        assert_eq!(add(&Value::Int(1), &Value::Int(2)), Ok(Value::Int(3)));
        assert_eq!(
            add(&Value::Int(i64::MAX), &Value::Int(1)),
            Ok(Value::Dbl(i64::MAX as f64 + 1.0))
        );
        assert_eq!(add(&Value::str("2"), &Value::Dbl(0.5)), Ok(Value::Dbl(2.5)));
        assert_eq!(add(&Value::str("x"), &Value::Int(1)), Err(EvalError::NonNumeric));
    }

    #[test]
    fn division_rules() {
        assert_eq!(div(&Value::Int(6), &Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(div(&Value::Int(1), &Value::Int(2)), Ok(Value::Dbl(0.5)));
        assert_eq!(div(&Value::Int(1), &Value::Int(0)), Err(EvalError::DivisionByZero));
        assert_eq!(modulo(&Value::Int(1), &Value::Int(0)), Err(EvalError::ModuloByZero));
        assert_eq!(modulo(&Value::Int(i64::MIN), &Value::Int(-1)), Ok(Value::Int(0)));
    }

    #[test]
    fn nan_identity_follows_ieee() {
        let nan = Value::Dbl(f64::NAN);
        assert!(!same(&nan, &nan));
        assert!(same(&Value::Dbl(0.0), &Value::Dbl(-0.0)));
        assert!(!same(&Value::Int(1), &Value::Dbl(1.0)));
        assert_eq!(equal(&nan, &nan), Ok(false));
        assert!(compare(&nan, &Value::Dbl(1.0)).is_err());
    }

    #[test]
    fn loose_equality() {
        assert_eq!(equal(&Value::Null, &Value::Bool(false)), Ok(true));
        assert_eq!(equal(&Value::Null, &Value::str("0")), Ok(false));
        assert_eq!(equal(&Value::str("1e1"), &Value::str("10")), Ok(true));
        assert_eq!(equal(&Value::Int(0), &Value::str("a")), Ok(true));
    }

    #[test]
    fn double_rendering() {
        assert_eq!(&*to_string(&Value::Dbl(1.0)).unwrap(), "1");
        assert_eq!(&*to_string(&Value::Dbl(0.1)).unwrap(), "0.1");
        assert_eq!(&*to_string(&Value::Dbl(1.5e20)).unwrap(), "1.5E+20");
        assert_eq!(&*to_string(&Value::Dbl(f64::NAN)).unwrap(), "NAN");
    }

    #[test]
    fn builtins_fold() {
        assert_eq!(call_builtin("strlen", &[Value::str("abc")]), Ok(Value::Int(3)));
        assert_eq!(
            call_builtin("max", &[Value::Int(1), Value::Int(7), Value::Int(3)]),
            Ok(Value::Int(7))
        );
        assert!(call_builtin("strlen", &[Value::Int(1)]).is_err());
        assert!(matches!(
            call_builtin("file_get_contents", &[]),
            Err(EvalError::UnknownBuiltin(_))
        ));
    }
}
