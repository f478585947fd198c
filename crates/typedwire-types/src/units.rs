//! Physical unit expressions.
//!
//! A unit expression is a product of prefixed SI symbols with optional
//! integer exponents, e.g. `cm`, `kg*m/s**2`, `km/hr`, `m^-1`. Terms are
//! joined by `*`, `/` or whitespace; `/` applies to the following term only.
//! The empty string and `n/a` are dimensionless and compatible with
//! everything.

use crate::error::{CodecError, Result};

const DIMENSIONS: usize = 7;

/// Dimension exponents in the order length, mass, time, temperature,
/// amount, current, luminous intensity.
type Dims = [i32; DIMENSIONS];

const LENGTH: Dims = [1, 0, 0, 0, 0, 0, 0];
const MASS: Dims = [0, 1, 0, 0, 0, 0, 0];
const TIME: Dims = [0, 0, 1, 0, 0, 0, 0];
const TEMPERATURE: Dims = [0, 0, 0, 1, 0, 0, 0];
const AMOUNT: Dims = [0, 0, 0, 0, 1, 0, 0];
const CURRENT: Dims = [0, 0, 0, 0, 0, 1, 0];
const LUMINOSITY: Dims = [0, 0, 0, 0, 0, 0, 1];
const NONE: Dims = [0; DIMENSIONS];

/// A parsed unit: `factor * 10^pow10` base units of the given dimensions.
///
/// Decimal prefixes are tracked as an exact power of ten so that prefix
/// conversions such as `cm -> m` do not pick up binary rounding noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    factor: f64,
    pow10: i32,
    dims: Dims,
}

impl Unit {
    const ONE: Unit = Unit::base(1.0, 0, NONE);

    const fn base(factor: f64, pow10: i32, dims: Dims) -> Self {
        Self {
            factor,
            pow10,
            dims,
        }
    }

    fn mul(self, other: Unit) -> Unit {
        let mut dims = self.dims;
        for (d, o) in dims.iter_mut().zip(other.dims) {
            *d += o;
        }
        Unit {
            factor: self.factor * other.factor,
            pow10: self.pow10 + other.pow10,
            dims,
        }
    }

    fn powi(self, exp: i32) -> Unit {
        Unit {
            factor: self.factor.powi(exp),
            pow10: self.pow10 * exp,
            dims: self.dims.map(|d| d * exp),
        }
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dims == NONE
    }

    pub fn same_dimension(&self, other: &Unit) -> bool {
        self.dims == other.dims
    }
}

/// Whether `expr` denotes "no units".
pub fn is_dimensionless(expr: &str) -> bool {
    let expr = expr.trim();
    expr.is_empty() || expr.eq_ignore_ascii_case("n/a")
}

/// Parse a unit expression.
pub fn parse(expr: &str) -> Result<Unit> {
    if is_dimensionless(expr) {
        return Ok(Unit::ONE);
    }

    let mut tokens = tokenize(expr)?.into_iter().peekable();
    let mut unit = Unit::ONE;
    let mut sign = 1;
    loop {
        let term = match tokens.next() {
            Some(Token::Symbol(symbol)) => lookup(symbol)
                .ok_or_else(|| CodecError::Units(format!("unknown unit '{symbol}' in '{expr}'")))?,
            Some(Token::Number(1)) => Unit::ONE,
            _ => return Err(invalid(expr)),
        };

        let mut exp = 1;
        if matches!(tokens.peek(), Some(Token::Pow)) {
            tokens.next();
            match tokens.next() {
                Some(Token::Number(n)) => exp = n,
                _ => return Err(invalid(expr)),
            }
        }
        unit = unit.mul(term.powi(exp * sign));

        match tokens.peek() {
            None => break,
            Some(Token::Mul) => {
                tokens.next();
                sign = 1;
            }
            Some(Token::Div) => {
                tokens.next();
                sign = -1;
            }
            Some(Token::Symbol(_)) => sign = 1,
            Some(_) => return Err(invalid(expr)),
        }
    }
    Ok(unit)
}

/// Whether two unit expressions describe the same physical dimension.
///
/// Dimensionless expressions are compatible with anything; unparseable
/// expressions are compatible only with an identical string.
pub fn are_compatible(a: &str, b: &str) -> bool {
    if is_dimensionless(a) || is_dimensionless(b) || a == b {
        return true;
    }
    match (parse(a), parse(b)) {
        (Ok(a), Ok(b)) => a.same_dimension(&b),
        _ => false,
    }
}

/// Convert `value` expressed in `from` into `to`.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64> {
    if from == to || is_dimensionless(from) || is_dimensionless(to) {
        return Ok(value);
    }
    let (source, target) = (parse(from)?, parse(to)?);
    if !source.same_dimension(&target) {
        return Err(CodecError::Units(format!(
            "cannot convert '{from}' to incompatible units '{to}'"
        )));
    }

    let scaled = value * source.factor / target.factor;
    let shift = source.pow10 - target.pow10;
    Ok(if shift >= 0 {
        scaled * 10f64.powi(shift)
    } else {
        scaled / 10f64.powi(-shift)
    })
}

fn invalid(expr: &str) -> CodecError {
    CodecError::Units(format!("invalid unit expression '{expr}'"))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Symbol(&'a str),
    Number(i32),
    Mul,
    Div,
    Pow,
}

fn tokenize(expr: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '*' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '*'))) {
                    chars.next();
                    tokens.push(Token::Pow);
                } else {
                    tokens.push(Token::Mul);
                }
            }
            '^' => {
                chars.next();
                tokens.push(Token::Pow);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Div);
            }
            '-' | '+' | '0'..='9' => {
                chars.next();
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    chars.next();
                    end = i + d.len_utf8();
                }
                let n = expr[start..end].parse::<i32>().map_err(|_| invalid(expr))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() => {
                chars.next();
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if !d.is_alphabetic() {
                        break;
                    }
                    chars.next();
                    end = i + d.len_utf8();
                }
                tokens.push(Token::Symbol(&expr[start..end]));
            }
            _ => return Err(invalid(expr)),
        }
    }
    Ok(tokens)
}

const PREFIXES: [(&str, i32); 13] = [
    ("da", 1),
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("h", 2),
    ("d", -1),
    ("c", -2),
    ("m", -3),
    ("u", -6),
    ("µ", -6),
    ("μ", -6),
    ("n", -9),
    ("p", -12),
];

fn base_unit(symbol: &str) -> Option<Unit> {
    let unit = match symbol {
        "m" => Unit::base(1.0, 0, LENGTH),
        "g" => Unit::base(1.0, 0, MASS),
        "s" => Unit::base(1.0, 0, TIME),
        "K" => Unit::base(1.0, 0, TEMPERATURE),
        "mol" => Unit::base(1.0, 0, AMOUNT),
        "A" => Unit::base(1.0, 0, CURRENT),
        "cd" => Unit::base(1.0, 0, LUMINOSITY),
        "min" => Unit::base(60.0, 0, TIME),
        "h" | "hr" => Unit::base(3600.0, 0, TIME),
        "day" => Unit::base(86400.0, 0, TIME),
        "L" | "l" => Unit::base(1.0, -3, [3, 0, 0, 0, 0, 0, 0]),
        "N" => Unit::base(1.0, 3, [1, 1, -2, 0, 0, 0, 0]),
        "J" => Unit::base(1.0, 3, [2, 1, -2, 0, 0, 0, 0]),
        "W" => Unit::base(1.0, 3, [2, 1, -3, 0, 0, 0, 0]),
        "Pa" => Unit::base(1.0, 3, [-1, 1, -2, 0, 0, 0, 0]),
        "Hz" => Unit::base(1.0, 0, [0, 0, -1, 0, 0, 0, 0]),
        _ => return None,
    };
    Some(unit)
}

fn lookup(symbol: &str) -> Option<Unit> {
    if let Some(unit) = base_unit(symbol) {
        return Some(unit);
    }
    PREFIXES.iter().find_map(|(prefix, pow10)| {
        let rest = symbol.strip_prefix(prefix)?;
        let unit = base_unit(rest)?;
        Some(unit.mul(Unit::base(1.0, *pow10, NONE)))
    })
}
