//! Dynamic value model produced and consumed by transforms.
//!
//! Schemas are resolved at run time, so the values flowing through pack and
//! unpack are dynamically typed: a [`Value`] covers every domain a transform
//! can produce, and a [`Record`] is the order-preserving instance of a
//! structure schema.

use std::fmt;
use std::net::IpAddr;

/// A dynamically typed value flowing through pack/unpack
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The "no value" marker; absent sentinel for optional members
    Nothing,
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating-point number (half and single widths widen to f64 on unpack)
    Float(f64),
    /// Exact numerator/denominator pair
    Rational(Rational),
    /// Raw byte string
    Bytes(Vec<u8>),
    /// Named enumerant
    Keyword(String),
    /// Raw flag bits; named sub-fields are read through the owning transform
    Flags(u64),
    /// Network address
    Ip(IpAddr),
    /// Homogeneous sequence
    List(Vec<Value>),
    /// Structure instance
    Record(Record),
}

impl Value {
    /// Short name of the value's variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nothing => "nothing",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Rational(_) => "rational",
            Value::Bytes(_) => "bytes",
            Value::Keyword(_) => "keyword",
            Value::Flags(_) => "flags",
            Value::Ip(_) => "ip",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// Returns the value as a byte length or element count, if it is a
    /// non-negative integer
    pub fn as_len(&self) -> Option<usize> {
        match self {
            Value::UInt(v) => usize::try_from(*v).ok(),
            Value::Int(v) if *v >= 0 => usize::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value as a record, if it is one
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the value as a list, if it is one
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// True if this is the absent/no-value marker
    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nothing => write!(f, "(nothing)"),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Rational(r) => write!(f, "{}", r),
            Value::Bytes(b) => {
                write!(f, "x'")?;
                for byte in b.iter().take(16) {
                    write!(f, "{:02x}", byte)?;
                }
                if b.len() > 16 {
                    write!(f, "...(+{})", b.len() - 16)?;
                }
                write!(f, "'")
            }
            Value::Keyword(name) => write!(f, "{}", name),
            Value::Flags(bits) => write!(f, "0b{:b}", bits),
            Value::Ip(addr) => write!(f, "{}", addr),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record(r) => write!(f, "{}", r),
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Keyword(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<IpAddr> for Value {
    fn from(v: IpAddr) -> Self {
        Value::Ip(v)
    }
}

impl From<Rational> for Value {
    fn from(v: Rational) -> Self {
        Value::Rational(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

/// An exact numerator/denominator pair, normalized to lowest terms.
///
/// The zero value is canonically `(0, 0)` — the "unknown value" convention
/// used by rational fields in metadata records. Unpacking `(0, 0)` therefore
/// yields zero rather than a division error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    numer: i64,
    denom: i64,
}

impl Rational {
    /// The canonical zero rational, `(0, 0)`
    pub const ZERO: Rational = Rational { numer: 0, denom: 0 };

    /// Creates a rational normalized to lowest terms, sign on the numerator.
    ///
    /// A zero numerator collapses to [`Rational::ZERO`]. A zero denominator
    /// with a nonzero numerator is kept with magnitude one (a signed
    /// infinity under [`to_f64`](Rational::to_f64)).
    pub fn new(numer: i64, denom: i64) -> Self {
        if numer == 0 {
            return Self::ZERO;
        }
        if denom == 0 {
            return Self {
                numer: numer.signum(),
                denom: 0,
            };
        }
        // reduce in the unsigned domain; magnitudes saturate at i64::MAX
        let g = gcd(numer.unsigned_abs(), denom.unsigned_abs());
        let n = (numer.unsigned_abs() / g).min(i64::MAX as u64) as i64;
        let d = (denom.unsigned_abs() / g).min(i64::MAX as u64) as i64;
        let sign = if (numer < 0) ^ (denom < 0) { -1 } else { 1 };
        Self {
            numer: sign * n,
            denom: d,
        }
    }

    /// The normalized numerator
    pub fn numer(&self) -> i64 {
        self.numer
    }

    /// The normalized denominator
    pub fn denom(&self) -> i64 {
        self.denom
    }

    /// True for the canonical zero value
    pub fn is_zero(&self) -> bool {
        self.numer == 0
    }

    /// Approximates the rational as a float; zero for `(0, 0)`, signed
    /// infinity for a nonzero numerator over a zero denominator
    pub fn to_f64(&self) -> f64 {
        if self.denom == 0 {
            match self.numer.signum() {
                0 => 0.0,
                1 => f64::INFINITY,
                _ => f64::NEG_INFINITY,
            }
        } else {
            self.numer as f64 / self.denom as f64
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// An order-preserving name→value map: the instance form of a structure.
///
/// Entries iterate, compare, and display in insertion order, which for
/// unpacked records is the schema's declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for constructing literals
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Inserts or replaces a member value; new names append at the end
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Looks up a member value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// True if the record has a member with this name
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the record has no members
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates members in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Iterates member names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rational_normalization() {
        let r = Rational::new(2, 4);
        assert_eq!((r.numer(), r.denom()), (1, 2));

        let r = Rational::new(-6, 9);
        assert_eq!((r.numer(), r.denom()), (-2, 3));

        let r = Rational::new(6, -9);
        assert_eq!((r.numer(), r.denom()), (-2, 3));
    }

    #[test]
    fn test_rational_zero_convention() {
        assert_eq!(Rational::new(0, 5), Rational::ZERO);
        assert_eq!(Rational::ZERO.to_f64(), 0.0);
        assert!(Rational::ZERO.is_zero());
    }

    #[test]
    fn test_rational_zero_denominator() {
        let r = Rational::new(5, 0);
        assert_eq!((r.numer(), r.denom()), (1, 0));
        assert_eq!(r.to_f64(), f64::INFINITY);
        assert_eq!(Rational::new(-5, 0).to_f64(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_record_order_preserved() {
        let r = Record::new().with("b", 2u64).with("a", 1u64);
        let names: Vec<_> = r.names().collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_record_set_replaces_in_place() {
        let mut r = Record::new().with("a", 1u64).with("b", 2u64);
        r.set("a", 9u64);
        assert_eq!(r.get("a"), Some(&Value::UInt(9)));
        let names: Vec<_> = r.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Bytes(vec![0xAB, 0x01]).to_string(), "x'ab01'");
        assert_eq!(Value::Flags(0b101).to_string(), "0b101");
        let r = Record::new().with("a", 1u64).with("b", 2u64);
        assert_eq!(Value::Record(r).to_string(), "{a: 1, b: 2}");
    }

    #[test]
    fn test_as_len() {
        assert_eq!(Value::UInt(7).as_len(), Some(7));
        assert_eq!(Value::Int(-1).as_len(), None);
        assert_eq!(Value::Float(1.0).as_len(), None);
    }
}
