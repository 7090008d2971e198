use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// Two numbers closer than this are equal in scripts, so `0.1 + 0.2 == 0.3` holds.
const TOLERANCE: f64 = 1e-9;

/// Largest magnitude printed without a fractional part.
const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

/// Beyond this many decimals `f64` has nothing left to round.
const MAX_PLACES: i64 = 15;

/// A script number. Every numeric literal, variable and arithmetic result is one of these.
#[derive(Debug, Clone, Copy, Default)]
pub struct Number(f64);

impl Number {
    pub fn new(value: f64) -> Self {
        Number(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Truncates toward zero.
    pub fn to_int(self) -> i64 {
        self.0 as i64
    }

    pub fn is_int(&self) -> bool {
        self.0.is_finite() && self.0.fract() == 0.0
    }

    /// The number as a container position, if it is a non-negative whole number.
    pub fn to_index(self) -> Option<usize> {
        (self.is_int() && self.0 >= 0.0).then_some(self.0 as usize)
    }

    pub fn abs(&self) -> Self {
        Number(self.0.abs())
    }

    /// Divisors this close to zero fail with a division error.
    pub fn is_zero(&self) -> bool {
        self.0.abs() < f64::EPSILON
    }

    pub fn pow(self, exponent: Self) -> Self {
        Number(self.0.powf(exponent.0))
    }

    pub fn floor(self) -> Self {
        Number(self.0.floor())
    }

    pub fn ceil(self) -> Self {
        Number(self.0.ceil())
    }

    /// Rounds half away from zero to `places` decimals, clamped to `0..=MAX_PLACES`.
    pub fn round_to(self, places: i64) -> Self {
        let factor = 10f64.powi(places.clamp(0, MAX_PLACES) as i32);
        Number((self.0 * factor).round() / factor)
    }

    pub fn sqrt(self) -> Self {
        Number(self.0.sqrt())
    }

    /// Ordering used by script comparison operators: numbers within the equality
    /// tolerance are `Equal`. Not transitive, so never hand it to a sort.
    pub fn tolerant_cmp(&self, other: &Self) -> Ordering {
        if self == other {
            Ordering::Equal
        } else {
            self.0.total_cmp(&other.0)
        }
    }

    /// A total order over every value, as `f64::total_cmp` defines it. Sorting uses this.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

macro_rules! impl_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Number {
            fn from(value: $ty) -> Self {
                Number(value as f64)
            }
        })*
    };
}

impl_from!(i32, i64, u32, usize, f64);

macro_rules! impl_op {
    ($($trait:ident::$method:ident => $op:tt),*) => {
        $(impl $trait for Number {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self {
                Number(self.0 $op rhs.0)
            }
        })*
    };
}

impl_op!(Add::add => +, Sub::sub => -, Mul::mul => *, Div::div => /, Rem::rem => %);

impl Neg for Number {
    type Output = Self;

    fn neg(self) -> Self {
        Number(-self.0)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_int() && self.0.abs() <= MAX_EXACT {
            return write!(f, "{}", self.0 as i64);
        }

        let fixed = format!("{:.6}", self.0);
        f.write_str(fixed.trim_end_matches('0').trim_end_matches('.'))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 || (self.0 - other.0).abs() < TOLERANCE
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.tolerant_cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::whole(42.0, "42")]
    #[case::decimals(42.125, "42.125")]
    #[case::trailing_zero(42.100, "42.1")]
    #[case::negative(-7.0, "-7")]
    #[case::zero(0.0, "0")]
    #[case::six_places(10.0 / 3.0, "3.333333")]
    #[case::huge(1e20, "100000000000000000000")]
    fn test_display(#[case] input: f64, #[case] expected: &str) {
        assert_eq!(Number::new(input).to_string(), expected);
    }

    #[rstest]
    #[case::add(Number::from(5i64) + Number::from(2i64), 7.0)]
    #[case::sub(Number::from(5i64) - Number::from(7i64), -2.0)]
    #[case::mul(Number::from(-5i64) * Number::from(2i64), -10.0)]
    #[case::div(Number::from(5i64) / Number::from(2i64), 2.5)]
    #[case::rem(Number::from(-5i64) % Number::from(2i64), -1.0)]
    #[case::pow(Number::from(2i64).pow(Number::from(10i64)), 1024.0)]
    fn test_arithmetic(#[case] actual: Number, #[case] expected: f64) {
        assert_eq!(actual, Number::new(expected));
    }

    #[test]
    fn test_tolerant_equality() {
        assert_eq!(Number::new(0.1) + Number::new(0.2), Number::new(0.3));
        assert_eq!((Number::new(0.1) + Number::new(0.2)).tolerant_cmp(&Number::new(0.3)), Ordering::Equal);
        assert!(Number::new(0.3) < Number::new(0.31));
    }

    #[test]
    fn test_total_cmp_is_transitive() {
        let (a, b, c) = (Number::new(0.0), Number::new(6e-10), Number::new(1.2e-9));

        assert_eq!(a.tolerant_cmp(&b), Ordering::Equal);
        assert_eq!(b.tolerant_cmp(&c), Ordering::Equal);
        assert_eq!(a.total_cmp(&b), Ordering::Less);
        assert_eq!(b.total_cmp(&c), Ordering::Less);
        assert_eq!(a.total_cmp(&c), Ordering::Less);
        assert_eq!(Number::new(f64::NAN).total_cmp(&Number::new(f64::MAX)), Ordering::Greater);
    }

    #[rstest]
    #[case(2.0, Some(2))]
    #[case(0.0, Some(0))]
    #[case(-1.0, None)]
    #[case(1.5, None)]
    #[case(f64::INFINITY, None)]
    fn test_to_index(#[case] input: f64, #[case] expected: Option<usize>) {
        assert_eq!(Number::new(input).to_index(), expected);
    }

    #[rstest]
    #[case(2.345, 2, 2.35)]
    #[case(2.5, 0, 3.0)]
    #[case(-2.5, 0, -3.0)]
    #[case::negative_places(2.5, -3, 3.0)]
    #[case::huge_places(2.345, 400, 2.345)]
    #[case::out_of_i32_range(1.5, i64::MAX, 1.5)]
    fn test_round_to(#[case] input: f64, #[case] places: i64, #[case] expected: f64) {
        let rounded = Number::new(input).round_to(places);
        assert!(!rounded.value().is_nan());
        assert_eq!(rounded, Number::new(expected));
    }
}
