//! Integer distributions used to parameterise tasks.
//!
//! A distribution is shared between every copy of a tree, so implementations
//! take `&self` and must be safe to call from any copy. Negative draws are
//! reserved to mean "unbounded" wherever a distribution sets a repeat count.

use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ArborError, Result};

/// A source of integers, drawn once per call.
pub trait IntegerDistribution: Send + Sync + fmt::Debug {
    /// Draw the next value.
    fn next_int(&self) -> i32;
}

/// Always returns the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantIntegerDistribution {
    value: i32,
}

impl ConstantIntegerDistribution {
    /// Constant −1, the conventional "forever".
    pub const NEGATIVE_ONE: Self = Self::new(-1);
    /// Constant 0.
    pub const ZERO: Self = Self::new(0);
    /// Constant 1.
    pub const ONE: Self = Self::new(1);

    /// Create a constant distribution.
    pub const fn new(value: i32) -> Self {
        Self { value }
    }

    /// The constant value.
    pub fn value(&self) -> i32 {
        self.value
    }
}

impl IntegerDistribution for ConstantIntegerDistribution {
    fn next_int(&self) -> i32 {
        self.value
    }
}

/// Uniform over the inclusive range `low..=high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformIntegerDistribution {
    low: i32,
    high: i32,
}

impl UniformIntegerDistribution {
    /// Create a uniform distribution over `low..=high`.
    pub fn new(low: i32, high: i32) -> Result<Self> {
        if low > high {
            return Err(ArborError::configuration(format!(
                "uniform distribution needs low <= high, got {}..={}",
                low, high
            )));
        }
        Ok(Self { low, high })
    }

    /// Lower bound (inclusive).
    pub fn low(&self) -> i32 {
        self.low
    }

    /// Upper bound (inclusive).
    pub fn high(&self) -> i32 {
        self.high
    }
}

impl IntegerDistribution for UniformIntegerDistribution {
    fn next_int(&self) -> i32 {
        rand::thread_rng().gen_range(self.low..=self.high)
    }
}

/// Triangular over `low..=high` peaking at `mode`, rounded to the nearest
/// integer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangularIntegerDistribution {
    low: i32,
    high: i32,
    mode: f64,
}

impl TriangularIntegerDistribution {
    /// Create a triangular distribution.
    pub fn new(low: i32, high: i32, mode: f64) -> Result<Self> {
        if low > high {
            return Err(ArborError::configuration(format!(
                "triangular distribution needs low <= high, got {}..={}",
                low, high
            )));
        }
        if !mode.is_finite() || mode < f64::from(low) || mode > f64::from(high) {
            return Err(ArborError::configuration(format!(
                "triangular mode {} outside {}..={}",
                mode, low, high
            )));
        }
        Ok(Self { low, high, mode })
    }

    /// Create a symmetric triangular distribution (mode at the midpoint).
    pub fn symmetric(low: i32, high: i32) -> Result<Self> {
        Self::new(low, high, (f64::from(low) + f64::from(high)) / 2.0)
    }

    /// Sample for a uniform `u` in `[0, 1)` via the inverse CDF.
    fn sample(&self, u: f64) -> i32 {
        let (a, b, c) = (f64::from(self.low), f64::from(self.high), self.mode);
        if b <= a {
            return self.low;
        }
        let split = (c - a) / (b - a);
        let x = if u < split {
            a + (u * (b - a) * (c - a)).sqrt()
        } else {
            b - ((1.0 - u) * (b - a) * (b - c)).sqrt()
        };
        (x.round() as i32).clamp(self.low, self.high)
    }
}

impl IntegerDistribution for TriangularIntegerDistribution {
    fn next_int(&self) -> i32 {
        let u: f64 = rand::thread_rng().gen();
        self.sample(u)
    }
}

/// Textual notation for a distribution, as used in config files and the CLI.
///
/// Accepted forms:
/// - `N` or `constant,N`
/// - `uniform,HIGH` (from 0) or `uniform,LOW,HIGH`
/// - `triangular,LOW,HIGH` or `triangular,LOW,HIGH,MODE`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistributionSpec {
    /// A constant value.
    Constant(i32),
    /// Uniform over `low..=high`.
    Uniform { low: i32, high: i32 },
    /// Triangular over `low..=high` peaking at `mode`.
    Triangular { low: i32, high: i32, mode: f64 },
}

impl DistributionSpec {
    /// Build the distribution this notation describes.
    pub fn build(&self) -> Result<Arc<dyn IntegerDistribution>> {
        Ok(match *self {
            DistributionSpec::Constant(value) => Arc::new(ConstantIntegerDistribution::new(value)),
            DistributionSpec::Uniform { low, high } => {
                Arc::new(UniformIntegerDistribution::new(low, high)?)
            }
            DistributionSpec::Triangular { low, high, mode } => {
                Arc::new(TriangularIntegerDistribution::new(low, high, mode)?)
            }
        })
    }

    /// Check if a notation string parses.
    pub fn is_valid(value: &str) -> bool {
        value.parse::<DistributionSpec>().is_ok()
    }
}

fn parse_int(token: &str, input: &str) -> Result<i32> {
    token.parse::<i32>().map_err(|_| {
        ArborError::configuration(format!(
            "invalid integer '{}' in distribution '{}'",
            token, input
        ))
    })
}

impl FromStr for DistributionSpec {
    type Err = ArborError;

    fn from_str(input: &str) -> Result<Self> {
        let tokens: Vec<&str> = input.split(',').map(str::trim).collect();
        let spec = match tokens.as_slice() {
            [value] => DistributionSpec::Constant(parse_int(value, input)?),
            ["constant", value] => DistributionSpec::Constant(parse_int(value, input)?),
            ["uniform", high] => DistributionSpec::Uniform {
                low: 0,
                high: parse_int(high, input)?,
            },
            ["uniform", low, high] => DistributionSpec::Uniform {
                low: parse_int(low, input)?,
                high: parse_int(high, input)?,
            },
            ["triangular", low, high] => {
                let (low, high) = (parse_int(low, input)?, parse_int(high, input)?);
                DistributionSpec::Triangular {
                    low,
                    high,
                    mode: (f64::from(low) + f64::from(high)) / 2.0,
                }
            }
            ["triangular", low, high, mode] => DistributionSpec::Triangular {
                low: parse_int(low, input)?,
                high: parse_int(high, input)?,
                mode: mode.parse::<f64>().map_err(|_| {
                    ArborError::configuration(format!(
                        "invalid mode '{}' in distribution '{}'",
                        mode, input
                    ))
                })?,
            },
            _ => {
                return Err(ArborError::configuration(format!(
                    "unrecognised distribution '{}'",
                    input
                )))
            }
        };

        // Reject bounds the builders would reject, so anything that parses also builds.
        spec.build()?;
        Ok(spec)
    }
}

impl fmt::Display for DistributionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionSpec::Constant(value) => write!(f, "constant,{}", value),
            DistributionSpec::Uniform { low, high } => write!(f, "uniform,{},{}", low, high),
            DistributionSpec::Triangular { low, high, mode } => {
                write!(f, "triangular,{},{},{}", low, high, mode)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_draws_same_value() {
        let dist = ConstantIntegerDistribution::new(3);
        assert_eq!(dist.next_int(), 3);
        assert_eq!(dist.next_int(), 3);
        assert_eq!(ConstantIntegerDistribution::NEGATIVE_ONE.next_int(), -1);
        assert_eq!(ConstantIntegerDistribution::ZERO.value(), 0);
    }

    #[test]
    fn test_uniform_rejects_inverted_bounds() {
        assert!(UniformIntegerDistribution::new(5, 1).is_err());
    }

    #[test]
    fn test_uniform_stays_in_bounds() {
        let dist = UniformIntegerDistribution::new(2, 4).unwrap();
        for _ in 0..200 {
            let value = dist.next_int();
            assert!((2..=4).contains(&value));
        }
    }

    #[test]
    fn test_triangular_sample_edges() {
        let dist = TriangularIntegerDistribution::new(0, 10, 5.0).unwrap();
        assert_eq!(dist.sample(0.0), 0);
        assert_eq!(dist.sample(0.5), 5);
        assert_eq!(dist.sample(0.999_999), 10);
    }

    #[test]
    fn test_triangular_degenerate_range() {
        let dist = TriangularIntegerDistribution::symmetric(7, 7).unwrap();
        assert_eq!(dist.next_int(), 7);
    }

    #[test]
    fn test_triangular_rejects_mode_outside_range() {
        assert!(TriangularIntegerDistribution::new(0, 4, 9.0).is_err());
        assert!(TriangularIntegerDistribution::new(0, 4, f64::NAN).is_err());
    }

    #[test]
    fn test_parse_constant_forms() {
        assert_eq!(
            "3".parse::<DistributionSpec>().unwrap(),
            DistributionSpec::Constant(3)
        );
        assert_eq!(
            "constant, -1".parse::<DistributionSpec>().unwrap(),
            DistributionSpec::Constant(-1)
        );
    }

    #[test]
    fn test_parse_uniform_forms() {
        assert_eq!(
            "uniform,5".parse::<DistributionSpec>().unwrap(),
            DistributionSpec::Uniform { low: 0, high: 5 }
        );
        assert_eq!(
            "uniform,2,6".parse::<DistributionSpec>().unwrap(),
            DistributionSpec::Uniform { low: 2, high: 6 }
        );
    }

    #[test]
    fn test_parse_triangular_forms() {
        assert_eq!(
            "triangular,0,4".parse::<DistributionSpec>().unwrap(),
            DistributionSpec::Triangular {
                low: 0,
                high: 4,
                mode: 2.0
            }
        );
        assert_eq!(
            "triangular,0,4,1.5".parse::<DistributionSpec>().unwrap(),
            DistributionSpec::Triangular {
                low: 0,
                high: 4,
                mode: 1.5
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<DistributionSpec>().is_err());
        assert!("gaussian,1,2".parse::<DistributionSpec>().is_err());
        assert!("constant,x".parse::<DistributionSpec>().is_err());
        assert!("uniform,9,1".parse::<DistributionSpec>().is_err());
        assert!(!DistributionSpec::is_valid("uniform"));
        assert!(DistributionSpec::is_valid("constant,-1"));
    }

    #[test]
    fn test_display_parses_back() {
        for text in ["constant,-1", "uniform,1,3", "triangular,0,10,2.5"] {
            let spec: DistributionSpec = text.parse().unwrap();
            assert_eq!(spec.to_string(), text);
        }
    }

    #[test]
    fn test_build_constant() {
        let dist = DistributionSpec::Constant(4).build().unwrap();
        assert_eq!(dist.next_int(), 4);
    }
}
