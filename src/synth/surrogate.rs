use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// How surrogate identifiers are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurrogateMode {
    /// A fresh ULID per draw; differs between runs
    #[default]
    Random,
    /// `0001`, `0002`, ... reproducible across runs
    Sequential,
}

impl fmt::Display for SurrogateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurrogateMode::Random => f.write_str("random"),
            SurrogateMode::Sequential => f.write_str("sequential"),
        }
    }
}

impl FromStr for SurrogateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "ulid" => Ok(SurrogateMode::Random),
            "sequential" => Ok(SurrogateMode::Sequential),
            other => Err(format!("unknown surrogate mode '{other}'")),
        }
    }
}

/// Source of the per-operation identifiers that keep carrier shapes and request
/// variables from colliding inside one compilation.
#[derive(Debug, Clone)]
pub enum SurrogateSource {
    Random,
    Sequential { next: u64 },
}

impl SurrogateSource {
    #[must_use]
    pub fn new(mode: SurrogateMode) -> Self {
        match mode {
            SurrogateMode::Random => SurrogateSource::Random,
            SurrogateMode::Sequential => SurrogateSource::sequential(),
        }
    }

    #[must_use]
    pub fn sequential() -> Self {
        SurrogateSource::Sequential { next: 1 }
    }

    /// Draw the next identifier. Always a valid identifier suffix.
    pub fn next_id(&mut self) -> String {
        match self {
            SurrogateSource::Random => Ulid::new().to_string(),
            SurrogateSource::Sequential { next } => {
                let id = format!("{next:04}");
                *next += 1;
                id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_is_reproducible() {
        let mut a = SurrogateSource::sequential();
        let mut b = SurrogateSource::new(SurrogateMode::Sequential);
        assert_eq!(a.next_id(), "0001");
        assert_eq!(a.next_id(), "0002");
        assert_eq!(b.next_id(), "0001");
    }

    #[test]
    fn test_random_ids_are_distinct_identifiers() {
        let mut source = SurrogateSource::new(SurrogateMode::Random);
        let first = source.next_id();
        let second = source.next_id();
        assert_ne!(first, second);
        assert_eq!(first.len(), 26);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Sequential".parse::<SurrogateMode>(), Ok(SurrogateMode::Sequential));
        assert_eq!("ulid".parse::<SurrogateMode>(), Ok(SurrogateMode::Random));
        assert!("fixed".parse::<SurrogateMode>().is_err());
    }
}
