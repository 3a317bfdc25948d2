use std::collections::HashSet;
use std::fmt;

use crate::compiler::KEYWORDS;

/// Largest numeric suffix tried before giving up on a base name.
pub const DEFAULT_MAX_NAME_SUFFIX: u32 = 65_535;

/// Every suffixed variant of a base name up to the configured limit is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollisionExhaustion {
    pub base: String,
    pub max_suffix: u32,
}

impl fmt::Display for NameCollisionExhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no free name for '{}': variants up to '{}{}' are all taken",
            self.base, self.base, self.max_suffix
        )
    }
}

impl std::error::Error for NameCollisionExhaustion {}

/// Running set of names already assigned within one compilation.
///
/// The first request for a base name gets it unchanged; later requests get
/// `Name2`, `Name3`, ... The assignment history is the only state, so replaying
/// the same requests in the same order yields the same names.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    assigned: HashSet<String>,
    max_suffix: u32,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NameAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_suffix(DEFAULT_MAX_NAME_SUFFIX)
    }

    #[must_use]
    pub fn with_max_suffix(max_suffix: u32) -> Self {
        Self {
            assigned: HashSet::new(),
            max_suffix,
        }
    }

    /// Assign `base`, or its first free numeric variant.
    ///
    /// # Errors
    ///
    /// Returns [`NameCollisionExhaustion`] when `base` and every variant up to
    /// the maximum suffix are already assigned.
    pub fn allocate(&mut self, base: &str) -> Result<String, NameCollisionExhaustion> {
        if self.assigned.insert(base.to_string()) {
            return Ok(base.to_string());
        }
        for suffix in 2..=self.max_suffix {
            let candidate = format!("{base}{suffix}");
            if self.assigned.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }
        Err(NameCollisionExhaustion {
            base: base.to_string(),
            max_suffix: self.max_suffix,
        })
    }

    /// Mark `name` as taken. Returns `false` if it already was.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.assigned.insert(name.to_string())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.assigned.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// Turn arbitrary text into a valid source identifier.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, a leading digit gets a `_`
/// prefix, and reserved words get a `_` suffix.
#[must_use]
pub fn sanitize_ident(raw: &str) -> String {
    let mut ident: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_allocate_suffixes_collisions() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("Ping").unwrap(), "Ping");
        assert_eq!(names.allocate("Ping").unwrap(), "Ping2");
        assert_eq!(names.allocate("Ping").unwrap(), "Ping3");
        assert_eq!(names.allocate("Pong").unwrap(), "Pong");
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_allocate_skips_reserved_variants() {
        let mut names = NameAllocator::new();
        assert!(names.reserve("Ping"));
        assert!(names.reserve("Ping2"));
        assert!(!names.reserve("Ping2"));
        assert_eq!(names.allocate("Ping").unwrap(), "Ping3");
    }

    #[test]
    fn test_allocate_exhaustion() {
        let mut names = NameAllocator::with_max_suffix(3);
        names.allocate("Ping").unwrap();
        names.allocate("Ping").unwrap();
        names.allocate("Ping").unwrap();
        let err = names.allocate("Ping").unwrap_err();
        assert_eq!(err.max_suffix, 3);
        assert!(err.to_string().contains("Ping3"));
    }

    #[test]
    fn test_sanitize_ident() {
        assert_eq!(sanitize_ident("page-size"), "page_size");
        assert_eq!(sanitize_ident("2fa"), "_2fa");
        assert_eq!(sanitize_ident("return"), "return_");
        assert_eq!(sanitize_ident(""), "_");
        assert_eq!(sanitize_ident("userId"), "userId");
    }
}
