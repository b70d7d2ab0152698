//! Display name allocation
//!
//! Hands out base names first-in first-out. Once the pool is empty, names
//! take the form `base-N`: the lowest `N` wins, then the earliest position in
//! the base list. Only unsuffixed names are ever returned to the pool.

use std::collections::{HashSet, VecDeque};

use crate::error::{AppError, Result};

/// Separator between a base name and its numeric suffix
pub const SUFFIX_SEPARATOR: char = '-';

/// Default base names, in allocation order
pub const DEFAULT_BASE_NAMES: [&str; 9] = [
    "Luffy", "Zoro", "Nami", "Usopp", "Sanji", "Chopper", "Robin", "Franky", "Brook",
];

/// Default upper bound for the numeric suffix
pub const DEFAULT_MAX_SUFFIX: u32 = 10_000;

/// Username allocator
#[derive(Debug, Clone)]
pub struct UsernameAllocator {
    /// Fixed base list in its original order
    base_names: Vec<String>,
    /// Unused base names, in release order
    available: VecDeque<String>,
    /// Highest suffix tried before giving up
    max_suffix: u32,
}

impl UsernameAllocator {
    /// Create an allocator over the given base names
    ///
    /// Rejects an empty list, duplicates, and names containing the suffix
    /// separator (those could never be recycled).
    pub fn new<I, S>(base_names: I, max_suffix: u32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base_names: Vec<String> = base_names.into_iter().map(Into::into).collect();

        if base_names.is_empty() {
            return Err(AppError::InvalidConfig("base name list is empty".into()));
        }

        let mut seen = HashSet::with_capacity(base_names.len());
        for name in &base_names {
            if name.is_empty() || name.contains(SUFFIX_SEPARATOR) {
                return Err(AppError::InvalidConfig(format!(
                    "base name '{}' must be non-empty and must not contain '{}'",
                    name, SUFFIX_SEPARATOR
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(AppError::InvalidConfig(format!(
                    "duplicate base name '{}'",
                    name
                )));
            }
        }

        Ok(Self {
            available: base_names.iter().cloned().collect(),
            base_names,
            max_suffix,
        })
    }

    /// Pick a name not present in `assigned`
    ///
    /// `assigned` holds the names of the currently active sessions.
    pub fn allocate(&mut self, assigned: &[String]) -> Result<String> {
        if let Some(name) = self.available.pop_front() {
            return Ok(name);
        }

        for suffix in 1..=self.max_suffix {
            for base in &self.base_names {
                let candidate = format!("{}{}{}", base, SUFFIX_SEPARATOR, suffix);
                // Linear scan; session counts are small.
                if !assigned.iter().any(|name| *name == candidate) {
                    return Ok(candidate);
                }
            }
        }

        Err(AppError::NamesExhausted {
            max_suffix: self.max_suffix,
        })
    }

    /// Give a name back
    ///
    /// Unsuffixed names go to the end of the pool; suffixed ones are retired.
    pub fn release(&mut self, name: &str) {
        if !name.contains(SUFFIX_SEPARATOR) {
            self.available.push_back(name.to_string());
        }
    }

    /// Number of base names currently free
    pub fn available_count(&self) -> usize {
        self.available.len()
    }
}

impl Default for UsernameAllocator {
    fn default() -> Self {
        Self {
            base_names: DEFAULT_BASE_NAMES.iter().map(|s| s.to_string()).collect(),
            available: DEFAULT_BASE_NAMES.iter().map(|s| s.to_string()).collect(),
            max_suffix: DEFAULT_MAX_SUFFIX,
        }
    }
}
