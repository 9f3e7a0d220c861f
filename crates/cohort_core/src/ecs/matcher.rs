//! # Matchers
//!
//! Immutable predicates over the set of occupied slot indices, used as the
//! group registry key.

use std::fmt;

/// A predicate of the form "has all of A, at least one of B, none of C".
///
/// Slot lists are kept sorted and de-duplicated, so two matchers built
/// from the same sets in any order compare and hash equal.
///
/// # Example
///
/// ```rust,ignore
/// let movers = Matcher::all_of([POSITION, VELOCITY]).none_of([FROZEN]);
/// let group = ctx.get_group(movers);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Matcher {
    all_of: Vec<usize>,
    any_of: Vec<usize>,
    none_of: Vec<usize>,
    indices: Vec<usize>,
}

fn normalize(slots: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut slots: Vec<usize> = slots.into_iter().collect();
    slots.sort_unstable();
    slots.dedup();
    slots
}

impl Matcher {
    // Not public: a matcher always starts from all-of or any-of.
    fn empty() -> Self {
        Self {
            all_of: Vec::new(),
            any_of: Vec::new(),
            none_of: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Matches entities that have every listed slot.
    #[must_use]
    pub fn all_of(slots: impl IntoIterator<Item = usize>) -> Self {
        Self::empty().with_all_of(slots)
    }

    /// Matches entities that have at least one listed slot.
    #[must_use]
    pub fn any_of(slots: impl IntoIterator<Item = usize>) -> Self {
        Self::empty().with_any_of(slots)
    }

    /// Adds an all-of clause.
    #[must_use]
    pub fn with_all_of(mut self, slots: impl IntoIterator<Item = usize>) -> Self {
        self.all_of = normalize(self.all_of.into_iter().chain(slots));
        self.refresh_indices();
        self
    }

    /// Adds an any-of clause.
    #[must_use]
    pub fn with_any_of(mut self, slots: impl IntoIterator<Item = usize>) -> Self {
        self.any_of = normalize(self.any_of.into_iter().chain(slots));
        self.refresh_indices();
        self
    }

    /// Adds a none-of clause.
    #[must_use]
    pub fn none_of(mut self, slots: impl IntoIterator<Item = usize>) -> Self {
        self.none_of = normalize(self.none_of.into_iter().chain(slots));
        self.refresh_indices();
        self
    }

    fn refresh_indices(&mut self) {
        self.indices = normalize(
            self.all_of
                .iter()
                .chain(&self.any_of)
                .chain(&self.none_of)
                .copied(),
        );
    }

    /// Sorted union of every slot the predicate references.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The all-of slots.
    #[must_use]
    pub fn all_of_indices(&self) -> &[usize] {
        &self.all_of
    }

    /// The any-of slots.
    #[must_use]
    pub fn any_of_indices(&self) -> &[usize] {
        &self.any_of
    }

    /// The none-of slots.
    #[must_use]
    pub fn none_of_indices(&self) -> &[usize] {
        &self.none_of
    }

    /// Evaluates the predicate against a slot-occupancy test.
    pub fn matches_with(&self, has: impl Fn(usize) -> bool) -> bool {
        self.all_of.iter().all(|&slot| has(slot))
            && (self.any_of.is_empty() || self.any_of.iter().any(|&slot| has(slot)))
            && !self.none_of.iter().any(|&slot| has(slot))
    }

    /// Evaluates the predicate against a set of occupied slots.
    #[must_use]
    pub fn matches(&self, occupied: &[usize]) -> bool {
        self.matches_with(|slot| occupied.contains(&slot))
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Matcher(")?;
        let mut first = true;
        for (label, slots) in [
            ("allOf", &self.all_of),
            ("anyOf", &self.any_of),
            ("noneOf", &self.none_of),
        ] {
            if slots.is_empty() {
                continue;
            }
            if !first {
                f.write_str(".")?;
            }
            first = false;
            write!(f, "{label}{slots:?}")?;
        }
        f.write_str(")")
    }
}
