//! Per-attribute bidirectional mapping between raw values and dense codes.

use std::collections::HashMap;

/// Sentinel raw value for a missing field.
pub const MISSING: &str = "?";

/// The growable domain of one attribute.
///
/// Raw values are stored as strings; continuous attributes go through
/// [`Domain::code_of_number`] so that textually different spellings of the
/// same number (`3.5` vs `3.50`) share one code and the numeric value can
/// be recovered for threshold comparison.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Domain {
    values: Vec<String>,
    numeric: Vec<Option<f64>>,
    index: HashMap<String, usize>,
}

impl Domain {
    /// Create an empty domain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the code for `raw`, admitting it into the domain if unseen.
    ///
    /// Unknown values are always admitted; the domain grows by one.
    pub fn code_of(&mut self, raw: &str) -> usize {
        if let Some(&code) = self.index.get(raw) {
            return code;
        }
        let code = self.values.len();
        self.values.push(raw.to_string());
        self.numeric.push(None);
        self.index.insert(raw.to_string(), code);
        code
    }

    /// Return the code for the numeric value `value`, admitting it if unseen.
    pub fn code_of_number(&mut self, value: f64) -> usize {
        let raw = value.to_string();
        if let Some(&code) = self.index.get(&raw) {
            return code;
        }
        let code = self.values.len();
        self.values.push(raw.clone());
        self.numeric.push(Some(value));
        self.index.insert(raw, code);
        code
    }

    /// Look up a code without growing the domain.
    #[must_use]
    pub fn code_for(&self, raw: &str) -> Option<usize> {
        self.index.get(raw).copied()
    }

    /// Return the raw value for `code`.
    #[must_use]
    pub fn value_of(&self, code: usize) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }

    /// Return the numeric value for `code`, if the entry is numeric.
    #[must_use]
    pub fn number_of(&self, code: usize) -> Option<f64> {
        self.numeric.get(code).copied().flatten()
    }

    /// Return `true` if `raw` has been observed.
    #[must_use]
    pub fn contains(&self, raw: &str) -> bool {
        self.index.contains_key(raw)
    }

    /// Return the number of distinct codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return `true` if no value has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rewrite the entry at `code` to a new raw value in place.
    ///
    /// Points already encoded with `code` resolve to the new value from now
    /// on. The reverse mapping for the new value points at `code` afterwards,
    /// replacing any previous mapping for that value.
    pub(crate) fn rewrite(&mut self, code: usize, raw: String, numeric: Option<f64>) {
        self.index.remove(&self.values[code]);
        self.index.insert(raw.clone(), code);
        self.values[code] = raw;
        self.numeric[code] = numeric;
    }
}

/// One [`Domain`] per attribute, indexed by attribute position.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DomainTable {
    domains: Vec<Domain>,
}

impl DomainTable {
    /// Create a table of `n` empty domains.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            domains: (0..n).map(|_| Domain::new()).collect(),
        }
    }

    /// Return the domain of `attribute`.
    #[must_use]
    pub fn domain(&self, attribute: usize) -> &Domain {
        &self.domains[attribute]
    }

    /// Return the domain of `attribute` mutably.
    pub fn domain_mut(&mut self, attribute: usize) -> &mut Domain {
        &mut self.domains[attribute]
    }

    /// Return the number of attribute domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Return `true` if the table holds no domains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
