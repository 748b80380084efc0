//! Versioned code tables.
//!
//! A `CodeTable` maps values to dense codes `0..k`; its `InverseCodeTable`
//! is the array form indexed by code and is what the decode path reads.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CompressionError;

/// Table version in `0..=127`, or the `DISABLED` sentinel meaning "this
/// field was sent uncompressed".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableVersion(u8);

impl TableVersion {
    pub const MAX: u8 = 127;
    pub const INITIAL: Self = Self(0);
    pub const DISABLED: Self = Self(u8::MAX);

    /// `None` for values outside `0..=127`; use `DISABLED` for the sentinel.
    pub const fn new(version: u8) -> Option<Self> {
        if version <= Self::MAX {
            Some(Self(version))
        } else {
            None
        }
    }

    /// Raw header byte as received. Out-of-range bytes simply never match a
    /// live table.
    pub const fn from_wire(byte: u8) -> Self {
        Self(byte)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_disabled(self) -> bool {
        self.0 == Self::DISABLED.0
    }

    /// Successor with wraparound 127 -> 0.
    pub const fn next(self) -> Self {
        if self.0 >= Self::MAX {
            Self(0)
        } else {
            Self(self.0 + 1)
        }
    }
}

impl fmt::Display for TableVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disabled() {
            f.write_str("disabled")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Immutable value -> code mapping granted by one node to one origin.
#[derive(Clone, Debug)]
pub struct CodeTable<T> {
    origin_id: u64,
    version: TableVersion,
    dictionary: HashMap<T, u32>,
}

impl<T: Hash + Eq> CodeTable<T> {
    /// Wraps an existing mapping as is. Density is checked by `invert`.
    pub fn new(origin_id: u64, version: TableVersion, dictionary: HashMap<T, u32>) -> Self {
        Self {
            origin_id,
            version,
            dictionary,
        }
    }

    pub fn empty(origin_id: u64, version: TableVersion) -> Self {
        Self::new(origin_id, version, HashMap::new())
    }

    /// Assigns codes `0, 1, 2, ...` in iteration order. Repeated values keep
    /// their first code.
    pub fn from_values(
        origin_id: u64,
        version: TableVersion,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        let mut dictionary = HashMap::new();
        for value in values {
            let next = dictionary.len() as u32;
            dictionary.entry(value).or_insert(next);
        }
        Self::new(origin_id, version, dictionary)
    }

    pub fn get(&self, value: &T) -> Option<u32> {
        self.dictionary.get(value).copied()
    }
}

impl<T> CodeTable<T> {
    pub fn origin_id(&self) -> u64 {
        self.origin_id
    }

    pub fn version(&self) -> TableVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.dictionary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionary.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, u32)> + '_ {
        self.dictionary.iter().map(|(v, &c)| (v, c))
    }

    fn non_dense(&self, detail: String) -> CompressionError {
        CompressionError::NonDenseTable {
            origin_id: self.origin_id,
            version: self.version,
            detail,
        }
    }
}

impl<T: Hash + Eq + Clone> CodeTable<T> {
    /// Builds the array form.
    ///
    /// Fails with `NonDenseTable` unless the codes are exactly `0..len`.
    pub fn invert(&self) -> Result<InverseCodeTable<T>, CompressionError> {
        if self.dictionary.is_empty() {
            return Ok(InverseCodeTable::empty(self.origin_id, self.version));
        }

        let n = self.dictionary.len() as u64;
        let min = self.dictionary.values().copied().min().unwrap_or(0);
        if min != 0 {
            return Err(self.non_dense(format!("lowest code is {min}, expected 0")));
        }
        // Gapless codes 0..n-1 sum to n(n-1)/2, i.e. sum + n == n(n+1)/2.
        let sum: u64 = self.dictionary.values().map(|&c| c as u64).sum();
        if sum + n != n * (n + 1) / 2 {
            return Err(self.non_dense(format!("codes sum to {sum} for {n} entries")));
        }

        let mut slots: Vec<Option<T>> = vec![None; n as usize];
        for (value, &code) in &self.dictionary {
            let Some(slot) = slots.get_mut(code as usize) else {
                return Err(self.non_dense(format!("code {code} out of range")));
            };
            if slot.is_some() {
                return Err(self.non_dense(format!("code {code} assigned twice")));
            }
            *slot = Some(value.clone());
        }

        Ok(InverseCodeTable {
            origin_id: self.origin_id,
            version: self.version,
            values: slots.into_iter().flatten().collect(),
        })
    }
}

impl<T: Hash + Eq> PartialEq for CodeTable<T> {
    fn eq(&self, other: &Self) -> bool {
        self.origin_id == other.origin_id
            && self.version == other.version
            && self.dictionary == other.dictionary
    }
}

impl<T: Hash + Eq> Eq for CodeTable<T> {}

/// Code -> value array. Index with the code from the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InverseCodeTable<T> {
    origin_id: u64,
    version: TableVersion,
    values: Vec<T>,
}

impl<T> InverseCodeTable<T> {
    pub fn new(origin_id: u64, version: TableVersion, values: Vec<T>) -> Self {
        Self {
            origin_id,
            version,
            values,
        }
    }

    pub fn empty(origin_id: u64, version: TableVersion) -> Self {
        Self::new(origin_id, version, Vec::new())
    }

    pub fn disabled(origin_id: u64) -> Self {
        Self::empty(origin_id, TableVersion::DISABLED)
    }

    pub fn origin_id(&self) -> u64 {
        self.origin_id
    }

    pub fn version(&self) -> TableVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, code: u32) -> Option<&T> {
        self.values.get(code as usize)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }
}

impl<T: Hash + Eq + Clone> InverseCodeTable<T> {
    /// Back to the map form. Codes are the array positions, so the result is
    /// dense by construction.
    pub fn invert(&self) -> CodeTable<T> {
        CodeTable::from_values(self.origin_id, self.version, self.values.iter().cloned())
    }
}

impl<T: Hash + Eq> TryFrom<InverseCodeTable<T>> for CodeTable<T> {
    type Error = CompressionError;

    /// Rejects arrays that repeat a value, since such a table is not a bijection.
    fn try_from(inverse: InverseCodeTable<T>) -> Result<Self, Self::Error> {
        let InverseCodeTable {
            origin_id,
            version,
            values,
        } = inverse;
        let len = values.len();
        let mut dictionary = HashMap::with_capacity(len);
        for (code, value) in values.into_iter().enumerate() {
            if dictionary.insert(value, code as u32).is_some() {
                return Err(CompressionError::NonDenseTable {
                    origin_id,
                    version,
                    detail: format!("duplicate value at code {code}"),
                });
            }
        }
        Ok(Self::new(origin_id, version, dictionary))
    }
}

// On the wire a table travels in its array form, so a gapped table cannot be
// serialized and a duplicated one cannot be deserialized.
impl<T: Serialize + Hash + Eq + Clone> Serialize for CodeTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.invert()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de> + Hash + Eq> Deserialize<'de> for CodeTable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let inverse = InverseCodeTable::<T>::deserialize(deserializer)?;
        CodeTable::try_from(inverse).map_err(serde::de::Error::custom)
    }
}
