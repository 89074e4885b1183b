//! Event-name interning.

use std::collections::HashMap;

use crate::error::{ConfigError, KernelResult};

/// Dense integer id of an interned event name. `0` is never handed out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NameId(u32);

impl NameId {
    #[inline]
    pub fn new(id: u32) -> Self {
        NameId(id)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name → id table with ids `1..capacity`.
#[derive(Debug, Clone)]
pub struct NameTable {
    ids: HashMap<String, NameId>,
    /// `names[i - 1]` is the name of id `i`.
    names: Vec<String>,
    capacity: usize,
}

impl NameTable {
    pub fn with_capacity(capacity: usize) -> Self {
        NameTable {
            ids: HashMap::new(),
            names: Vec::new(),
            capacity,
        }
    }

    /// Id of `name`, allocating the next one if it is new.
    pub fn intern(&mut self, name: &str) -> KernelResult<NameId> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let next = self.names.len() + 1;
        if next >= self.capacity {
            return Err(ConfigError::CapacityExceeded {
                name: name.to_string(),
                capacity: self.capacity,
            }
            .into());
        }
        let id = NameId(next as u32);
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<NameId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: NameId) -> Option<&str> {
        id.index()
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `(id, name)` in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NameId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (NameId(i as u32 + 1), n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;

    #[test]
    fn test_intern_is_dense_and_stable() {
        let mut t = NameTable::with_capacity(8);
        let a = t.intern("a").unwrap();
        let b = t.intern("b").unwrap();
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
        assert_eq!(t.intern("a").unwrap(), a);
        assert_eq!(t.name(b), Some("b"));
        assert_eq!(t.name(NameId::new(0)), None);
        assert_eq!(t.lookup("zzz"), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_capacity_exhausted() {
        let mut t = NameTable::with_capacity(3);
        t.intern("a").unwrap();
        t.intern("b").unwrap();
        assert!(matches!(
            t.intern("c"),
            Err(KernelError::Config(ConfigError::CapacityExceeded { .. }))
        ));
        assert!(t.intern("a").is_ok());
    }
}
