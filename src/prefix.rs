//! Prefix registry: one-byte key prefix <-> category name.
//!
//! Порядок объявления = порядок выгрузки. Отображение инъективно в обе
//! стороны: два имени на один байт (или наоборот) делают маршрутизацию
//! неоднозначной, поэтому `PrefixRegistry::new` такое отвергает.

use anyhow::Result;
use base64::Engine;

use crate::error::ExportError;

/// One category of the remote key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub name: &'static str,
    pub prefix: u8,
}

impl Category {
    pub const fn new(name: &'static str, prefix: u8) -> Self {
        Self { name, prefix }
    }

    /// Prefix as the JSON-RPC service expects it: a one-character string.
    pub fn wire_prefix(&self) -> String {
        char::from(self.prefix).to_string()
    }

    /// Base64 of the prefix byte (как печатает `prefixes`).
    pub fn prefix_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode([self.prefix])
    }

    #[inline]
    pub fn owns(&self, key: &[u8]) -> bool {
        key.first() == Some(&self.prefix)
    }
}

/// Storage layout of the node: blocks, transactions, operations, accounts, pool, internal.
pub const DEFAULT_CATEGORIES: &[Category] = &[
    Category::new("block-hash", 0x00),
    Category::new("block-confirmed", 0x01),
    Category::new("block-height", 0x02),
    Category::new("block-transaction-hash", 0x10),
    Category::new("block-transaction-source", 0x11),
    Category::new("block-transaction-confirmed", 0x12),
    Category::new("block-transaction-account", 0x13),
    Category::new("block-transaction-block", 0x14),
    Category::new("block-operation-hash", 0x20),
    Category::new("block-operation-txhash", 0x21),
    Category::new("block-operation-source", 0x22),
    Category::new("block-operation-target", 0x23),
    Category::new("block-operation-peers", 0x24),
    Category::new("block-operation-typesource", 0x25),
    Category::new("block-operation-typetarget", 0x26),
    Category::new("block-operation-typepeers", 0x27),
    Category::new("block-operation-createfrozen", 0x28),
    Category::new("block-operation-frozenlinked", 0x29),
    Category::new("block-operation-blockheight", 0x2a),
    Category::new("block-account-address", 0x30),
    Category::new("block-account-created", 0x31),
    Category::new("block-account-sequenceid", 0x32),
    Category::new("block-account-sequenceidbyaddress", 0x33),
    Category::new("transaction-pool", 0x40),
    Category::new("internal", 0x50),
];

/// Immutable registry. Cheap to clone (256-slot index + the ordered list).
#[derive(Debug, Clone)]
pub struct PrefixRegistry {
    ordered: Vec<Category>,
    by_byte: [Option<u16>; 256],
}

impl PrefixRegistry {
    pub fn new(entries: &[Category]) -> Result<Self> {
        let mut by_byte: [Option<u16>; 256] = [None; 256];
        let mut ordered: Vec<Category> = Vec::with_capacity(entries.len());

        for (i, c) in entries.iter().enumerate() {
            if c.name.is_empty() {
                return Err(ExportError::config("empty category name in prefix registry").into());
            }
            if let Some(j) = by_byte[c.prefix as usize] {
                return Err(ExportError::config(format!(
                    "prefix 0x{:02x} registered twice: '{}' and '{}'",
                    c.prefix, ordered[j as usize].name, c.name
                ))
                .into());
            }
            if ordered.iter().any(|o| o.name == c.name) {
                return Err(ExportError::config(format!(
                    "category name '{}' registered twice",
                    c.name
                ))
                .into());
            }
            by_byte[c.prefix as usize] = Some(i as u16);
            ordered.push(*c);
        }

        Ok(Self { ordered, by_byte })
    }

    /// The node's storage layout.
    pub fn standard() -> Self {
        // DEFAULT_CATEGORIES проверяется тестом на инъективность
        Self::new(DEFAULT_CATEGORIES).unwrap_or_else(|e| panic!("default prefix table: {e}"))
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Categories in declaration (= export) order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.ordered.iter()
    }

    pub fn by_byte(&self, b: u8) -> Option<&Category> {
        self.by_byte[b as usize].map(|i| &self.ordered[i as usize])
    }

    pub fn by_name(&self, name: &str) -> Option<&Category> {
        self.ordered.iter().find(|c| c.name == name)
    }

    /// Category a key belongs to (by its first byte). `None` for empty or unregistered keys.
    pub fn route(&self, key: &[u8]) -> Option<&Category> {
        key.first().and_then(|b| self.by_byte(*b))
    }

    /// Resolve a `--prefix` list. Empty list or "all" selects everything.
    /// Result keeps registry order and has no duplicates.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Category>> {
        if names.is_empty() || names.iter().any(|n| n.as_ref() == "all") {
            for n in names {
                let n = n.as_ref();
                if n != "all" && self.by_name(n).is_none() {
                    return Err(ExportError::config(format!("unknown prefix found: {}", n)).into());
                }
            }
            return Ok(self.ordered.clone());
        }

        let mut wanted = [false; 256];
        for n in names {
            let n = n.as_ref();
            match self.by_name(n) {
                Some(c) => wanted[c.prefix as usize] = true,
                None => {
                    return Err(ExportError::config(format!("unknown prefix found: {}", n)).into())
                }
            }
        }
        Ok(self
            .ordered
            .iter()
            .filter(|c| wanted[c.prefix as usize])
            .copied()
            .collect())
    }
}

impl Default for PrefixRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
