//! In-memory document store for use in testing other modules.
//!
//! Mimics the filesystem store's whole-document load and save, and counts saves so tests can
//! check that failed operations didn't write anything.

use super::element::Element;
use super::{DocumentStore, Result};

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    root: Element,
    saves: usize,
}

impl MemoryDocumentStore {
    pub fn new(root: Element) -> Self {
        Self { root, saves: 0 }
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(Self::new(Element::parse(xml)?))
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// How many times the document has been saved.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn load(&self) -> Result<Element> {
        Ok(self.root.clone())
    }

    fn save(&mut self, root: &Element) -> Result<()> {
        self.root = root.clone();
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ConfigPath;

    #[test]
    fn failed_transaction_is_not_saved() {
        let mut store = MemoryDocumentStore::from_xml("<a><b>1</b></a>").unwrap();
        let before = store.root().clone();

        let result: Result<()> = store.transaction(|root| {
            root.children.clear();
            ConfigPath::new("bad path").map(|_| ())
        });

        assert!(result.is_err());
        assert_eq!(store.root(), &before);
        assert_eq!(store.saves(), 0);
    }
}
