/*!
# Background

The appliance keeps its whole persistent system configuration in one XML document on disk.
This library reads and changes that document by path (like `system/user`) rather than through
a schema.

# Library

`DocumentStore` defines the two things a backing store has to do, loading and saving the whole
document, and builds the public operations on top of them: getting elements and values,
setting values, and appending, replacing and removing elements.  There are implementations for
a file on disk and for memory.

Every operation that changes something is one transaction: the document is loaded fresh,
changed, and written back whole.  If the change fails, nothing is written.  The filesystem
store writes a temporary file next to the document and renames it into place, so a failed
write never leaves half a document behind.

# Mapping view

The `record` module converts elements to a `Value`/`Record` mapping view and back.  Repeated
child tags fold into lists; empty elements are `Value::Absent` rather than empty strings.

# Current limitations

* The caller needs to make sure only one process writes the document at a time.
* Paths only descend by tag; choosing an element by the value of one of its fields is done with
  the keyed operations (`replace_element`, `remove_element`) or by the caller.
*/

pub mod element;
pub mod error;
pub mod filesystem;
pub mod memory;
pub mod path;
pub mod record;

pub use element::Element;
pub use error::{Error, Result};
pub use filesystem::FilesystemDocumentStore;
pub use memory::MemoryDocumentStore;
pub use path::{ConfigPath, PATH_SEPARATORS, PATH_SEPARATOR_STR};
pub use record::{Record, Value};

use log::{debug, trace};
use snafu::{ensure, OptionExt};

/// What `replace_element` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaced {
    /// A matching member was removed and the new record added at the end of its parent.
    Existing,
    /// Nothing matched, so the new record was appended.
    Inserted,
}

pub trait DocumentStore {
    /// Reads the whole document, returning its root element.
    fn load(&self) -> Result<Element>;
    /// Replaces the whole document with the given root element.
    fn save(&mut self, root: &Element) -> Result<()>;

    /// Loads the document, hands it to `change`, and saves it if `change` succeeded.  If
    /// `change` fails, the stored document is left alone.
    fn transaction<T, F>(&mut self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Element) -> Result<T>,
    {
        let mut root = self.load()?;
        let result = change(&mut root)?;
        self.save(&root)?;
        debug!("Saved configuration document");
        Ok(result)
    }

    /// Returns the mapping view of the element at the path: the value itself if one element
    /// matches, a `Value::List` if several do, and None if nothing does.
    fn get_element(&self, path: &ConfigPath) -> Result<Option<Value>> {
        let mut found = self.get_elements(path)?;
        Ok(match found.len() {
            0 => None,
            1 => found.pop(),
            _ => Some(Value::List(found)),
        })
    }

    /// Returns the mapping view of every element at the path, in document order.  Useful for
    /// collections, which read the same whether they have one member or many.
    fn get_elements(&self, path: &ConfigPath) -> Result<Vec<Value>> {
        let root = self.load()?;
        Ok(path
            .resolve(&root)
            .into_iter()
            .map(Value::from_element)
            .collect())
    }

    /// Returns the trimmed text of the first element at the path, or None if it's empty.
    /// Fails with `NotFound` if nothing is at the path.
    fn get_value(&self, path: &ConfigPath) -> Result<Option<String>> {
        let root = self.load()?;
        let node = path
            .resolve(&root)
            .into_iter()
            .next()
            .context(error::NotFoundSnafu { path: path.name() })?;
        Ok(node
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }

    /// Overwrites the text of the first element at the path.  Fails with `NotFound` rather than
    /// creating anything if the element doesn't exist; see `upsert_value` for that.
    fn set_value<S: AsRef<str>>(&mut self, path: &ConfigPath, value: S) -> Result<()> {
        self.transaction(|root| {
            let node = path
                .resolve_mut(root)
                .into_iter()
                .next()
                .context(error::NotFoundSnafu { path: path.name() })?;
            set_leaf_text(node, path, value.as_ref())
        })
    }

    /// Like `set_value`, but adds the element under its parent if it doesn't exist yet.  The
    /// parent has to exist and be unique.
    fn upsert_value<S: AsRef<str>>(&mut self, path: &ConfigPath, value: S) -> Result<()> {
        self.transaction(|root| {
            if let Some(node) = path.resolve_mut(root).into_iter().next() {
                return set_leaf_text(node, path, value.as_ref());
            }
            let (parent_path, tag) = path.split_parent()?;
            debug!("Creating missing element at '{}'", path);
            let parent = single_parent_mut(root, &parent_path)?;
            parent
                .children
                .push(Element::with_text(tag.as_str(), value.as_ref()));
            Ok(())
        })
    }

    /// Adds the record as the last child of the path's parent, using the path's last segment
    /// as its tag.  The parent must resolve to exactly one element.
    fn append_element(&mut self, path: &ConfigPath, record: &Record) -> Result<()> {
        let (parent_path, tag) = path.split_parent()?;
        self.transaction(|root| {
            let parent = single_parent_mut(root, &parent_path)?;
            trace!("Appending '{}' under '{}'", tag, parent_path);
            parent.children.push(record.to_element(&tag));
            Ok(())
        })
    }

    /// Finds the first member of the collection whose `key_field` equals `key_value`, removes
    /// it, and adds `record` at the end of the same parent; replaced members move to the end.
    /// If no member matches, this appends like `append_element`.
    fn replace_element(
        &mut self,
        path: &ConfigPath,
        key_field: &str,
        key_value: &str,
        record: &Record,
    ) -> Result<Replaced> {
        let (parent_path, tag) = path.split_parent()?;
        self.transaction(|root| {
            for parent in parent_path.resolve_mut(root) {
                let position = parent
                    .children
                    .iter()
                    .position(|c| c.tag == tag && c.field_text(key_field) == Some(key_value));
                if let Some(position) = position {
                    trace!("Replacing '{}' where {}={}", path, key_field, key_value);
                    parent.children.remove(position);
                    parent.children.push(record.to_element(&tag));
                    return Ok(Replaced::Existing);
                }
            }

            trace!("No '{}' where {}={}, appending", path, key_field, key_value);
            let parent = single_parent_mut(root, &parent_path)?;
            parent.children.push(record.to_element(&tag));
            Ok(Replaced::Inserted)
        })
    }

    /// Removes members of the collection: all of them if `key` is None, otherwise those whose
    /// field (the key's first part) equals the key's second part.  Returns how many were
    /// removed; removing nothing isn't an error.
    fn remove_element(&mut self, path: &ConfigPath, key: Option<(&str, &str)>) -> Result<usize> {
        let (parent_path, tag) = path.split_parent()?;
        self.transaction(|root| {
            let selected = |child: &Element| {
                child.tag == tag
                    && key.map_or(true, |(field, value)| child.field_text(field) == Some(value))
            };

            let mut removed = 0;
            for parent in parent_path.resolve_mut(root) {
                let before = parent.children.len();
                parent.children.retain(|c| !selected(c));
                removed += before - parent.children.len();
            }
            debug!("Removed {} element(s) at '{}'", removed, path);
            Ok(removed)
        })
    }

    /// Returns the counter's current value and stores the next one, in a single transaction,
    /// so a value handed out is never handed out again.
    fn allocate_counter(&mut self, path: &ConfigPath) -> Result<u64> {
        self.transaction(|root| {
            let node = path
                .resolve_mut(root)
                .into_iter()
                .next()
                .context(error::NotFoundSnafu { path: path.name() })?;

            let text = node.text.as_deref().unwrap_or_default().trim();
            let current: u64 = text.parse().ok().context(error::InvalidCounterSnafu {
                path: path.name(),
                value: text,
            })?;
            let next = current
                .checked_add(1)
                .context(error::CounterOverflowSnafu {
                    path: path.name(),
                    value: current,
                })?;

            node.text = Some(next.to_string());
            debug!("Allocated {} from counter '{}'", current, path);
            Ok(current)
        })
    }
}

/// Finds the single element at `path`, which is about to receive a new child.
fn single_parent_mut<'a>(root: &'a mut Element, path: &ConfigPath) -> Result<&'a mut Element> {
    let mut parents = path.resolve_mut(root);
    ensure!(
        !parents.is_empty(),
        error::NotFoundSnafu { path: path.name() }
    );
    ensure!(
        parents.len() == 1,
        error::AmbiguousParentSnafu {
            path: path.name(),
            count: parents.len(),
        }
    );
    Ok(parents.remove(0))
}

fn set_leaf_text(node: &mut Element, path: &ConfigPath, value: &str) -> Result<()> {
    ensure!(
        node.is_leaf(),
        error::NotLeafSnafu { path: path.name() }
    );
    node.text = Some(value.to_string());
    Ok(())
}
