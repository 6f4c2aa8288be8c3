//! Arena-based source storage for unified lifetimes.
//!
//! All sources that make up a compilation (the root program plus every
//! transitively imported module) are stored in a single contiguous buffer,
//! so all string slices share the same lifetime as `&SourceMap`. This avoids
//! threading a distinct lifetime through the linker for every imported file.

use std::ops::Range;

/// Lightweight handle to a source in a compilation session.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default, Ord, PartialOrd, serde::Serialize)]
pub struct SourceId(u32);

impl SourceId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// A borrowed view of a source: id, canonical module path, and content.
#[derive(Copy, Clone, Debug)]
pub struct Source<'a> {
    pub id: SourceId,
    pub path: &'a str,
    pub content: &'a str,
}

impl<'a> Source<'a> {
    pub fn as_str(&self) -> &'a str {
        self.content
    }
}

#[derive(Clone, Debug)]
struct SourceEntry {
    path_range: Range<u32>,
    content_range: Range<u32>,
}

/// Arena-based registry of every source unit in one compilation session.
///
/// Each module is identified by a canonical path (the string used in
/// `import "path"`, or `"<root>"` for the entry program). Content slices
/// returned all have the lifetime of `&SourceMap`.
#[derive(Clone, Debug, Default)]
pub struct SourceMap {
    buffer: String,
    entries: Vec<SourceEntry>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `SourceMap` containing only the entry module, under the
    /// canonical path `"<root>"`. Convenience for single-file compilation.
    pub fn root_only(content: &str) -> Self {
        let mut map = Self::new();
        map.add("<root>", content);
        map
    }

    /// Add a source identified by its canonical module path.
    pub fn add(&mut self, path: &str, content: &str) -> SourceId {
        let path_range = self.push(path);
        let content_range = self.push(content);
        let id = SourceId(self.entries.len() as u32);
        self.entries.push(SourceEntry {
            path_range,
            content_range,
        });
        id
    }

    pub fn content(&self, id: SourceId) -> &str {
        self.slice(&self.ensure(id).content_range)
    }

    pub fn path(&self, id: SourceId) -> &str {
        self.slice(&self.ensure(id).path_range)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn id_of(&self, path: &str) -> Option<SourceId> {
        self.entries
            .iter()
            .position(|e| self.slice(&e.path_range) == path)
            .map(|i| SourceId(i as u32))
    }

    pub fn get(&self, id: SourceId) -> Source<'_> {
        let entry = self.ensure(id);
        Source {
            id,
            path: self.slice(&entry.path_range),
            content: self.slice(&entry.content_range),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Source<'_>> {
        self.entries.iter().enumerate().map(|(idx, entry)| Source {
            id: SourceId(idx as u32),
            path: self.slice(&entry.path_range),
            content: self.slice(&entry.content_range),
        })
    }

    pub fn reserve(&mut self, additional: usize) {
        self.buffer.reserve(additional);
    }

    fn push(&mut self, s: &str) -> Range<u32> {
        let start = self.buffer.len() as u32;
        self.buffer.push_str(s);
        start..self.buffer.len() as u32
    }

    fn slice(&self, range: &Range<u32>) -> &str {
        &self.buffer[range.start as usize..range.end as usize]
    }

    fn ensure(&self, id: SourceId) -> &SourceEntry {
        self.entries
            .get(id.0 as usize)
            .expect("invalid SourceId")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_only_source() {
        let map = SourceMap::root_only("formula x { }");
        let id = SourceId(0);

        assert_eq!(map.content(id), "formula x { }");
        assert_eq!(map.path(id), "<root>");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn multiple_modules() {
        let mut map = SourceMap::new();
        let a = map.add("base.fm", "nutrient protein");
        let b = map.add("mixes/starter.fm", "import \"../base.fm\"");

        assert_eq!(map.len(), 2);
        assert_eq!(map.content(a), "nutrient protein");
        assert_eq!(map.content(b), "import \"../base.fm\"");
        assert_eq!(map.path(a), "base.fm");
        assert_eq!(map.path(b), "mixes/starter.fm");
    }

    #[test]
    fn id_of_lookup() {
        let mut map = SourceMap::new();
        map.add("a.fm", "aaa");
        map.add("b.fm", "bbb");

        assert_eq!(map.id_of("b.fm"), Some(SourceId(1)));
        assert_eq!(map.id_of("missing.fm"), None);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut map = SourceMap::new();
        map.add("a.fm", "aaa");
        map.add("b.fm", "bbb");

        let items: Vec<_> = map.iter().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "a.fm");
        assert_eq!(items[1].path, "b.fm");
    }

    #[test]
    #[should_panic(expected = "invalid SourceId")]
    fn invalid_id_panics() {
        let map = SourceMap::new();
        let _ = map.content(SourceId(999));
    }
}
