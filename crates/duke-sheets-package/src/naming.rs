//! Numbered part families (`xl/drawings/drawingN.xml`, ...)
//!
//! There is no persisted counter: the next number is derived from the part
//! names currently in the package every time it is needed.

use crate::package::PartMap;

/// A family of parts named `{dir}{stem}{N}.{ext}` with 1-based `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartFamily {
    dir: &'static str,
    stem: &'static str,
    ext: &'static str,
}

impl PartFamily {
    /// `xl/drawings/drawingN.xml`
    pub const DRAWING: PartFamily = PartFamily::new("xl/drawings/", "drawing", "xml");
    /// `xl/slicers/slicerN.xml`
    pub const SLICER: PartFamily = PartFamily::new("xl/slicers/", "slicer", "xml");
    /// `xl/slicerCaches/slicerCacheN.xml`
    pub const SLICER_CACHE: PartFamily = PartFamily::new("xl/slicerCaches/", "slicerCache", "xml");

    /// Describe a family; `dir` must end with `/`
    pub const fn new(dir: &'static str, stem: &'static str, ext: &'static str) -> Self {
        Self { dir, stem, ext }
    }

    /// Part name for index `n`
    pub fn part_name(&self, n: u32) -> String {
        format!("{}{}{}.{}", self.dir, self.stem, n, self.ext)
    }

    /// Index of `part` if it belongs to this family
    pub fn index_of(&self, part: &str) -> Option<u32> {
        let digits = part
            .trim_start_matches('/')
            .strip_prefix(self.dir)?
            .strip_prefix(self.stem)?
            .strip_suffix(self.ext)?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Members of the family, ordered by index
    pub fn members<'a>(&self, parts: &'a PartMap) -> Vec<(u32, &'a str)> {
        let mut members: Vec<(u32, &str)> = parts
            .names()
            .filter_map(|name| self.index_of(name).map(|n| (n, name)))
            .collect();
        members.sort_by_key(|&(n, _)| n);
        members
    }

    /// Next free index: member count + 1, advanced past any index in use.
    pub fn next_index(&self, parts: &PartMap) -> u32 {
        let mut next = self.members(parts).len() as u32 + 1;
        while parts.contains(&self.part_name(next)) {
            next += 1;
        }
        next
    }
}
