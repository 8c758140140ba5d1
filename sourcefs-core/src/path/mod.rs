//! Path algebra: dot-segment expansion and the path object used by the
//! provider adapter.
//!
//! Everything here is pure segment arithmetic over the factory's separator
//! character; no backend is consulted except where an operation is defined
//! in terms of the backing capability object (`resolve`, `to_absolute`).

use std::cmp::Ordering;

use crate::error::{FsError, FsResult};
use crate::factory::{FactoryRef, SourceFactory};
use crate::source::{FileSource, SourceRef};

/// Expand `.` and `..` segments of `path` around `separator`.
///
/// Empty segments and `.` drop; `..` pops the last retained segment. A `..`
/// with nothing to pop never underflows: it is discarded when the path is
/// absolute (`/../a` → `/a`) and retained when relative (`../a` → `../a`),
/// matching native lexical normalization. Idempotent.
pub fn expand_dots(path: &str, separator: char) -> String {
    let path = path.trim();
    if path.is_empty() || path == ".." {
        return path.to_string();
    }
    if path == "." {
        return String::new();
    }

    let absolute = path.starts_with(separator);
    let mut kept: Vec<&str> = Vec::new();

    for segment in path.split(separator) {
        let segment = segment.trim();
        match segment {
            "" | "." => {}
            ".." => match kept.last() {
                Some(&last) if last != ".." => {
                    kept.pop();
                }
                _ if absolute => {}
                _ => kept.push(".."),
            },
            _ => kept.push(segment),
        }
    }

    let mut out = String::new();
    if absolute {
        out.push(separator);
    }
    for (idx, segment) in kept.iter().enumerate() {
        if idx > 0 {
            out.push(separator);
        }
        out.push_str(segment);
    }
    out
}

/// A path bound to a factory: raw text plus the segment operations the
/// provider adapter needs. The backing capability object is created lazily.
#[derive(Clone)]
pub struct SourcePath {
    raw: String,
    factory: FactoryRef,
    file: Option<SourceRef>,
}

impl SourcePath {
    pub fn new(raw: impl Into<String>, factory: FactoryRef) -> Self {
        Self {
            raw: raw.into(),
            factory,
            file: None,
        }
    }

    pub fn from_source(file: SourceRef) -> Self {
        Self {
            raw: file.absolute_path(),
            factory: file.factory(),
            file: Some(file),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn factory(&self) -> &FactoryRef {
        &self.factory
    }

    fn separator(&self) -> char {
        self.factory.separator()
    }

    /// The backing capability object, created through the factory on first
    /// use.
    pub fn source(&self) -> FsResult<SourceRef> {
        match &self.file {
            Some(file) => Ok(file.clone()),
            None => self.factory.create_file_source(&self.raw),
        }
    }

    pub fn is_absolute(&self) -> bool {
        let mut chars = self.raw.chars();
        match chars.next() {
            Some(c) if c == self.separator() => true,
            // Drive-letter form.
            Some(c) if c.is_ascii_alphabetic() => chars.next() == Some(':'),
            _ => false,
        }
    }

    fn segments(&self) -> Vec<&str> {
        let sep = self.separator();
        self.raw
            .split(sep)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn root(&self) -> Option<SourcePath> {
        let sep = self.separator();
        if self.raw.starts_with(sep) {
            return Some(SourcePath::new(sep.to_string(), self.factory.clone()));
        }
        self.segments()
            .first()
            .map(|s| SourcePath::new(s.to_string(), self.factory.clone()))
    }

    pub fn file_name(&self) -> Option<SourcePath> {
        self.segments()
            .last()
            .map(|s| SourcePath::new(s.to_string(), self.factory.clone()))
    }

    pub fn parent(&self) -> Option<SourcePath> {
        let sep = self.separator();
        let idx = self.raw.rfind(sep)?;
        if idx == 0 {
            if self.raw.len() == 1 {
                return None;
            }
            return Some(SourcePath::new(sep.to_string(), self.factory.clone()));
        }
        Some(SourcePath::new(
            self.raw[..idx].to_string(),
            self.factory.clone(),
        ))
    }

    pub fn name_count(&self) -> usize {
        self.segments().len()
    }

    pub fn name(&self, index: usize) -> Option<SourcePath> {
        self.segments()
            .get(index)
            .map(|s| SourcePath::new(s.to_string(), self.factory.clone()))
    }

    /// Segments `[begin, end)` joined on the separator. When the slice
    /// begins at 0 on an absolute path, the leading separator is kept.
    pub fn subpath(&self, begin: usize, end: usize) -> SourcePath {
        let sep = self.separator();
        let segments = self.segments();
        let mut out = String::new();
        if begin == 0 && self.raw.starts_with(sep) {
            out.push(sep);
        }
        for (count, segment) in segments
            .iter()
            .take(end.min(segments.len()))
            .skip(begin)
            .enumerate()
        {
            if count > 0 {
                out.push(sep);
            }
            out.push_str(segment);
        }
        SourcePath::new(out, self.factory.clone())
    }

    pub fn starts_with(&self, other: &SourcePath) -> bool {
        self.raw.starts_with(&other.raw)
    }

    pub fn ends_with(&self, other: &SourcePath) -> bool {
        self.raw.ends_with(&other.raw)
    }

    /// Resolve `other` against this path. Absolute or empty `other` wins
    /// outright; anything else becomes a child of this path's backing
    /// object.
    pub fn resolve(&self, other: &SourcePath) -> FsResult<SourcePath> {
        if other.is_absolute() {
            return Ok(other.clone());
        }
        if other.raw.is_empty() || other.name_count() == 0 {
            return Ok(self.clone());
        }
        let child = self.source()?.get_child(&other.raw)?;
        Ok(SourcePath::from_source(child))
    }

    /// The remainder of `other` relative to this path. Both sides must
    /// share absoluteness; textually identical paths yield an empty path.
    pub fn relativize(&self, other: &SourcePath) -> FsResult<SourcePath> {
        if self.raw == other.raw {
            return Ok(SourcePath::new("", self.factory.clone()));
        }
        if self.is_absolute() != other.is_absolute() {
            return Err(FsError::InvalidArgument(
                "cannot relativize an absolute path against a relative one".to_string(),
            ));
        }
        if self.raw.is_empty() {
            return Ok(other.clone());
        }

        let sep = self.separator();
        let me = self.to_absolute()?.raw;
        let them = other.to_absolute()?.raw;
        let mut rest = them.strip_prefix(&me).unwrap_or(&them);
        while rest.starts_with(sep) {
            rest = &rest[sep.len_utf8()..];
        }
        Ok(SourcePath::new(rest.to_string(), self.factory.clone()))
    }

    pub fn normalize(&self) -> SourcePath {
        SourcePath::new(
            expand_dots(&self.raw, self.separator()),
            self.factory.clone(),
        )
    }

    pub fn to_absolute(&self) -> FsResult<SourcePath> {
        if self.is_absolute() {
            return Ok(self.clone());
        }
        let file = self.source()?;
        Ok(SourcePath::new(file.absolute_path(), self.factory.clone()))
    }

    /// Lexicographic order over the normalized absolute text of both
    /// sides.
    pub fn compare(&self, other: &SourcePath) -> FsResult<Ordering> {
        let me = self.to_absolute()?.normalize();
        let them = other.to_absolute()?.normalize();
        Ok(me.raw.cmp(&them.raw))
    }

    pub fn to_uri(&self) -> String {
        format!(
            "filesource:{}?sourcetype={}",
            self.raw,
            self.factory.type_id()
        )
    }
}

impl std::fmt::Display for SourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::fmt::Debug for SourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourcePath")
            .field("raw", &self.raw)
            .field("sourcetype", &self.factory.type_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "")]
    #[case(".", "")]
    #[case("..", "..")]
    #[case("/", "/")]
    #[case("/a/b/c", "/a/b/c")]
    #[case("a/./b", "a/b")]
    #[case("a/../b", "b")]
    #[case("a/b/..", "a")]
    #[case("a/..", "")]
    #[case("../a", "../a")]
    #[case("../../a", "../../a")]
    #[case("/../a", "/a")]
    #[case("/a/../../b", "/b")]
    #[case("//a//b/", "/a/b")]
    #[case("/a/./b/../c", "/a/c")]
    #[case("a/b/../../..", "..")]
    fn expand_dots_cases(#[case] input: &str, #[case] expect: &str) {
        assert_eq!(expand_dots(input, '/'), expect);
    }

    #[test]
    fn expand_dots_is_idempotent() {
        let options = [".", "..", "one", "two", "", "three", "four"];
        // Deterministic sweep over joined combinations, weighted toward dots.
        for a in options {
            for b in options {
                for c in options {
                    for lead in ["", "/"] {
                        let path = format!("{lead}{a}/{b}/{c}");
                        let once = expand_dots(&path, '/');
                        let twice = expand_dots(&once, '/');
                        assert_eq!(once, twice, "not idempotent for {path:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn expand_dots_respects_separator() {
        assert_eq!(expand_dots("a|.|b|..|c", '|'), "a|c");
    }
}
