//! Source bookkeeping for the Ember compiler: module ids, byte spans,
//! row/column resolution, and the global identifier and string interners.

pub mod identifier;
pub mod location;
pub mod string;

use std::path::{Path, PathBuf};

use ember_utils::index_vec::{index_vec, IndexVec};

pub use crate::location::{RowCol, SourceLocation, Span};

ember_utils::index_vec::define_index_type! {
    /// Identifies a single module (file) registered in the [SourceMap].
    pub struct SourceId = u32;

    MAX_INDEX = i32::max_value() as usize;
    DISABLE_MAX_INDEX_CHECK = cfg!(not(debug_assertions));
}

/// A registered source module: its path and full contents.
#[derive(Debug)]
pub struct SourceModule {
    path: PathBuf,
    contents: String,
    /// Byte offsets of every line start, computed on registration.
    line_starts: Vec<u32>,
}

impl SourceModule {
    fn new(path: PathBuf, contents: String) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            contents.bytes().enumerate().filter(|(_, b)| *b == b'\n').map(|(i, _)| i as u32 + 1),
        );
        Self { path, contents, line_starts }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Resolve a byte offset into a 1-indexed row/column pair.
    pub fn row_col(&self, offset: u32) -> RowCol {
        let row = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        RowCol { row: row as u32 + 1, col: offset - self.line_starts[row] + 1 }
    }
}

/// Append-only map of all sources participating in a compile.
#[derive(Debug, Default)]
pub struct SourceMap {
    modules: IndexVec<SourceId, SourceModule>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self { modules: index_vec![] }
    }

    pub fn add_module(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> SourceId {
        self.modules.push(SourceModule::new(path.into(), contents.into()))
    }

    pub fn module(&self, id: SourceId) -> &SourceModule {
        &self.modules[id]
    }

    pub fn path_of(&self, id: SourceId) -> &Path {
        self.modules[id].path()
    }

    /// Format a location as `path:row:col` for diagnostics.
    pub fn describe(&self, location: SourceLocation) -> String {
        let module = self.module(location.source);
        let RowCol { row, col } = module.row_col(location.span.start);
        format!("{}:{row}:{col}", module.path().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_col_resolution() {
        let mut map = SourceMap::new();
        let id = map.add_module("demo.ember", "bank rom;\nin rom {\n}\n");
        let module = map.module(id);

        assert_eq!(module.row_col(0), RowCol { row: 1, col: 1 });
        assert_eq!(module.row_col(5), RowCol { row: 1, col: 6 });
        assert_eq!(module.row_col(10), RowCol { row: 2, col: 1 });
        assert_eq!(module.row_col(20), RowCol { row: 3, col: 2 });
    }
}
