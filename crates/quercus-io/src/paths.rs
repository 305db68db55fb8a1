//! Companion-file naming: every artifact sits next to the data file and
//! differs only in extension.

use std::path::{Path, PathBuf};

/// The `.names` schema file belonging to a data file.
#[must_use]
pub fn names_path(data: &Path) -> PathBuf {
    data.with_extension("names")
}

/// The `.data` training file for a stem the user may have given without
/// an extension.
#[must_use]
pub fn data_path(input: &Path) -> PathBuf {
    if input.extension().is_some_and(|e| e == "data") {
        input.to_path_buf()
    } else {
        input.with_extension("data")
    }
}

/// The optional `.test` companion holding the held-out test rows.
#[must_use]
pub fn test_path(data: &Path) -> PathBuf {
    data.with_extension("test")
}

/// Where the trained model is saved: `.tree` for a single tree, `.forest`
/// for an ensemble.
#[must_use]
pub fn model_path(data: &Path, forest: bool) -> PathBuf {
    data.with_extension(if forest { "forest" } else { "tree" })
}

/// The prediction output file written next to a `.cases` file.
#[must_use]
pub fn output_path(cases: &Path) -> PathBuf {
    cases.with_extension("tmp")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{data_path, model_path, names_path, output_path, test_path};

    #[test]
    fn extensions_swap_in_place() {
        let data = Path::new("iris.data");
        assert_eq!(names_path(data), Path::new("iris.names"));
        assert_eq!(test_path(data), Path::new("iris.test"));
        assert_eq!(model_path(data, false), Path::new("iris.tree"));
        assert_eq!(model_path(data, true), Path::new("iris.forest"));
        assert_eq!(output_path(Path::new("iris.cases")), Path::new("iris.tmp"));
    }

    #[test]
    fn bare_stem_gains_data_extension() {
        assert_eq!(data_path(Path::new("iris")), Path::new("iris.data"));
        assert_eq!(data_path(Path::new("iris.data")), Path::new("iris.data"));
    }
}
