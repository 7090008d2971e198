use std::fs;
use std::path::PathBuf;

/// Writes a fixture file under `<temp>/prog-test/` and returns its path.
///
/// Tests that share a name overwrite each other, so callers pick names unique to the
/// test and remove the file with [`crate::defer`] when done.
pub fn create_file(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("prog-test");
    fs::create_dir_all(&dir).expect("Failed to create fixture directory");

    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write fixture file");
    path
}
