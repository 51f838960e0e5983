//! File path helpers shared by the file-backed stores.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::constants::TEMP_FILE_SUFFIX;

/// Temporary sibling used by an atomic save of `path`.
///
/// The suffix is appended to the full file name, so `app.cache` and
/// `app.queue` never share a temporary file.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_is_appended() {
        assert_eq!(temp_path(Path::new("/data/app.cache")), PathBuf::from("/data/app.cache.tmp"));
        assert_eq!(temp_path(Path::new("queue")), PathBuf::from("queue.tmp"));
    }

    #[test]
    fn test_stores_sharing_a_stem_get_distinct_temp_files() {
        let cache = temp_path(Path::new("/data/app.cache"));
        let queue = temp_path(Path::new("/data/app.queue"));
        assert_ne!(cache, queue);
        assert_ne!(cache, PathBuf::from("/data/app.tmp"));
    }
}
