use md5::{Digest, Md5};

/// Content hash used purely as a change indicator, not a security primitive.
/// Mixes the path in so two files with identical bytes still hash
/// differently.
#[must_use]
pub fn content_hash(path: &str, bytes: &[u8], size: u64, mtime_ms: u64) -> String {
    let mut hasher = Md5::new();
    hasher.update(path.as_bytes());
    hasher.update(bytes);
    hasher.update(size.to_le_bytes());
    hasher.update(mtime_ms.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_inputs_hash_identically() {
        let a = content_hash("a.md", b"hello", 5, 1000);
        let b = content_hash("a.md", b"hello", 5, 1000);
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_hash_differently_for_identical_bytes() {
        let a = content_hash("a.md", b"hello", 5, 1000);
        let b = content_hash("b.md", b"hello", 5, 1000);
        assert_ne!(a, b);
    }

    #[test]
    fn mtime_change_changes_hash() {
        let a = content_hash("a.md", b"hello", 5, 1000);
        let b = content_hash("a.md", b"hello", 5, 2000);
        assert_ne!(a, b);
    }
}
