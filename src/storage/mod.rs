pub mod cache;

pub use cache::AssessmentCache;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::utils::PaperResult;

/// 文件内容的SHA-256十六进制摘要，作为评估缓存键
pub fn content_hash(path: impl AsRef<Path>) -> PaperResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_same_content() {
        let dir = std::env::temp_dir();
        let path_a = dir.join("paperbot_hash_a.bin");
        let path_b = dir.join("paperbot_hash_b.bin");
        std::fs::write(&path_a, b"same bytes").unwrap();
        std::fs::write(&path_b, b"same bytes").unwrap();

        let hash_a = content_hash(&path_a).unwrap();
        let hash_b = content_hash(&path_b).unwrap();
        assert_eq!(hash_a, hash_b);
        assert_eq!(hash_a.len(), 64);

        std::fs::remove_file(path_a).ok();
        std::fs::remove_file(path_b).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(content_hash("/no/such/file.bin").is_err());
    }
}
