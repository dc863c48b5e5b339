//! 파일 내용 식별자.
//!
//! 경로 대신 (크기, MD5)로 파일을 식별한다.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chameleon_core::error::CoreError;
use chameleon_core::models::figure::FileIdentity;
use md5::{Digest, Md5};

/// 열린 문서 파일
#[derive(Debug, Clone)]
pub struct ObservedFile {
    path: PathBuf,
    identity: FileIdentity,
}

impl ObservedFile {
    /// 파일을 읽어 식별자를 계산한다
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let identity = compute_identity(&path)?;
        Ok(Self { path, identity })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    /// 내용이 바뀌었는지 다시 계산한다. 바뀌었으면 캐시를 갱신하고 true.
    pub fn is_different(&mut self) -> Result<bool, CoreError> {
        let identity = compute_identity(&self.path)?;
        if identity == self.identity {
            return Ok(false);
        }
        self.identity = identity;
        Ok(true)
    }
}

/// (크기, MD5) 계산
pub fn compute_identity(path: &Path) -> Result<FileIdentity, CoreError> {
    let size = std::fs::metadata(path)?.len();
    Ok(FileIdentity {
        size,
        md5: md5_hex(path)?,
    })
}

fn md5_hex(path: &Path) -> Result<String, CoreError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn identity_of_known_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();

        let observed = ObservedFile::open(file.path()).unwrap();
        assert_eq!(observed.identity().size, 5);
        assert_eq!(observed.identity().md5, "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn detects_same_size_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"aaaa").unwrap();
        let mut observed = ObservedFile::open(&path).unwrap();
        assert!(!observed.is_different().unwrap());

        std::fs::write(&path, b"bbbb").unwrap();
        assert!(observed.is_different().unwrap());
        // 캐시가 갱신되어 다시 물으면 변경 없음
        assert!(!observed.is_different().unwrap());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = ObservedFile::open("/nonexistent/chameleon/file.pdf");
        assert!(matches!(result, Err(CoreError::Io(_))));
    }
}
