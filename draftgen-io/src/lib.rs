use std::fs;
use std::path::Path;

use draftgen_core::document::Document;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure in {path:?}: {source}")]
    InvalidDocument {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 以 JSON 交换格式读写文档。模板与块库均采用该格式，
/// CAD 原生编码的转换由外部工具完成。
pub struct JsonFacade;

impl JsonFacade {
    pub fn new() -> Self {
        Self
    }

    fn check_extension(path: &Path) -> Result<(), IoError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if extension.eq_ignore_ascii_case("json") {
            Ok(())
        } else {
            Err(IoError::UnsupportedFormat(extension.to_string()))
        }
    }
}

impl Default for JsonFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        Self::check_extension(path)?;
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| IoError::InvalidDocument {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl DocumentSaver for JsonFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        Self::check_extension(path)?;
        let data = serde_json::to_string_pretty(document).map_err(|source| {
            IoError::InvalidDocument {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, data).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}
