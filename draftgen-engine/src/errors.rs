use std::path::PathBuf;

use thiserror::Error;

/// 组装流程的统一错误类型。所有变体都是不可恢复的：
/// 任一布局处理失败即中止整轮组装，不写出部分结果。
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("layout {0:?} not found in document")]
    LayoutNotFound(String),
    #[error("block definition {0:?} not found in source document")]
    DefinitionNotFound(String),
    #[error("no boundary polyline found on layer {0:?}")]
    BoundaryNotFound(String),
    #[error("missing required attribute {0:?}")]
    MissingField(String),
    #[error("attribute {key:?} has unexpected value {value:?}")]
    InvalidField { key: String, value: String },
    #[error("layout handler {0:?} is already registered")]
    DuplicateHandler(String),
    #[error("layout handler has no bound layout name")]
    UnboundHandler,
    #[error("no viewport configuration for template {template:?}, page {page:?}")]
    MissingViewportConfig {
        template: String,
        page: &'static str,
    },
    #[error("boundary polygon has no points")]
    EmptyGeometry,
    #[error("image provider returned status {status}: {body}")]
    ProviderStatus { status: u16, body: String },
    #[error("image provider request failed: {0}")]
    ProviderTransport(#[from] reqwest::Error),
    #[error("failed to write image file {path:?}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] draftgen_io::IoError),
}
