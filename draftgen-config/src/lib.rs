use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub drawing: DrawingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            provider: ProviderConfig::default(),
            paths: PathsConfig::default(),
            drawing: DrawingConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `DRAFTGEN_CONFIG`，
    /// 否则寻找 `./config/default.toml`。若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("DRAFTGEN_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 栅格底图服务配置。访问令牌只记录环境变量名，不落盘。
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "ProviderConfig::default_style")]
    pub style: String,
    #[serde(default = "ProviderConfig::default_token_env")]
    pub token_env: String,
}

impl ProviderConfig {
    fn default_style() -> String {
        "streets-v12".to_string()
    }

    fn default_token_env() -> String {
        "MAPBOX_TOKEN".to_string()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            style: Self::default_style(),
            token_env: Self::default_token_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// 外部参照（底图等）输出目录。
    #[serde(default = "PathsConfig::default_references_dir")]
    pub references_dir: PathBuf,
    /// 工程师签章块库文档，可缺省。
    #[serde(default)]
    pub stamp_library: Option<PathBuf>,
    /// 额外图纸库文档，配置后其布局会整体并入模板。
    #[serde(default)]
    pub sheet_library: Option<PathBuf>,
}

impl PathsConfig {
    fn default_references_dir() -> PathBuf {
        PathBuf::from("references")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            references_dir: Self::default_references_dir(),
            stamp_library: None,
            sheet_library: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrawingConfig {
    /// 模板类型标签，作为视口配置表的第一级键。
    #[serde(default = "DrawingConfig::default_template_type")]
    pub template_type: String,
    /// 项目边界多段线所在图层。
    #[serde(default = "DrawingConfig::default_boundary_layer")]
    pub boundary_layer: String,
    /// 项目坐标系的 UTM 带号（北半球）。
    #[serde(default = "DrawingConfig::default_utm_zone")]
    pub utm_zone: u8,
}

impl DrawingConfig {
    fn default_template_type() -> String {
        "ArchD (24x36)".to_string()
    }

    fn default_boundary_layer() -> String {
        "_SP-BLK9-PR-PHASE LIMIT".to_string()
    }

    fn default_utm_zone() -> u8 {
        17
    }
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            template_type: Self::default_template_type(),
            boundary_layer: Self::default_boundary_layer(),
            utm_zone: Self::default_utm_zone(),
        }
    }
}

/// 视口页面类别：封面页使用大窗口，其余页使用小窗口。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Cover,
    Default,
}

impl PageKind {
    pub fn describe(&self) -> &'static str {
        match self {
            PageKind::Cover => "cover",
            PageKind::Default => "default",
        }
    }
}

/// 单条视口放置配置：纸面中心与纸面宽高。
#[derive(Debug, Clone, Copy)]
pub struct ViewportEntry {
    pub paper_center: (f64, f64),
    pub paper_width: f64,
    pub paper_height: f64,
}

struct TemplateViewports {
    template_type: &'static str,
    cover: ViewportEntry,
    default: ViewportEntry,
}

/// 模板类型 → 页面类别 → 纸面放置参数的静态表。
/// 数值来自模板文档的标题栏框线，修改模板时需同步。
static VIEWPORT_TABLE: &[TemplateViewports] = &[
    TemplateViewports {
        template_type: "ArchB (11x17)",
        cover: ViewportEntry {
            paper_center: (211.7547, 126.2423),
            paper_width: 183.3697,
            paper_height: 128.524,
        },
        default: ViewportEntry {
            paper_center: (389.9214, 247.1288),
            paper_width: 60.8802,
            paper_height: 39.7037,
        },
    },
    TemplateViewports {
        template_type: "ArchD (24x36)",
        cover: ViewportEntry {
            paper_center: (436.160, 285.743),
            paper_width: 444.1,
            paper_height: 292.1,
        },
        default: ViewportEntry {
            paper_center: (808.6697, 546.143),
            paper_width: 127.0005,
            paper_height: 100.0752,
        },
    },
];

/// 查询视口放置配置。未知模板类型返回 None，由调用方升级为配置错误。
pub fn viewport_entry(template_type: &str, page: PageKind) -> Option<&'static ViewportEntry> {
    VIEWPORT_TABLE
        .iter()
        .find(|entry| entry.template_type == template_type)
        .map(|entry| match page {
            PageKind::Cover => &entry.cover,
            PageKind::Default => &entry.default,
        })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
