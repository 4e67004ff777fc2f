//! 图纸处理器：每张图纸一个处理器，注册表显式注册、按注册顺序调度。

use draftgen_config::{viewport_entry, PageKind};
use draftgen_core::document::Document;
use tracing::{debug, info};

use crate::errors::AssemblyError;
use crate::record::{AttrValue, AttributeRecord};
use crate::substitute::substitute;
use crate::viewport::{boundary_bounds, place_viewport, ViewportPlacement};

/// 单张图纸的编辑能力。实现者声明自己绑定的图纸名、
/// 贡献的页面专有属性，并可追加页面特有的编辑步骤。
pub trait LayoutHandler {
    /// 绑定的图纸名，例如 `"ELE-01"`。
    fn layout_name(&self) -> &str;

    /// 本页专有属性。返回值会写入共享记录后参与占位替换。
    fn attributes(&self, record: &AttributeRecord) -> Vec<(&'static str, AttrValue)>;

    /// 视口放置时查表用的页面类别。
    fn page_kind(&self) -> PageKind {
        PageKind::Default
    }

    /// 通用五步之后的页面特有编辑。默认无操作。
    fn edit_specific(
        &self,
        _doc: &mut Document,
        _record: &AttributeRecord,
    ) -> Result<(), AssemblyError> {
        Ok(())
    }
}

/// 处理器注册表。进程启动时显式注册一次，
/// 调度阶段按注册顺序枚举。
#[derive(Default)]
pub struct LayoutRegistry {
    handlers: Vec<Box<dyn LayoutHandler>>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个处理器。图纸名为空或与已注册者重复时拒绝。
    pub fn register(&mut self, handler: Box<dyn LayoutHandler>) -> Result<(), AssemblyError> {
        let name = handler.layout_name();
        if name.is_empty() {
            return Err(AssemblyError::UnboundHandler);
        }
        if self.handlers.iter().any(|h| h.layout_name() == name) {
            return Err(AssemblyError::DuplicateHandler(name.to_string()));
        }
        debug!(layout = name, "图纸处理器已注册");
        self.handlers.push(handler);
        Ok(())
    }

    /// 标准五页模板的内置处理器集合。
    pub fn with_builtin() -> Result<Self, AssemblyError> {
        let mut registry = Self::new();
        for profile in BUILTIN_SHEETS {
            registry.register(Box::new(*profile))?;
        }
        Ok(registry)
    }

    #[inline]
    pub fn handlers(&self) -> impl Iterator<Item = &dyn LayoutHandler> {
        self.handlers.iter().map(Box::as_ref)
    }

    #[inline]
    pub fn get(&self, layout_name: &str) -> Option<&dyn LayoutHandler> {
        self.handlers
            .iter()
            .find(|h| h.layout_name() == layout_name)
            .map(Box::as_ref)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// 编辑一张图纸所需的文档级环境。
#[derive(Debug, Clone, Copy)]
pub struct EditContext<'a> {
    pub template_type: &'a str,
    pub boundary_layer: &'a str,
}

/// 通用编辑序列，对每张图纸依次执行：
/// 1. 写入页码 `SHEET`（页签次序，1 起）与图号 `DRAWING_NUMBER`；
/// 2. 合入处理器贡献的页面专有属性；
/// 3. 对图纸做占位属性替换；
/// 4. 按模板与页面类别查表放置视口；
/// 5. 执行处理器的页面特有编辑。
pub fn edit_layout(
    doc: &mut Document,
    handler: &dyn LayoutHandler,
    record: &mut AttributeRecord,
    ctx: &EditContext<'_>,
) -> Result<(), AssemblyError> {
    let name = handler.layout_name().to_string();
    let position = doc
        .layout_position(&name)
        .ok_or_else(|| AssemblyError::LayoutNotFound(name.clone()))?;
    record.set("SHEET", (position + 1) as f64);
    let work_order = record.require_display("PROJECT_WORK_ORDER")?;
    record.set("DRAWING_NUMBER", format!("{work_order}-{name}"));

    for (key, value) in handler.attributes(record) {
        record.set(key, value);
    }

    let layout = doc
        .layout_mut(&name)
        .ok_or_else(|| AssemblyError::LayoutNotFound(name.clone()))?;
    substitute(layout, record);

    let entry = viewport_entry(ctx.template_type, handler.page_kind()).ok_or_else(|| {
        AssemblyError::MissingViewportConfig {
            template: ctx.template_type.to_string(),
            page: handler.page_kind().describe(),
        }
    })?;
    let placement = if record.contains_key("PA_MSP_CENTER_POINT")
        && record.contains_key("PA_MSP_HEIGHT")
    {
        ViewportPlacement::with_view(
            entry,
            record.require_point("PA_MSP_CENTER_POINT")?,
            record.require_number("PA_MSP_HEIGHT")?,
        )
    } else {
        // 记录未携带视图参数时直接取景到边界
        let bounds = boundary_bounds(doc, ctx.boundary_layer)?;
        ViewportPlacement::fit(entry, bounds.center(), &bounds)
    };
    place_viewport(doc, &name, placement)?;

    handler.edit_specific(doc, record)?;
    info!(layout = %name, sheet = position + 1, "图纸编辑完成");
    Ok(())
}

/// 内置图纸的静态档案：名称、页面类别、比例与标题。
#[derive(Debug, Clone, Copy)]
pub struct SheetProfile {
    layout_name: &'static str,
    page: PageKind,
    scale: &'static str,
    title: &'static str,
}

impl LayoutHandler for SheetProfile {
    fn layout_name(&self) -> &str {
        self.layout_name
    }

    fn attributes(&self, _record: &AttributeRecord) -> Vec<(&'static str, AttrValue)> {
        vec![
            ("SCALE", AttrValue::from(self.scale)),
            ("DRAWING_TITLE", AttrValue::from(self.title)),
        ]
    }

    fn page_kind(&self) -> PageKind {
        self.page
    }
}

const BUILTIN_SHEETS: &[SheetProfile] = &[
    SheetProfile {
        layout_name: "COV-01",
        page: PageKind::Cover,
        scale: "N.T.S",
        title: "COVER PAGE",
    },
    SheetProfile {
        layout_name: "SCH-01",
        page: PageKind::Default,
        scale: "N.T.S",
        title: "SCHEDULES",
    },
    SheetProfile {
        layout_name: "ELE-01",
        page: PageKind::Default,
        scale: "1:500",
        title: "ELECTRICAL SERVICING PLAN",
    },
    SheetProfile {
        layout_name: "CIV-01",
        page: PageKind::Default,
        scale: "1:500",
        title: "CIVIL SERVICING PLAN",
    },
    SheetProfile {
        layout_name: "ICI-01",
        page: PageKind::Default,
        scale: "N.T.S",
        title: "ICI METERING",
    },
];
