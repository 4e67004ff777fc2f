//! 视口几何：从模型空间边界推算视图框，并在图纸空间落下视口。

use draftgen_config::ViewportEntry;
use draftgen_core::document::{Document, Entity, EntityId, Viewport};
use draftgen_core::geometry::{Bounds2D, Point2, Vector2};
use tracing::debug;

use crate::errors::AssemblyError;

/// 视图高度相对边界包围盒的外扩系数，让边界四周留出呼吸空间。
pub const VIEW_MARGIN_FACTOR: f64 = 1.15;

/// 视口实体所在的图层名。
pub const VIEWPORT_LAYER: &str = "VIEWPORTS";

/// 一次视口放置所需的全部参数：纸面位置与模型视图框。
#[derive(Debug, Clone, Copy)]
pub struct ViewportPlacement {
    pub paper_center: Point2,
    pub paper_size: Vector2,
    pub view_center: Point2,
    pub view_height: f64,
}

impl ViewportPlacement {
    /// 以纸面配置为框、模型包围盒为内容，算出恰好容纳内容的视图框。
    /// 高度取「包围盒高度」与「包围盒宽度按纸面纵横比折算的高度」
    /// 中的较大者，再乘外扩系数，保证宽高两个方向都不出框。
    pub fn fit(entry: &ViewportEntry, view_center: Point2, content: &Bounds2D) -> Self {
        let aspect = entry.paper_height / entry.paper_width;
        let height_for_width = content.width() * aspect;
        let view_height = content.height().max(height_for_width) * VIEW_MARGIN_FACTOR;
        Self {
            paper_center: Point2::new(entry.paper_center.0, entry.paper_center.1),
            paper_size: Vector2::new(entry.paper_width, entry.paper_height),
            view_center,
            view_height,
        }
    }

    /// 直接给定视图中心与视图高度（例如来自共享记录）时的放置。
    pub fn with_view(entry: &ViewportEntry, view_center: Point2, view_height: f64) -> Self {
        Self {
            paper_center: Point2::new(entry.paper_center.0, entry.paper_center.1),
            paper_size: Vector2::new(entry.paper_width, entry.paper_height),
            view_center,
            view_height,
        }
    }
}

/// 在模型空间查找指定图层上的边界多段线并返回其包围盒。
/// 同层存在多条时取第一条闭合多段线。
pub fn boundary_bounds(doc: &Document, boundary_layer: &str) -> Result<Bounds2D, AssemblyError> {
    let polyline = doc
        .modelspace()
        .filter_map(|(_, entity)| match entity {
            Entity::Polyline(polyline) if polyline.layer == boundary_layer => Some(polyline),
            _ => None,
        })
        .find(|polyline| polyline.is_closed)
        .ok_or_else(|| AssemblyError::BoundaryNotFound(boundary_layer.to_string()))?;

    if polyline.vertices.is_empty() {
        return Err(AssemblyError::EmptyGeometry);
    }
    let mut bounds = Bounds2D::empty();
    for vertex in &polyline.vertices {
        bounds.include_point(vertex.position);
    }
    Ok(bounds)
}

/// 把视口落进指定图纸的图纸空间。
pub fn place_viewport(
    doc: &mut Document,
    layout_name: &str,
    placement: ViewportPlacement,
) -> Result<EntityId, AssemblyError> {
    let viewport = Viewport {
        layer: VIEWPORT_LAYER.to_string(),
        center: placement.paper_center,
        size: placement.paper_size,
        view_center: placement.view_center,
        view_height: placement.view_height,
    };
    let id = doc
        .add_viewport(layout_name, viewport)
        .ok_or_else(|| AssemblyError::LayoutNotFound(layout_name.to_string()))?;
    debug!(
        layout = layout_name,
        view_height = placement.view_height,
        "视口已放置"
    );
    Ok(id)
}
