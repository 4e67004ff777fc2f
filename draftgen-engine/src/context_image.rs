//! 项目范围底图生成：取边界、外扩、投影换算、取图、落图并套绘边界。

use std::fs;
use std::path::{Path, PathBuf};

use draftgen_core::document::{Document, Entity};
use draftgen_core::geometry::{Bounds2D, Point2, Vector2};
use tracing::{debug, info};

use crate::errors::AssemblyError;
use crate::geo::utm_to_lonlat;
use crate::provider::{GeoBBox, ImageProvider};
use crate::record::AttributeRecord;
use crate::viewport::VIEW_MARGIN_FACTOR;

/// 提供方单边像素上限。
pub const MAX_IMAGE_DIMENSION_PX: u32 = 1280;

/// 底图插入点与既有模型内容之间的净距。
pub const ANCHOR_CLEARANCE: f64 = 100.0;

/// 叠加在底图上的边界描线所在图层，红色。
pub const MAP_BOUNDARY_LAYER: &str = "MAP_BOUNDARY";

/// 底图栅格实体所在图层。
pub const CONTEXT_IMAGE_LAYER: &str = "CONTEXT_IMAGE";

/// 一类底图的外扩与落盘参数。
#[derive(Debug, Clone)]
pub struct ContextImageParams {
    pub pad_x: f64,
    pub pad_y: f64,
    pub file_name: String,
}

impl ContextImageParams {
    /// 项目范围图：贴近边界的常规外扩。
    pub fn project_area() -> Self {
        Self {
            pad_x: 100.0,
            pad_y: 50.0,
            file_name: "project_area.png".to_string(),
        }
    }

    /// 宏观区位图：更大的外扩以展示周边街区。
    pub fn macro_context() -> Self {
        Self {
            pad_x: 200.0,
            pad_y: 100.0,
            file_name: "macro_context.png".to_string(),
        }
    }
}

/// 一次底图生成的环境输入。
#[derive(Debug)]
pub struct ContextImageRequest<'a> {
    pub boundary_layer: &'a str,
    pub utm_zone: u8,
    pub references_dir: &'a Path,
    pub params: ContextImageParams,
}

/// 生成结果：落盘路径、插入锚点与请求像素尺寸。
#[derive(Debug)]
pub struct ContextImage {
    pub image_path: PathBuf,
    pub anchor: Point2,
    pub pixel_size: (u32, u32),
}

/// 把平面宽高折算为不超过上限、保持纵横比的整数像素尺寸。
pub fn pixel_dimensions(width: f64, height: f64) -> (u32, u32) {
    let max = f64::from(MAX_IMAGE_DIMENSION_PX);
    if width >= height {
        let h = (max * height / width).round().max(1.0);
        (MAX_IMAGE_DIMENSION_PX, h as u32)
    } else {
        let w = (max * width / height).round().max(1.0);
        (w as u32, MAX_IMAGE_DIMENSION_PX)
    }
}

/// 在模型空间查找边界图层上的闭合多段线并返回顶点。
fn boundary_vertices(doc: &Document, boundary_layer: &str) -> Result<Vec<Point2>, AssemblyError> {
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
    Ok(polyline
        .vertices
        .iter()
        .map(|vertex| vertex.position)
        .collect())
}

/// 完整底图管线。执行成功后：
/// - 底图字节已写入 references 目录下的文件；
/// - 栅格图像以真实物理尺寸插入模型空间，不与既有内容重叠；
/// - 边界描线以闭合多段线叠绘在图像之上；
/// - 共享记录写入 `PA_MSP_CENTER_POINT` 与 `PA_MSP_HEIGHT` 供视口使用。
pub fn generate_context_image(
    doc: &mut Document,
    record: &mut AttributeRecord,
    provider: &dyn ImageProvider,
    request: &ContextImageRequest<'_>,
) -> Result<ContextImage, AssemblyError> {
    let vertices = boundary_vertices(doc, request.boundary_layer)?;
    let mut boundary = Bounds2D::empty();
    for point in &vertices {
        boundary.include_point(*point);
    }
    let expanded = boundary.expand(request.params.pad_x, request.params.pad_y);

    // 平面角点换算到经纬度
    let (min_lon, min_lat) =
        utm_to_lonlat(expanded.min().x(), expanded.min().y(), request.utm_zone, true);
    let (max_lon, max_lat) =
        utm_to_lonlat(expanded.max().x(), expanded.max().y(), request.utm_zone, true);
    let bbox = GeoBBox {
        min_lon,
        min_lat,
        max_lon,
        max_lat,
    };

    let phys_width = expanded.width();
    let phys_height = expanded.height();
    let (px_width, px_height) = pixel_dimensions(phys_width, phys_height);
    debug!(
        bbox = %bbox.to_query(),
        px_width,
        px_height,
        "底图请求参数已确定"
    );

    let bytes = provider.fetch(&bbox, px_width, px_height)?;
    fs::create_dir_all(request.references_dir).map_err(|source| AssemblyError::ImageWrite {
        path: request.references_dir.to_path_buf(),
        source,
    })?;
    let image_path = request.references_dir.join(&request.params.file_name);
    fs::write(&image_path, &bytes).map_err(|source| AssemblyError::ImageWrite {
        path: image_path.clone(),
        source,
    })?;

    // 插入锚点：既有模型内容包围盒的右上角外移一段净距
    let anchor = match doc.bounds() {
        Some(bounds) => Point2::new(
            bounds.max().x() + ANCHOR_CLEARANCE,
            bounds.max().y() + ANCHOR_CLEARANCE,
        ),
        None => Point2::new(0.0, 0.0),
    };

    let handle = doc.add_raster_image_definition(
        image_path.to_string_lossy().into_owned(),
        Vector2::new(f64::from(px_width), f64::from(px_height)),
    );
    doc.ensure_layer(CONTEXT_IMAGE_LAYER);
    doc.add_raster_image(
        CONTEXT_IMAGE_LAYER,
        handle,
        anchor,
        Vector2::new(phys_width / f64::from(px_width), 0.0),
        Vector2::new(0.0, phys_height / f64::from(px_height)),
        Vector2::new(f64::from(px_width), f64::from(px_height)),
    );

    // 边界点从原位仿射搬到图像局部坐标。比例单独列出，
    // 投影折算一旦改变纵横比即可在此察觉。
    let scale_x = phys_width / expanded.width();
    let scale_y = phys_height / expanded.height();
    let mapped: Vec<Point2> = vertices
        .iter()
        .map(|point| {
            Point2::new(
                anchor.x() + (point.x() - expanded.min().x()) * scale_x,
                anchor.y() + (point.y() - expanded.min().y()) * scale_y,
            )
        })
        .collect();
    let mut overlay = Bounds2D::empty();
    for point in &mapped {
        overlay.include_point(*point);
    }
    doc.ensure_layer_with_color(MAP_BOUNDARY_LAYER, 1);
    doc.add_polyline(mapped, true, MAP_BOUNDARY_LAYER);

    record.set("PA_MSP_CENTER_POINT", overlay.center());
    record.set("PA_MSP_HEIGHT", overlay.height() * VIEW_MARGIN_FACTOR);

    info!(path = %image_path.display(), px_width, px_height, "底图生成完成");
    Ok(ContextImage {
        image_path,
        anchor,
        pixel_size: (px_width, px_height),
    })
}
