pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，模型空间与图纸空间共用。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。提供基础运算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 二维轴对齐包围盒。空盒以 min > max 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: DVec2,
        max: DVec2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self {
                min: min.0,
                max: max.0,
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: DVec2::splat(f64::INFINITY),
                max: DVec2::splat(f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x > self.max.x || self.min.y > self.max.y
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            Point2(self.min)
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            Point2(self.max)
        }

        pub fn include_point(&mut self, point: Point2) {
            let p = point.0;
            self.min = self.min.min(p);
            self.max = self.max.max(p);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            Point2((self.min + self.max) * 0.5)
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x - self.min.x
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y - self.min.y
        }

        /// 按 X/Y 两个方向分别向外扩张。
        pub fn expand(&self, pad_x: f64, pad_y: f64) -> Bounds2D {
            Bounds2D {
                min: DVec2::new(self.min.x - pad_x, self.min.y - pad_y),
                max: DVec2::new(self.max.x + pad_x, self.max.y + pad_y),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn bounds_accumulate_points() {
            let mut bounds = Bounds2D::empty();
            assert!(bounds.is_empty());
            bounds.include_point(Point2::new(1.0, 2.0));
            bounds.include_point(Point2::new(-3.0, 5.0));
            assert!(!bounds.is_empty());
            assert_eq!(bounds.min().x(), -3.0);
            assert_eq!(bounds.max().y(), 5.0);
            assert!((bounds.center().x() - (-1.0)).abs() < 1e-12);
        }

        #[test]
        fn bounds_expand_is_symmetric() {
            let bounds = Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(10.0, 4.0));
            let expanded = bounds.expand(2.0, 1.0);
            assert_eq!(expanded.min().x(), -2.0);
            assert_eq!(expanded.min().y(), -1.0);
            assert_eq!(expanded.max().x(), 12.0);
            assert_eq!(expanded.max().y(), 5.0);
            assert_eq!(expanded.width(), 14.0);
            assert_eq!(expanded.height(), 6.0);
        }
    }
}

pub mod document {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    pub const DEFAULT_LAYER_COLOR: i16 = 7;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
        pub color: i16,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
                color: DEFAULT_LAYER_COLOR,
            }
        }

        #[inline]
        pub fn with_color(name: impl Into<String>, color: i16) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
                color,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Polyline(Polyline),
        Text(Text),
        BlockReference(BlockReference),
        RasterImage(RasterImage),
        Viewport(Viewport),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Text(text) => &text.layer,
                Entity::BlockReference(reference) => &reference.layer,
                Entity::RasterImage(image) => &image.layer,
                Entity::Viewport(viewport) => &viewport.layer,
            }
        }

        /// 计算实体的 2D 轴对齐范围。文本与块参照退化为插入点，
        /// 视口属于图纸空间，不参与模型空间范围。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Entity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Entity::Circle(circle) => {
                    let radius = circle.radius.abs();
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Entity::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.position);
                    }
                }
                Entity::Text(text) => {
                    bounds.include_point(text.insert);
                    if let Some(alignment) = text.alignment {
                        bounds.include_point(alignment);
                    }
                }
                Entity::BlockReference(reference) => {
                    bounds.include_point(reference.insert);
                    for attr in &reference.attributes {
                        bounds.include_point(attr.insert);
                        if let Some(alignment) = attr.alignment {
                            bounds.include_point(alignment);
                        }
                    }
                }
                Entity::RasterImage(image) => {
                    let origin = image.insert.as_vec2();
                    let u = image.u_vector.as_vec2();
                    let v = image.v_vector.as_vec2();
                    let width = image.image_size.x();
                    let height = image.image_size.y();
                    let corners = [
                        Point2::new(0.0, 0.0),
                        Point2::new(width, 0.0),
                        Point2::new(0.0, height),
                        Point2::new(width, height),
                    ];
                    for corner in corners {
                        let local = corner.as_vec2();
                        let world = origin + u * local.x + v * local.y;
                        bounds.include_point(Point2::from_vec(world));
                    }
                }
                Entity::Viewport(_) => {}
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 单行文本。`alignment` 为对齐点（如 MIDDLE_CENTER），
    /// 占位文本替换时以对齐点为锚点。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub alignment: Option<Point2>,
        pub layer: String,
    }

    /// 块参照上的可编辑属性槽。同一参照内 tag 唯一。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Attribute {
        pub tag: String,
        pub text: String,
        pub insert: Point2,
        pub height: f64,
        pub rotation: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub alignment: Option<Point2>,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub scale: Vector2,
        pub rotation: f64,
        pub attributes: Vec<Attribute>,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        pub base_point: Point2,
        pub entities: Vec<Entity>,
        pub attributes: Vec<AttributeDefinition>,
    }

    impl BlockDefinition {
        /// 列出该定义内部引用到的其他块名称（不去重）。
        pub fn referenced_blocks(&self) -> impl Iterator<Item = &str> {
            self.entities.iter().filter_map(|entity| match entity {
                Entity::BlockReference(reference) => Some(reference.name.as_str()),
                _ => None,
            })
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AttributeDefinition {
        pub tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub prompt: Option<String>,
        pub default_text: String,
        pub insert: Point2,
        pub height: f64,
        pub rotation: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub alignment: Option<Point2>,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RasterImageDefinition {
        pub handle: String,
        pub file_path: String,
        pub image_size_pixels: Vector2,
    }

    /// 栅格图像放置。u/v 向量为单个像素在世界坐标中的跨度。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RasterImage {
        pub layer: String,
        pub image_def_handle: String,
        pub insert: Point2,
        pub u_vector: Vector2,
        pub v_vector: Vector2,
        pub image_size: Vector2,
    }

    /// 图纸空间视口：纸面矩形加上它所展示的模型空间窗口。
    /// 可见宽度由视口纵横比隐含决定。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Viewport {
        pub layer: String,
        pub center: Point2,
        pub size: Vector2,
        pub view_center: Point2,
        pub view_height: f64,
    }

    /// 命名图纸（布局）。按插入顺序保持页签次序。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layout {
        name: String,
        entities: Vec<(EntityId, Entity)>,
    }

    impl Layout {
        #[inline]
        pub fn name(&self) -> &str {
            &self.name
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut (EntityId, Entity)> {
            self.entities.iter_mut()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        /// 删除指定实体并返回它，不存在时返回 None。
        pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
            let index = self
                .entities
                .iter()
                .position(|(entity_id, _)| *entity_id == id)?;
            Some(self.entities.remove(index).1)
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        modelspace: Vec<(EntityId, Entity)>,
        layouts: Vec<Layout>,
        blocks: HashMap<String, BlockDefinition>,
        image_definitions: HashMap<String, RasterImageDefinition>,
        next_entity_id: u64,
        next_image_handle: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        /// 创建指定颜色的图层。图层已存在时不改动现有颜色。
        pub fn ensure_layer_with_color(&mut self, name: impl AsRef<str>, color: i16) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::with_color(key, color));
        }

        #[inline]
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.get(name)
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.modelspace
                .push((id, Entity::Line(Line { start, end, layer })));
            id
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.modelspace.push((
                id,
                Entity::Circle(Circle {
                    center,
                    radius,
                    layer,
                }),
            ));
            id
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            self.add_polyline_with_vertices(collected, is_closed, layer)
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let collected: Vec<PolylineVertex> = vertices.into_iter().collect();
            let id = self.next_id();
            self.modelspace.push((
                id,
                Entity::Polyline(Polyline {
                    vertices: collected,
                    is_closed,
                    layer,
                }),
            ));
            id
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.modelspace.push((
                id,
                Entity::Text(Text {
                    insert,
                    content: content.into(),
                    height,
                    rotation,
                    alignment: None,
                    layer,
                }),
            ));
            id
        }

        /// 向模型空间放置块参照。未显式给出属性时，
        /// 从块定义的属性定义生成默认属性槽。
        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            attributes: Vec<Attribute>,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let name = name.into();
            let resolved = self.resolve_attributes(&name, attributes);
            for attribute in &resolved {
                self.ensure_layer(&attribute.layer);
            }
            let id = self.next_id();
            self.modelspace.push((
                id,
                Entity::BlockReference(BlockReference {
                    name,
                    insert,
                    scale,
                    rotation,
                    attributes: resolved,
                    layer,
                }),
            ));
            id
        }

        fn resolve_attributes(&self, block_name: &str, attributes: Vec<Attribute>) -> Vec<Attribute> {
            if !attributes.is_empty() {
                return attributes;
            }
            self.block(block_name)
                .map(|definition| {
                    definition
                        .attributes
                        .iter()
                        .map(|def| Attribute {
                            tag: def.tag.clone(),
                            text: def.default_text.clone(),
                            insert: def.insert,
                            height: def.height,
                            rotation: def.rotation,
                            alignment: def.alignment,
                            layer: def.layer.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        }

        pub fn add_raster_image_definition(
            &mut self,
            file_path: impl Into<String>,
            image_size_pixels: Vector2,
        ) -> String {
            let handle = format!("IMG-{}", self.next_image_handle);
            self.next_image_handle += 1;
            self.image_definitions.insert(
                handle.clone(),
                RasterImageDefinition {
                    handle: handle.clone(),
                    file_path: file_path.into(),
                    image_size_pixels,
                },
            );
            handle
        }

        #[inline]
        pub fn raster_image_definition(&self, handle: &str) -> Option<&RasterImageDefinition> {
            self.image_definitions.get(handle)
        }

        #[inline]
        pub fn raster_image_definitions(
            &self,
        ) -> impl Iterator<Item = (&String, &RasterImageDefinition)> {
            self.image_definitions.iter()
        }

        pub fn add_raster_image(
            &mut self,
            layer: impl Into<String>,
            image_def_handle: impl Into<String>,
            insert: Point2,
            u_vector: Vector2,
            v_vector: Vector2,
            image_size: Vector2,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.modelspace.push((
                id,
                Entity::RasterImage(RasterImage {
                    layer,
                    image_def_handle: image_def_handle.into(),
                    insert,
                    u_vector,
                    v_vector,
                    image_size,
                }),
            ));
            id
        }

        pub fn add_block_definition(&mut self, definition: BlockDefinition) {
            for entity in &definition.entities {
                self.ensure_layer(entity.layer_name());
            }
            for attr in &definition.attributes {
                self.ensure_layer(&attr.layer);
            }
            self.blocks.insert(definition.name.clone(), definition);
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name)
        }

        #[inline]
        pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
            self.blocks.values()
        }

        /// 追加空布局并返回其可变引用。同名布局已存在时复用现有布局。
        pub fn add_layout(&mut self, name: impl Into<String>) -> &mut Layout {
            let name = name.into();
            if let Some(index) = self.layouts.iter().position(|layout| layout.name == name) {
                return &mut self.layouts[index];
            }
            self.layouts.push(Layout {
                name,
                entities: Vec::new(),
            });
            self.layouts.last_mut().unwrap()
        }

        /// 按页签次序迭代所有布局。
        #[inline]
        pub fn layouts(&self) -> impl Iterator<Item = &Layout> {
            self.layouts.iter()
        }

        #[inline]
        pub fn layout(&self, name: &str) -> Option<&Layout> {
            self.layouts.iter().find(|layout| layout.name == name)
        }

        #[inline]
        pub fn layout_mut(&mut self, name: &str) -> Option<&mut Layout> {
            self.layouts.iter_mut().find(|layout| layout.name == name)
        }

        /// 返回布局在页签次序中的位置（0 起）。
        #[inline]
        pub fn layout_position(&self, name: &str) -> Option<usize> {
            self.layouts.iter().position(|layout| layout.name == name)
        }

        #[inline]
        pub fn layout_names_in_tab_order(&self) -> Vec<&str> {
            self.layouts.iter().map(|layout| layout.name.as_str()).collect()
        }

        pub fn remove_layout(&mut self, name: &str) -> bool {
            match self.layout_position(name) {
                Some(index) => {
                    self.layouts.remove(index);
                    true
                }
                None => false,
            }
        }

        /// 向指定布局追加实体。布局不存在时返回 None。
        pub fn add_entity_to_layout(
            &mut self,
            layout_name: &str,
            entity: Entity,
        ) -> Option<EntityId> {
            self.ensure_layer(entity.layer_name().to_string());
            if let Entity::BlockReference(reference) = &entity {
                for attribute in &reference.attributes {
                    self.ensure_layer(&attribute.layer);
                }
            }
            let id = self.next_id();
            let layout = self
                .layouts
                .iter_mut()
                .find(|layout| layout.name == layout_name)?;
            layout.entities.push((id, entity));
            Some(id)
        }

        /// 在布局上创建视口实体。
        pub fn add_viewport(&mut self, layout_name: &str, viewport: Viewport) -> Option<EntityId> {
            self.add_entity_to_layout(layout_name, Entity::Viewport(viewport))
        }

        #[inline]
        pub fn modelspace(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.modelspace.iter()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.modelspace
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        /// 模型空间所有实体的总包围盒。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.modelspace {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

}
