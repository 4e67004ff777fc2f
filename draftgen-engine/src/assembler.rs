//! 组装编排：装载、并入、预处理、底图、逐页调度、一次性写出。

use std::path::PathBuf;

use draftgen_config::AppConfig;
use draftgen_core::document::Document;
use draftgen_io::{DocumentLoader, DocumentSaver, JsonFacade};
use tracing::{debug, info, warn};

use crate::context_image::{generate_context_image, ContextImageParams, ContextImageRequest};
use crate::errors::AssemblyError;
use crate::importer::import_sheets;
use crate::layouts::{edit_layout, EditContext, LayoutRegistry};
use crate::provider::ImageProvider;
use crate::record::AttributeRecord;
use crate::substitute::replace_text_with_reference;

/// 单次组装运行的输入输出路径。
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    /// 额外生成一张宏观区位图。
    pub macro_image: bool,
}

/// 组装器：持有配置、处理器注册表与底图提供方，
/// 对一份模板文档执行完整组装并写出成品。
pub struct DrawingAssembler<'a> {
    config: &'a AppConfig,
    registry: LayoutRegistry,
    provider: &'a dyn ImageProvider,
}

impl<'a> DrawingAssembler<'a> {
    pub fn new(
        config: &'a AppConfig,
        registry: LayoutRegistry,
        provider: &'a dyn ImageProvider,
    ) -> Self {
        Self {
            config,
            registry,
            provider,
        }
    }

    /// 完整组装一份文档。任一步失败即中止，不写出部分结果。
    pub fn assemble(
        &self,
        record: &mut AttributeRecord,
        options: &AssemblerOptions,
    ) -> Result<(), AssemblyError> {
        let facade = JsonFacade::new();
        let mut doc = facade.load(&options.input)?;
        info!(input = %options.input.display(), "模板文档已装载");

        if let Some(library_path) = &self.config.paths.sheet_library {
            let library = facade.load(library_path)?;
            import_sheets(&library, &mut doc)?;
        }

        self.preprocess(&mut doc, record)?;

        if options.macro_image {
            generate_context_image(
                &mut doc,
                record,
                self.provider,
                &ContextImageRequest {
                    boundary_layer: &self.config.drawing.boundary_layer,
                    utm_zone: self.config.drawing.utm_zone,
                    references_dir: &self.config.paths.references_dir,
                    params: ContextImageParams::macro_context(),
                },
            )?;
        }
        // 项目范围图最后生成，视口参数以它为准
        generate_context_image(
            &mut doc,
            record,
            self.provider,
            &ContextImageRequest {
                boundary_layer: &self.config.drawing.boundary_layer,
                utm_zone: self.config.drawing.utm_zone,
                references_dir: &self.config.paths.references_dir,
                params: ContextImageParams::project_area(),
            },
        )?;

        let ctx = EditContext {
            template_type: &self.config.drawing.template_type,
            boundary_layer: &self.config.drawing.boundary_layer,
        };
        // 按注册顺序逐一调度，处理器绑定的图纸缺失即中止
        for handler in self.registry.handlers() {
            edit_layout(&mut doc, handler, record, &ctx)?;
        }

        facade.save(&doc, &options.output)?;
        info!(output = %options.output.display(), "组装完成");
        Ok(())
    }

    /// 逐页调度前的文档级预处理：
    /// - 写入总页数 `SHEET_MAX`；
    /// - 项目技术员姓名缩写为 `F.LASTNAME`；
    /// - 按工程师姓名导入签章块并替换占位文本。
    fn preprocess(
        &self,
        doc: &mut Document,
        record: &mut AttributeRecord,
    ) -> Result<(), AssemblyError> {
        record.set("SHEET_MAX", doc.layouts().count() as f64);

        if let Some(full_name) = record.get_display("PROJECT_TECHNICIAN") {
            record.set("PROJECT_TECHNICIAN", abbreviate_name(&full_name)?);
        }

        if let Some(engineer) = record.get_display("SIGNING_ENGINEER") {
            let stamp_block = stamp_block_name(&engineer);
            if let Some(library_path) = &self.config.paths.stamp_library {
                let library = JsonFacade::new().load(library_path)?;
                crate::importer::import_definition(&stamp_block, &library, doc)?;
            }
            if doc.block(&stamp_block).is_some() {
                replace_text_with_reference(doc, "ENGINEER STAMP", &stamp_block);
            } else {
                warn!(block = %stamp_block, "签章块不可用，保留占位文本");
            }
        }
        debug!("文档预处理完成");
        Ok(())
    }
}

/// `"Jane Doe"` → `"J.DOE"`。取首名首字母与第二段姓氏，全大写。
fn abbreviate_name(full_name: &str) -> Result<String, AssemblyError> {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [first, second, ..] => {
            let initial = first
                .chars()
                .next()
                .ok_or_else(|| AssemblyError::InvalidField {
                    key: "PROJECT_TECHNICIAN".to_string(),
                    value: full_name.to_string(),
                })?;
            Ok(format!(
                "{}.{}",
                initial.to_uppercase(),
                second.to_uppercase()
            ))
        }
        _ => Err(AssemblyError::InvalidField {
            key: "PROJECT_TECHNICIAN".to_string(),
            value: full_name.to_string(),
        }),
    }
}

/// 工程师姓名对应的签章块名：`"Jane Doe"` → `"ES_JANE_DOE"`。
fn stamp_block_name(engineer: &str) -> String {
    let joined: Vec<String> = engineer
        .split_whitespace()
        .map(str::to_uppercase)
        .collect();
    format!("ES_{}", joined.join("_"))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;

    use draftgen_config::PageKind;
    use draftgen_core::document::{
        Attribute, BlockDefinition, BlockReference, Document, Entity, Text,
    };
    use draftgen_core::geometry::{Point2, Vector2};
    use tempfile::tempdir;

    use super::*;
    use crate::layouts::LayoutHandler;
    use crate::provider::GeoBBox;
    use crate::record::AttrValue;

    #[derive(Clone, Copy)]
    struct PlanSheet {
        name: &'static str,
        page: PageKind,
    }

    impl LayoutHandler for PlanSheet {
        fn layout_name(&self) -> &str {
            self.name
        }

        fn attributes(&self, _record: &AttributeRecord) -> Vec<(&'static str, AttrValue)> {
            vec![("SCALE", AttrValue::from("N.T.S"))]
        }

        fn page_kind(&self) -> PageKind {
            self.page
        }
    }

    fn registry_for(sheets: &[PlanSheet]) -> LayoutRegistry {
        let mut registry = LayoutRegistry::new();
        for sheet in sheets {
            registry.register(Box::new(*sheet)).expect("register handler");
        }
        registry
    }

    fn cover_and_electrical() -> LayoutRegistry {
        registry_for(&[
            PlanSheet {
                name: "COV-01",
                page: PageKind::Cover,
            },
            PlanSheet {
                name: "ELE-01",
                page: PageKind::Default,
            },
        ])
    }

    struct StubProvider {
        calls: RefCell<usize>,
    }

    impl StubProvider {
        fn new() -> Self {
            Self {
                calls: RefCell::new(0),
            }
        }
    }

    impl ImageProvider for StubProvider {
        fn fetch(&self, _bbox: &GeoBBox, _w: u32, _h: u32) -> Result<Vec<u8>, AssemblyError> {
            *self.calls.borrow_mut() += 1;
            Ok(vec![1, 2, 3])
        }
    }

    const BOUNDARY_LAYER: &str = "_SP-BLK9-PR-PHASE LIMIT";

    fn title_attribute(tag: &str) -> Attribute {
        Attribute {
            tag: tag.to_string(),
            text: "-".to_string(),
            insert: Point2::new(0.0, 0.0),
            height: 2.5,
            rotation: 0.0,
            alignment: None,
            layer: "0".to_string(),
        }
    }

    fn title_block(tags: &[&str]) -> Entity {
        Entity::BlockReference(BlockReference {
            name: "TITLE".to_string(),
            insert: Point2::new(0.0, 0.0),
            scale: Vector2::new(1.0, 1.0),
            rotation: 0.0,
            attributes: tags.iter().map(|tag| title_attribute(tag)).collect(),
            layer: "0".to_string(),
        })
    }

    fn write_input(dir: &Path, facade: &JsonFacade) -> PathBuf {
        let mut doc = Document::new();
        doc.add_polyline(
            [
                Point2::new(630_000.0, 4_833_000.0),
                Point2::new(630_400.0, 4_833_000.0),
                Point2::new(630_400.0, 4_833_200.0),
                Point2::new(630_000.0, 4_833_200.0),
            ],
            true,
            BOUNDARY_LAYER,
        );
        doc.add_layout("Layout1");
        let path = dir.join("input.json");
        facade.save(&doc, &path).expect("write input");
        path
    }

    fn write_sheet_library(dir: &Path, facade: &JsonFacade) -> PathBuf {
        let mut library = Document::new();
        library.add_layout("COV-01");
        library.add_entity_to_layout(
            "COV-01",
            title_block(&["DRAWING_NUMBER", "SHEET", "SHEET_MAX", "PROJECT_TECHNICIAN"]),
        );
        library.add_entity_to_layout(
            "COV-01",
            Entity::Text(Text {
                insert: Point2::new(100.0, 100.0),
                content: "ENGINEER STAMP".to_string(),
                height: 2.5,
                rotation: 0.0,
                alignment: None,
                layer: "0".to_string(),
            }),
        );
        library.add_layout("ELE-01");
        library.add_entity_to_layout(
            "ELE-01",
            title_block(&["DRAWING_NUMBER", "SHEET", "SHEET_MAX", "SCALE"]),
        );
        let path = dir.join("sheets.json");
        facade.save(&library, &path).expect("write sheet library");
        path
    }

    fn write_stamp_library(dir: &Path, facade: &JsonFacade) -> PathBuf {
        let mut library = Document::new();
        library.add_block_definition(BlockDefinition {
            name: "ES_JANE_DOE".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![],
            attributes: vec![],
        });
        let path = dir.join("stamps.json");
        facade.save(&library, &path).expect("write stamp library");
        path
    }

    fn attribute_text(doc: &Document, layout: &str, tag: &str) -> String {
        doc.layout(layout)
            .unwrap()
            .entities()
            .find_map(|(_, entity)| match entity {
                Entity::BlockReference(reference) => reference
                    .attributes
                    .iter()
                    .find(|attr| attr.tag == tag)
                    .map(|attr| attr.text.clone()),
                _ => None,
            })
            .expect("attribute present")
    }

    #[test]
    fn full_assembly_produces_a_composite_document() {
        let dir = tempdir().expect("tempdir");
        let facade = JsonFacade::new();
        let input = write_input(dir.path(), &facade);
        let output = dir.path().join("out.json");

        let mut config = AppConfig::default();
        config.paths.references_dir = dir.path().join("references");
        config.paths.sheet_library = Some(write_sheet_library(dir.path(), &facade));
        config.paths.stamp_library = Some(write_stamp_library(dir.path(), &facade));

        let provider = StubProvider::new();
        let assembler = DrawingAssembler::new(&config, cover_and_electrical(), &provider);

        let mut record = AttributeRecord::new();
        record.set("PROJECT_WORK_ORDER", "123456");
        record.set("PROJECT_TECHNICIAN", "John Smith");
        record.set("SIGNING_ENGINEER", "Jane Doe");

        assembler
            .assemble(
                &mut record,
                &AssemblerOptions {
                    input: input.clone(),
                    output: output.clone(),
                    macro_image: true,
                },
            )
            .expect("assembly succeeds");

        let result = facade.load(&output).expect("output readable");

        // 占位布局被真实图纸取代，页签次序保持
        assert_eq!(result.layout_names_in_tab_order(), vec!["COV-01", "ELE-01"]);

        // 图号、页码与总页数
        assert_eq!(attribute_text(&result, "ELE-01", "DRAWING_NUMBER"), "123456-ELE-01");
        assert_eq!(attribute_text(&result, "COV-01", "SHEET"), "1");
        assert_eq!(attribute_text(&result, "ELE-01", "SHEET"), "2");
        assert_eq!(attribute_text(&result, "ELE-01", "SHEET_MAX"), "2");
        assert_eq!(
            attribute_text(&result, "COV-01", "PROJECT_TECHNICIAN"),
            "J.SMITH"
        );

        // 签章占位文本换成了块参照
        let cover = result.layout("COV-01").unwrap();
        assert!(cover.entities().all(|(_, entity)| !matches!(
            entity,
            Entity::Text(text) if text.content == "ENGINEER STAMP"
        )));
        assert!(cover.entities().any(|(_, entity)| matches!(
            entity,
            Entity::BlockReference(reference) if reference.name == "ES_JANE_DOE"
        )));

        // 每页一个视口
        for layout_name in ["COV-01", "ELE-01"] {
            let count = result
                .layout(layout_name)
                .unwrap()
                .entities()
                .filter(|(_, entity)| matches!(entity, Entity::Viewport(_)))
                .count();
            assert_eq!(count, 1, "layout {layout_name}");
        }

        // 宏观图 + 项目范围图各取一次
        assert_eq!(*provider.calls.borrow(), 2);
        assert!(config.paths.references_dir.join("project_area.png").exists());
        assert!(config.paths.references_dir.join("macro_context.png").exists());

        // 模型空间带底图与边界描线
        assert!(result
            .modelspace()
            .any(|(_, entity)| matches!(entity, Entity::RasterImage(_))));
    }

    #[test]
    fn failing_sheet_aborts_without_writing_output() {
        let dir = tempdir().expect("tempdir");
        let facade = JsonFacade::new();
        let input = write_input(dir.path(), &facade);
        let output = dir.path().join("out.json");

        let mut config = AppConfig::default();
        config.paths.references_dir = dir.path().join("references");
        config.paths.sheet_library = Some(write_sheet_library(dir.path(), &facade));

        let provider = StubProvider::new();
        let assembler = DrawingAssembler::new(&config, cover_and_electrical(), &provider);

        // 缺少 PROJECT_WORK_ORDER，首页编辑即失败
        let mut record = AttributeRecord::new();
        let err = assembler
            .assemble(
                &mut record,
                &AssemblerOptions {
                    input,
                    output: output.clone(),
                    macro_image: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::MissingField(_)));
        assert!(!output.exists());
    }

    #[test]
    fn handler_bound_to_missing_sheet_aborts_the_run() {
        let dir = tempdir().expect("tempdir");
        let facade = JsonFacade::new();
        // 模板只有边界与占位布局，注册的处理器没有可编辑的图纸
        let input = write_input(dir.path(), &facade);
        let output = dir.path().join("out.json");

        let mut config = AppConfig::default();
        config.paths.references_dir = dir.path().join("references");

        let provider = StubProvider::new();
        let assembler = DrawingAssembler::new(
            &config,
            LayoutRegistry::with_builtin().expect("builtin registry"),
            &provider,
        );

        let mut record = AttributeRecord::new();
        record.set("PROJECT_WORK_ORDER", "123456");

        let err = assembler
            .assemble(
                &mut record,
                &AssemblerOptions {
                    input,
                    output: output.clone(),
                    macro_image: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, AssemblyError::LayoutNotFound(name) if name == "COV-01"));
        assert!(!output.exists());
    }

    #[test]
    fn technician_names_are_abbreviated() {
        assert_eq!(abbreviate_name("John Smith").unwrap(), "J.SMITH");
        assert_eq!(abbreviate_name("Mary Anne van Dyk").unwrap(), "M.ANNE");
        assert!(matches!(
            abbreviate_name("Cher"),
            Err(AssemblyError::InvalidField { .. })
        ));
    }

    #[test]
    fn stamp_block_names_follow_the_library_convention() {
        assert_eq!(stamp_block_name("Jane Doe"), "ES_JANE_DOE");
        assert_eq!(stamp_block_name("  jean  luc  picard "), "ES_JEAN_LUC_PICARD");
    }
}
