//! 占位属性替换：按标签名把共享记录里的值写进块参照的属性槽。

use draftgen_core::document::{BlockReference, Document, Entity, Layout};
use draftgen_core::geometry::Vector2;
use tracing::{debug, info};

use crate::record::AttributeRecord;

/// 扫描图纸内全部块参照，凡属性槽标签在记录中存在即覆写其文本。
/// 无匹配键的属性槽保持原值（模板可带有与记录无关的槽）。
/// 同一记录重复执行结果不变。
pub fn substitute(layout: &mut Layout, record: &AttributeRecord) {
    for (_, entity) in layout.entities_mut() {
        let Entity::BlockReference(reference) = entity else {
            continue;
        };
        for attribute in &mut reference.attributes {
            if let Some(value) = record.get(&attribute.tag) {
                attribute.text = value.display();
                debug!(tag = %attribute.tag, text = %attribute.text, "属性槽已更新");
            }
        }
    }
}

/// 把所有图纸中内容与 `search_text` 完全相等的文本标签替换为
/// `definition_name` 的块参照。锚点取文本的对齐点（缺失时退化为插入点），
/// 旋转角原样保留。没有匹配时静默返回。
pub fn replace_text_with_reference(doc: &mut Document, search_text: &str, definition_name: &str) {
    let layout_names: Vec<String> = doc
        .layouts()
        .map(|layout| layout.name().to_string())
        .collect();

    let mut replaced = 0usize;
    for name in layout_names {
        let matches: Vec<_> = doc
            .layout(&name)
            .into_iter()
            .flat_map(|layout| layout.entities())
            .filter_map(|(id, entity)| match entity {
                Entity::Text(text) if text.content == search_text => {
                    Some((*id, text.alignment.unwrap_or(text.insert), text.rotation))
                }
                _ => None,
            })
            .collect();

        for (id, anchor, rotation) in matches {
            doc.add_entity_to_layout(
                &name,
                Entity::BlockReference(BlockReference {
                    name: definition_name.to_string(),
                    insert: anchor,
                    scale: Vector2::new(1.0, 1.0),
                    rotation,
                    attributes: Vec::new(),
                    layer: "0".to_string(),
                }),
            );
            if let Some(layout) = doc.layout_mut(&name) {
                layout.remove_entity(id);
            }
            debug!(layout = %name, block = definition_name, x = anchor.x(), y = anchor.y(), "文本占位已替换为块参照");
            replaced += 1;
        }
    }
    info!(search_text, block = definition_name, replaced, "占位文本替换完成");
}

#[cfg(test)]
mod tests {
    use draftgen_core::document::{Attribute, BlockDefinition, Document, Entity, Text};
    use draftgen_core::geometry::{Point2, Vector2};

    use super::*;
    use crate::record::AttributeRecord;

    fn document_with_title_block() -> Document {
        let mut doc = Document::new();
        doc.add_layout("ELE-01");
        doc.add_entity_to_layout(
            "ELE-01",
            Entity::BlockReference(BlockReference {
                name: "TITLE".to_string(),
                insert: Point2::new(0.0, 0.0),
                scale: Vector2::new(1.0, 1.0),
                rotation: 0.0,
                attributes: vec![
                    Attribute {
                        tag: "DRAWING_NUMBER".to_string(),
                        text: "-".to_string(),
                        insert: Point2::new(10.0, 10.0),
                        height: 2.5,
                        rotation: 0.0,
                        alignment: None,
                        layer: "0".to_string(),
                    },
                    Attribute {
                        tag: "UNRELATED".to_string(),
                        text: "keep me".to_string(),
                        insert: Point2::new(10.0, 5.0),
                        height: 2.5,
                        rotation: 0.0,
                        alignment: None,
                        layer: "0".to_string(),
                    },
                ],
                layer: "0".to_string(),
            }),
        );
        doc
    }

    fn attribute_texts(doc: &Document, layout: &str) -> Vec<String> {
        doc.layout(layout)
            .unwrap()
            .entities()
            .filter_map(|(_, entity)| match entity {
                Entity::BlockReference(reference) => Some(
                    reference
                        .attributes
                        .iter()
                        .map(|attr| attr.text.clone())
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn substitution_rewrites_matching_tags_only() {
        let mut doc = document_with_title_block();
        let mut record = AttributeRecord::new();
        record.set("DRAWING_NUMBER", "123456-ELE-01");

        substitute(doc.layout_mut("ELE-01").unwrap(), &record);
        let texts = attribute_texts(&doc, "ELE-01");
        assert_eq!(texts, vec!["123456-ELE-01", "keep me"]);
    }

    #[test]
    fn substitution_is_idempotent() {
        let mut doc = document_with_title_block();
        let mut record = AttributeRecord::new();
        record.set("DRAWING_NUMBER", "123456-ELE-01");

        substitute(doc.layout_mut("ELE-01").unwrap(), &record);
        let once = attribute_texts(&doc, "ELE-01");
        substitute(doc.layout_mut("ELE-01").unwrap(), &record);
        let twice = attribute_texts(&doc, "ELE-01");
        assert_eq!(once, twice);
    }

    #[test]
    fn text_placeholder_is_replaced_at_alignment_point() {
        let mut doc = Document::new();
        doc.add_block_definition(BlockDefinition {
            name: "ES_JANE_DOE".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![],
            attributes: vec![],
        });
        doc.add_layout("COV-01");
        doc.add_entity_to_layout(
            "COV-01",
            Entity::Text(Text {
                insert: Point2::new(0.0, 0.0),
                content: "ENGINEER STAMP".to_string(),
                height: 2.5,
                rotation: 0.5,
                alignment: Some(Point2::new(50.0, 60.0)),
                layer: "0".to_string(),
            }),
        );
        doc.add_entity_to_layout(
            "COV-01",
            Entity::Text(Text {
                insert: Point2::new(5.0, 5.0),
                content: "SOME OTHER LABEL".to_string(),
                height: 2.5,
                rotation: 0.0,
                alignment: None,
                layer: "0".to_string(),
            }),
        );

        replace_text_with_reference(&mut doc, "ENGINEER STAMP", "ES_JANE_DOE");

        let layout = doc.layout("COV-01").unwrap();
        let mut texts = 0;
        let mut references = 0;
        for (_, entity) in layout.entities() {
            match entity {
                Entity::Text(text) => {
                    texts += 1;
                    assert_eq!(text.content, "SOME OTHER LABEL");
                }
                Entity::BlockReference(reference) => {
                    references += 1;
                    assert_eq!(reference.name, "ES_JANE_DOE");
                    // 锚点必须是对齐点而不是原始插入点
                    assert_eq!(reference.insert.x(), 50.0);
                    assert_eq!(reference.insert.y(), 60.0);
                    assert_eq!(reference.rotation, 0.5);
                }
                _ => {}
            }
        }
        assert_eq!(texts, 1);
        assert_eq!(references, 1);
    }

    #[test]
    fn replacement_with_zero_matches_is_a_noop() {
        let mut doc = Document::new();
        doc.add_layout("COV-01");
        replace_text_with_reference(&mut doc, "ENGINEER STAMP", "ES_JANE_DOE");
        assert_eq!(doc.layout("COV-01").unwrap().entities().count(), 0);
    }
}
