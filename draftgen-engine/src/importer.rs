//! 跨文档资源并入：块定义按依赖先序导入，图纸按页签次序整体并入。

use std::collections::HashSet;

use draftgen_core::document::Document;
use tracing::{debug, info, warn};

use crate::errors::AssemblyError;

/// 模板新建时自带的空白占位布局名。导入真实图纸后会被移除。
pub const DEFAULT_PLACEHOLDER_LAYOUT: &str = "Layout1";

/// 将 `name` 指定的块定义连同其传递依赖从 source 复制到 target。
/// 冲突策略为先到者胜：target 已有同名定义时跳过并视为成功。
pub fn import_definition(
    name: &str,
    source: &Document,
    target: &mut Document,
) -> Result<(), AssemblyError> {
    if target.block(name).is_some() {
        debug!(block = name, "块定义已存在于目标文档，跳过导入");
        return Ok(());
    }
    if source.block(name).is_none() {
        return Err(AssemblyError::DefinitionNotFound(name.to_string()));
    }

    for dep in dependency_order(name, source) {
        if target.block(&dep).is_some() {
            debug!(block = %dep, "依赖块已存在，保留现有定义");
            continue;
        }
        // dependency_order 只产出 source 中实际存在的名字
        if let Some(definition) = source.block(&dep) {
            target.add_block_definition(definition.clone());
            debug!(block = %dep, "块定义已导入");
        }
    }
    info!(block = name, "块定义及其依赖导入完成");
    Ok(())
}

/// 对块定义的引用图做后序遍历，返回依赖先于被依赖者的导入次序。
/// 环引用通过 visited 集合截断。
fn dependency_order(root: &str, source: &Document) -> Vec<String> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    visit(root, source, &mut visited, &mut order);
    order
}

fn visit(name: &str, source: &Document, visited: &mut HashSet<String>, order: &mut Vec<String>) {
    if !visited.insert(name.to_string()) {
        return;
    }
    let Some(definition) = source.block(name) else {
        warn!(block = name, "引用的块定义在源文档中缺失，跳过");
        return;
    };
    for dep in definition.referenced_blocks() {
        visit(dep, source, visited, order);
    }
    order.push(name.to_string());
}

/// 将 source 的全部图纸（排除空白占位布局）按页签次序并入 target。
/// 图纸引用到的块定义会先行传递导入，保证没有悬空引用。
/// 并入完成后，target 中若仍存在占位布局且已有真实图纸，则删除占位布局。
pub fn import_sheets(source: &Document, target: &mut Document) -> Result<(), AssemblyError> {
    let mut imported = 0usize;
    let names: Vec<String> = source
        .layouts()
        .map(|layout| layout.name().to_string())
        .filter(|name| name != DEFAULT_PLACEHOLDER_LAYOUT)
        .collect();

    for name in names {
        if target.layout(&name).is_some() {
            debug!(layout = %name, "目标文档已有同名图纸，跳过");
            continue;
        }
        let layout = source
            .layout(&name)
            .ok_or_else(|| AssemblyError::LayoutNotFound(name.clone()))?;

        // 先导入图纸引用到的块定义
        let referenced: Vec<String> = layout
            .entities()
            .filter_map(|(_, entity)| match entity {
                draftgen_core::document::Entity::BlockReference(reference) => {
                    Some(reference.name.clone())
                }
                _ => None,
            })
            .collect();
        for block_name in referenced {
            if source.block(&block_name).is_some() {
                import_definition(&block_name, source, target)?;
            } else {
                warn!(layout = %name, block = %block_name, "源图纸存在悬空块引用");
            }
        }

        let entities: Vec<_> = layout.entities().map(|(_, entity)| entity.clone()).collect();
        target.add_layout(name.as_str());
        for entity in entities {
            target.add_entity_to_layout(&name, entity);
        }
        imported += 1;
        debug!(layout = %name, "图纸已并入目标文档");
    }

    if imported > 0
        && target.layouts().count() > 1
        && target.layout(DEFAULT_PLACEHOLDER_LAYOUT).is_some()
    {
        target.remove_layout(DEFAULT_PLACEHOLDER_LAYOUT);
        debug!("已删除空白占位布局");
    }
    info!(imported, "图纸导入完成");
    Ok(())
}
