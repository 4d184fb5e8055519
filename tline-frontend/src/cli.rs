use tline_core::line::TransmissionLine;
use tline_engine::command::{CommandStack, TransmissionLineCommand};
use tline_engine::document::Document;
use tracing::info;

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, LoadedDocument};

/// 简易 CLI 演示：通过命令栈执行一次编辑并撤销，然后打印文档概览。
pub fn run_demo(loaded: &mut LoadedDocument) -> Result<(), FrontendError> {
    let mut stack = CommandStack::new();
    let names = exercise_commands(&mut loaded.document, &mut stack)?;
    println!("已执行并撤销命令: {}", names.join(", "));

    let document = &loaded.document;
    info!(
        cables = document.cables().len(),
        hardwares = document.hardwares().len(),
        structures = document.structures().len(),
        weathercases = document.weathercases().len(),
        lines = document.lines().len(),
        "CLI 演示文档统计"
    );

    for line in describe(loaded) {
        println!("{line}");
    }
    Ok(())
}

/// 复制当前线路并插入其后，再撤销，确保文档回到原状。
pub fn exercise_commands(
    document: &mut Document,
    stack: &mut CommandStack,
) -> Result<Vec<&'static str>, FrontendError> {
    let index = document.index_active();
    let mut copy = document.line().clone();
    copy.name = format!("{} (copy)", copy.name);

    stack.execute(TransmissionLineCommand::insert(index + 1, &copy), document)?;
    stack.execute(TransmissionLineCommand::activate(index + 1), document)?;

    let mut names = Vec::new();
    while stack.can_undo() {
        if let Some(name) = stack.undo_name() {
            names.push(name);
        }
        stack.undo(document)?;
    }
    Ok(names)
}

/// 文档概览的文本行。
pub fn describe(loaded: &LoadedDocument) -> Vec<String> {
    let document = &loaded.document;
    let mut lines = vec!["Rust 版输电线路文档 CLI 演示".to_string()];
    match &loaded.source {
        DocumentSource::File(path) => lines.push(format!("已从文件加载文档：{}", path.display())),
        DocumentSource::Default => lines.push("已新建默认文档".to_string()),
    }
    lines.push(format!("单位制：{}", loaded.units.as_attribute()));
    if !loaded.problems.is_empty() {
        lines.push(format!("加载问题 {} 条：", loaded.problems.len()));
        lines.extend(loaded.problems.iter().map(|problem| format!("  - {problem}")));
    }

    lines.push(format!("导线文件 {} 个：", document.cables().len()));
    for entry in document.cables() {
        lines.push(format!("  - {} ({})", entry.cable.name, entry.filepath.display()));
    }
    lines.push(format!("金具文件 {} 个：", document.hardwares().len()));
    for entry in document.hardwares() {
        lines.push(format!(
            "  - {} [{}] ({})",
            entry.hardware.name,
            entry.hardware.type_hardware.as_str(),
            entry.filepath.display()
        ));
    }
    lines.push(format!("杆塔文件 {} 个：", document.structures().len()));
    for entry in document.structures() {
        lines.push(format!(
            "  - {} 挂点={} ({})",
            entry.structure.name,
            entry.structure.attachments.len(),
            entry.filepath.display()
        ));
    }
    lines.push(format!("气象工况 {} 个：", document.weathercases().len()));
    for weathercase in document.weathercases() {
        lines.push(format!(
            "  - {} 温度={:.1}",
            weathercase.description, weathercase.temperature_cable
        ));
    }

    lines.push(format!("输电线路 {} 条：", document.lines().len()));
    for (index, line) in document.lines().iter().enumerate() {
        let marker = if index == document.index_active() { "*" } else { " " };
        lines.push(format!("  {marker} {}", line_summary(line)));
    }
    lines
}

fn line_summary(line: &TransmissionLine) -> String {
    let name = if line.name.is_empty() { "<未命名>" } else { line.name.as_str() };
    let mut summary = format!(
        "{name}: 控制点={}, 杆塔={}, 导线={}",
        line.alignment().len(),
        line.line_structures().len(),
        line.line_cables().len()
    );
    if let (Some(first), Some(last)) = (
        line.points_structure_base().first(),
        line.points_structure_base().last(),
    ) {
        summary.push_str(&format!(
            ", 基础点 ({:.2}, {:.2}, {:.2}) → ({:.2}, {:.2}, {:.2})",
            first.x, first.y, first.z, last.x, last.y, last.z
        ));
    }
    summary
}
