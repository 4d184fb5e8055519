//! 可撤销的编辑命令。
//!
//! 命令在执行前捕获线路快照，撤销时从快照恢复，重做时重新执行。
//! 撤销/重做栈由调用方持有。

use tline_core::line::TransmissionLine;
use tline_io::{SnapshotCodec, XmlNode};
use tracing::{debug, warn};

use crate::document::{Document, SharedData, UpdateHint};
use crate::errors::{CommandError, DocumentError};

pub trait Command: Send {
    /// 撤销菜单中显示的名称。
    fn name(&self) -> &'static str;
    fn apply(&mut self, document: &mut Document) -> Result<UpdateHint, CommandError>;
    fn revert(&mut self, document: &mut Document) -> Result<UpdateHint, CommandError>;
}

#[derive(Default)]
pub struct CommandStack {
    undo: Vec<Box<dyn Command>>,
    redo: Vec<Box<dyn Command>>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 执行命令，成功后入撤销栈并清空重做栈。失败的命令直接丢弃。
    pub fn execute<C: Command + 'static>(
        &mut self,
        mut command: C,
        document: &mut Document,
    ) -> Result<UpdateHint, CommandError> {
        let hint = command.apply(document)?;
        debug!(command = command.name(), "命令已执行");
        self.undo.push(Box::new(command));
        self.redo.clear();
        Ok(hint)
    }

    pub fn undo(&mut self, document: &mut Document) -> Result<UpdateHint, CommandError> {
        let mut command = self.undo.pop().ok_or(CommandError::NothingToUndo)?;
        match command.revert(document) {
            Ok(hint) => {
                debug!(command = command.name(), "命令已撤销");
                self.redo.push(command);
                Ok(hint)
            }
            Err(error) => {
                warn!(command = command.name(), %error, "撤销失败");
                self.undo.push(command);
                Err(error)
            }
        }
    }

    pub fn redo(&mut self, document: &mut Document) -> Result<UpdateHint, CommandError> {
        let mut command = self.redo.pop().ok_or(CommandError::NothingToRedo)?;
        match command.apply(document) {
            Ok(hint) => {
                debug!(command = command.name(), "命令已重做");
                self.undo.push(command);
                Ok(hint)
            }
            Err(error) => {
                warn!(command = command.name(), %error, "重做失败");
                self.redo.push(command);
                Err(error)
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_name(&self) -> Option<&'static str> {
        self.undo.last().map(|command| command.name())
    }

    pub fn redo_name(&self) -> Option<&'static str> {
        self.redo.last().map(|command| command.name())
    }
}

/// 整体替换一类共享数据。
pub struct SharedDataCommand {
    data: SharedData,
    before: Option<(SharedData, XmlNode)>,
}

impl SharedDataCommand {
    pub fn new(data: SharedData) -> Self {
        Self { data, before: None }
    }

    fn current(&self, document: &Document) -> SharedData {
        match self.data {
            SharedData::Cables(_) => SharedData::Cables(document.cables().to_vec()),
            SharedData::Hardwares(_) => SharedData::Hardwares(document.hardwares().to_vec()),
            SharedData::Structures(_) => SharedData::Structures(document.structures().to_vec()),
            SharedData::WeatherCases(_) => {
                SharedData::WeatherCases(document.weathercases().to_vec())
            }
        }
    }

    fn wrap(&self, source: DocumentError) -> CommandError {
        CommandError::Document {
            command: self.name(),
            source,
        }
    }
}

impl Command for SharedDataCommand {
    fn name(&self) -> &'static str {
        match self.data {
            SharedData::Cables(_) => "Modify Cable Files",
            SharedData::Hardwares(_) => "Modify Hardware Files",
            SharedData::Structures(_) => "Modify Structure Files",
            SharedData::WeatherCases(_) => "Modify Weather Cases",
        }
    }

    fn apply(&mut self, document: &mut Document) -> Result<UpdateHint, CommandError> {
        let lines = document.snapshot_lines();
        let previous = self.current(document);
        document
            .replace_shared_data(self.data.clone(), &lines)
            .map_err(|source| self.wrap(source))?;
        self.before = Some((previous, lines));
        Ok(UpdateHint::SharedDataEdit)
    }

    fn revert(&mut self, document: &mut Document) -> Result<UpdateHint, CommandError> {
        let Some((previous, lines)) = self.before.take() else {
            return Err(CommandError::NotApplied(self.name()));
        };
        if let Err(source) = document.replace_shared_data(previous.clone(), &lines) {
            self.before = Some((previous, lines));
            return Err(self.wrap(source));
        }
        Ok(UpdateHint::SharedDataEdit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEditKind {
    Activate,
    Delete,
    Insert,
    Modify,
    MoveUp,
    MoveDown,
}

#[derive(Debug, Clone)]
struct LineState {
    index_active: usize,
    count: usize,
    line: Option<XmlNode>,
}

/// 对线路集合的单步编辑。插入与修改携带线路快照。
pub struct TransmissionLineCommand {
    kind: LineEditKind,
    index: usize,
    node: Option<XmlNode>,
    before: Option<LineState>,
}

impl TransmissionLineCommand {
    fn new(kind: LineEditKind, index: usize, node: Option<XmlNode>) -> Self {
        Self {
            kind,
            index,
            node,
            before: None,
        }
    }

    pub fn activate(index: usize) -> Self {
        Self::new(LineEditKind::Activate, index, None)
    }

    pub fn delete(index: usize) -> Self {
        Self::new(LineEditKind::Delete, index, None)
    }

    pub fn insert(index: usize, line: &TransmissionLine) -> Self {
        let node = SnapshotCodec::new().serialize_line(line);
        Self::new(LineEditKind::Insert, index, Some(node))
    }

    pub fn modify(index: usize, line: &TransmissionLine) -> Self {
        let node = SnapshotCodec::new().serialize_line(line);
        Self::new(LineEditKind::Modify, index, Some(node))
    }

    pub fn move_up(index: usize) -> Self {
        Self::new(LineEditKind::MoveUp, index, None)
    }

    pub fn move_down(index: usize) -> Self {
        Self::new(LineEditKind::MoveDown, index, None)
    }

    fn index_is_valid(&self, len: usize) -> bool {
        let index = self.index;
        match self.kind {
            LineEditKind::Activate | LineEditKind::Delete | LineEditKind::Modify => index < len,
            LineEditKind::Insert => index <= len,
            LineEditKind::MoveUp => index >= 1 && index < len,
            LineEditKind::MoveDown => index + 1 < len,
        }
    }

    fn wrap(&self, source: DocumentError) -> CommandError {
        CommandError::Document {
            command: self.name(),
            source,
        }
    }

    fn carried_line(&self, document: &Document) -> Result<TransmissionLine, DocumentError> {
        let Some(node) = &self.node else {
            return Err(DocumentError::InvalidIndex {
                collection: "transmission lines",
                index: self.index,
                len: document.lines().len(),
            });
        };
        document.line_from_snapshot(node)
    }

    fn apply_edit(&self, document: &mut Document) -> Result<Option<XmlNode>, DocumentError> {
        let index = self.index;
        match self.kind {
            LineEditKind::Activate => {
                document.set_index_active(index)?;
                Ok(None)
            }
            LineEditKind::Delete => {
                let line = document.snapshot_line(index)?;
                document.delete_transmission_line(index)?;
                Ok(Some(line))
            }
            LineEditKind::Insert => {
                let line = self.carried_line(document)?;
                document.insert_transmission_line(index, line)?;
                Ok(None)
            }
            LineEditKind::Modify => {
                let previous = document.snapshot_line(index)?;
                let line = self.carried_line(document)?;
                document.modify_transmission_line(index, line)?;
                Ok(Some(previous))
            }
            LineEditKind::MoveUp => {
                document.move_transmission_line(index, index - 1)?;
                Ok(None)
            }
            LineEditKind::MoveDown => {
                document.move_transmission_line(index, index + 2)?;
                Ok(None)
            }
        }
    }

    fn revert_edit(&self, document: &mut Document, before: &LineState) -> Result<(), DocumentError> {
        let index = self.index;
        match self.kind {
            LineEditKind::Activate => {}
            LineEditKind::Delete => {
                if let Some(node) = &before.line {
                    let line = document.line_from_snapshot(node)?;
                    if before.count == 1 {
                        // 删除唯一线路时补入的默认线路需要被替换
                        document.modify_transmission_line(0, line)?;
                    } else {
                        document.insert_transmission_line(index, line)?;
                    }
                }
            }
            LineEditKind::Insert => document.delete_transmission_line(index)?,
            LineEditKind::Modify => {
                if let Some(node) = &before.line {
                    document.restore_line(index, node)?;
                }
            }
            LineEditKind::MoveUp => document.move_transmission_line(index - 1, index + 1)?,
            LineEditKind::MoveDown => document.move_transmission_line(index + 1, index)?,
        }
        document.set_index_active(before.index_active)
    }
}

impl Command for TransmissionLineCommand {
    fn name(&self) -> &'static str {
        match self.kind {
            LineEditKind::Activate => "Activate Line",
            LineEditKind::Delete => "Delete Line",
            LineEditKind::Insert => "Insert Line",
            LineEditKind::Modify => "Modify Line",
            LineEditKind::MoveUp => "Move Line Up",
            LineEditKind::MoveDown => "Move Line Down",
        }
    }

    fn apply(&mut self, document: &mut Document) -> Result<UpdateHint, CommandError> {
        if !self.index_is_valid(document.lines().len()) {
            return Err(CommandError::InvalidIndex {
                command: self.name(),
                index: self.index,
            });
        }

        let index_active = document.index_active();
        let count = document.lines().len();
        let line = self.apply_edit(document).map_err(|source| self.wrap(source))?;
        self.before = Some(LineState {
            index_active,
            count,
            line,
        });
        Ok(UpdateHint::TransmissionLineEdit)
    }

    fn revert(&mut self, document: &mut Document) -> Result<UpdateHint, CommandError> {
        let Some(before) = self.before.take() else {
            return Err(CommandError::NotApplied(self.name()));
        };
        if let Err(source) = self.revert_edit(document, &before) {
            self.before = Some(before);
            return Err(self.wrap(source));
        }
        Ok(UpdateHint::TransmissionLineEdit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{populated, sample_line, weathercase};
    use tline_core::shared::{Cable, CableFile, Hardware, HardwareFile};

    fn line_names(document: &Document) -> Vec<String> {
        document.lines().iter().map(|line| line.name.clone()).collect()
    }

    fn three_lines() -> Document {
        let mut document = populated();
        document
            .insert_transmission_line(1, sample_line("Line B"))
            .expect("插入线路失败");
        document
            .insert_transmission_line(2, sample_line("Line C"))
            .expect("插入线路失败");
        document
    }

    #[test]
    fn shared_data_command_undo_and_redo() {
        let mut document = populated();
        let mut stack = CommandStack::new();
        assert!(!stack.can_undo());

        let mut cables = document.cables().to_vec();
        cables.push(CableFile::new("/lib/other.cable", Cable::default()));
        let hint = stack
            .execute(SharedDataCommand::new(SharedData::Cables(cables)), &mut document)
            .expect("执行失败");
        assert_eq!(hint, UpdateHint::SharedDataEdit);
        assert_eq!(document.cables().len(), 2);
        assert_eq!(stack.undo_name(), Some("Modify Cable Files"));

        stack.undo(&mut document).expect("撤销失败");
        assert_eq!(document.cables().len(), 1);
        assert!(stack.can_redo());
        assert_eq!(stack.redo_name(), Some("Modify Cable Files"));

        stack.redo(&mut document).expect("重做失败");
        assert_eq!(document.cables().len(), 2);
        assert!(!stack.can_redo());
        assert!(document.is_referenced_cable_file(0));
    }

    #[test]
    fn weathercase_edit_is_undone() {
        let mut document = populated();
        let mut stack = CommandStack::new();
        let lines_before = document.lines().to_vec();

        let mut cases = document.weathercases().to_vec();
        cases[0].thickness_ice = 0.04;
        stack
            .execute(
                SharedDataCommand::new(SharedData::WeatherCases(cases)),
                &mut document,
            )
            .expect("执行失败");
        assert_eq!(document.weathercases()[0].thickness_ice, 0.04);

        stack.undo(&mut document).expect("撤销失败");
        assert_eq!(document.weathercases()[0].thickness_ice, 0.0);
        assert_eq!(document.lines(), lines_before.as_slice());
    }

    #[test]
    fn rejected_shared_edit_is_not_recorded() {
        let mut document = populated();
        let mut stack = CommandStack::new();
        let result = stack.execute(
            SharedDataCommand::new(SharedData::Cables(Vec::new())),
            &mut document,
        );
        assert!(matches!(result, Err(CommandError::Document { .. })));
        assert!(!stack.can_undo());
        assert_eq!(document.cables().len(), 1);

        let renamed = vec![
            weathercase("NESC Heavy", 0.0),
            weathercase("0-0-60", 60.0),
            weathercase("Creep 10yr", 60.0),
        ];
        assert!(stack
            .execute(
                SharedDataCommand::new(SharedData::WeatherCases(renamed)),
                &mut document,
            )
            .is_err());
        assert_eq!(document.weathercases()[2].description, "Creep");
    }

    #[test]
    fn delete_line_is_undone() {
        let mut document = three_lines();
        document.set_index_active(2).expect("激活失败");
        let mut stack = CommandStack::new();

        stack
            .execute(TransmissionLineCommand::delete(1), &mut document)
            .expect("删除失败");
        assert_eq!(line_names(&document), vec!["Line A", "Line C"]);
        assert_eq!(document.index_active(), 1);

        stack.undo(&mut document).expect("撤销失败");
        assert_eq!(line_names(&document), vec!["Line A", "Line B", "Line C"]);
        assert_eq!(document.index_active(), 2);
        assert_eq!(document.lines()[1], sample_line("Line B"));
    }

    #[test]
    fn deleting_only_line_is_undone() {
        let mut document = populated();
        let original = document.line().clone();
        let mut stack = CommandStack::new();

        stack
            .execute(TransmissionLineCommand::delete(0), &mut document)
            .expect("删除失败");
        assert_eq!(document.lines().len(), 1);
        assert_eq!(document.line().name, "");

        stack.undo(&mut document).expect("撤销失败");
        assert_eq!(document.lines().len(), 1);
        assert_eq!(document.line(), &original);
    }

    #[test]
    fn insert_and_modify_lines_are_undone() {
        let mut document = populated();
        let mut stack = CommandStack::new();

        stack
            .execute(
                TransmissionLineCommand::insert(1, &sample_line("Line B")),
                &mut document,
            )
            .expect("插入失败");
        assert_eq!(line_names(&document), vec!["Line A", "Line B"]);

        let mut renamed = document.lines()[0].clone();
        renamed.name = "Line A2".to_string();
        stack
            .execute(TransmissionLineCommand::modify(0, &renamed), &mut document)
            .expect("修改失败");
        assert_eq!(document.lines()[0].name, "Line A2");
        assert_eq!(stack.undo_name(), Some("Modify Line"));

        stack.undo(&mut document).expect("撤销修改失败");
        assert_eq!(document.lines()[0].name, "Line A");
        stack.undo(&mut document).expect("撤销插入失败");
        assert_eq!(line_names(&document), vec!["Line A"]);
        assert!(matches!(
            stack.undo(&mut document),
            Err(CommandError::NothingToUndo)
        ));
    }

    #[test]
    fn move_commands_shift_one_slot() {
        let mut document = three_lines();
        let mut stack = CommandStack::new();

        stack
            .execute(TransmissionLineCommand::move_down(0), &mut document)
            .expect("下移失败");
        assert_eq!(line_names(&document), vec!["Line B", "Line A", "Line C"]);
        assert_eq!(document.line().name, "Line A");

        stack
            .execute(TransmissionLineCommand::move_up(2), &mut document)
            .expect("上移失败");
        assert_eq!(line_names(&document), vec!["Line B", "Line C", "Line A"]);

        stack.undo(&mut document).expect("撤销上移失败");
        assert_eq!(line_names(&document), vec!["Line B", "Line A", "Line C"]);
        stack.undo(&mut document).expect("撤销下移失败");
        assert_eq!(line_names(&document), vec!["Line A", "Line B", "Line C"]);
        assert_eq!(document.index_active(), 0);
    }

    #[test]
    fn move_down_reaches_the_end() {
        let mut document = three_lines();
        document.set_index_active(1).expect("激活失败");
        let mut stack = CommandStack::new();

        stack
            .execute(TransmissionLineCommand::move_down(1), &mut document)
            .expect("下移失败");
        assert_eq!(line_names(&document), vec!["Line A", "Line C", "Line B"]);
        assert_eq!(document.index_active(), 2);
        assert_eq!(document.line().name, "Line B");

        stack.undo(&mut document).expect("撤销下移失败");
        assert_eq!(line_names(&document), vec!["Line A", "Line B", "Line C"]);
        assert_eq!(document.index_active(), 1);

        stack.redo(&mut document).expect("重做下移失败");
        assert_eq!(line_names(&document), vec!["Line A", "Line C", "Line B"]);
    }

    #[test]
    fn hardware_and_structure_edits_are_undone() {
        let mut document = populated();
        let mut stack = CommandStack::new();

        let mut hardwares = document.hardwares().to_vec();
        hardwares[0].hardware.weight = 42.0;
        hardwares.push(HardwareFile::new("/lib/polymer.hardware", Hardware::default()));
        stack
            .execute(
                SharedDataCommand::new(SharedData::Hardwares(hardwares)),
                &mut document,
            )
            .expect("替换金具失败");
        assert_eq!(stack.undo_name(), Some("Modify Hardware Files"));
        assert_eq!(document.hardwares().len(), 2);

        let mut structures = document.structures().to_vec();
        structures[0].structure.height = 120.0;
        stack
            .execute(
                SharedDataCommand::new(SharedData::Structures(structures)),
                &mut document,
            )
            .expect("替换杆塔失败");
        assert_eq!(stack.undo_name(), Some("Modify Structure Files"));
        assert_eq!(document.structures()[0].structure.height, 120.0);

        let mut stripped = document.structures().to_vec();
        stripped[0].structure.attachments.clear();
        assert!(stack
            .execute(
                SharedDataCommand::new(SharedData::Structures(stripped)),
                &mut document,
            )
            .is_err());
        assert_eq!(document.structures()[0].structure.attachments.len(), 2);

        stack.undo(&mut document).expect("撤销杆塔失败");
        assert_eq!(document.structures()[0].structure.height, 100.0);
        stack.undo(&mut document).expect("撤销金具失败");
        assert_eq!(document.hardwares().len(), 1);
        assert_eq!(document.hardwares()[0].hardware.weight, 0.0);
        assert!(document.is_referenced_hardware_file(0));
        assert!(document.is_referenced_structure_file(0));
    }

    #[test]
    fn out_of_range_line_commands_fail_closed() {
        let mut document = three_lines();
        let before = document.lines().to_vec();
        let mut stack = CommandStack::new();

        for command in [
            TransmissionLineCommand::move_up(0),
            TransmissionLineCommand::move_down(2),
            TransmissionLineCommand::delete(3),
            TransmissionLineCommand::activate(3),
            TransmissionLineCommand::insert(4, &sample_line("Line D")),
        ] {
            let name = command.name();
            let result = stack.execute(command, &mut document);
            assert!(
                matches!(result, Err(CommandError::InvalidIndex { .. })),
                "{name}"
            );
        }
        assert!(!stack.can_undo());
        assert_eq!(document.lines(), before.as_slice());
    }

    #[test]
    fn activate_is_undone_and_redo_is_cleared() {
        let mut document = three_lines();
        let mut stack = CommandStack::new();

        stack
            .execute(TransmissionLineCommand::activate(2), &mut document)
            .expect("激活失败");
        assert_eq!(document.index_active(), 2);
        stack.undo(&mut document).expect("撤销失败");
        assert_eq!(document.index_active(), 0);
        assert!(stack.can_redo());

        stack
            .execute(TransmissionLineCommand::activate(1), &mut document)
            .expect("激活失败");
        assert!(!stack.can_redo());
        assert!(matches!(
            stack.redo(&mut document),
            Err(CommandError::NothingToRedo)
        ));
    }

    #[test]
    fn revert_without_apply_is_rejected() {
        let mut document = populated();
        let mut command = TransmissionLineCommand::activate(0);
        assert!(matches!(
            command.revert(&mut document),
            Err(CommandError::NotApplied("Activate Line"))
        ));
        stack_is_send(CommandStack::new());
    }

    fn stack_is_send<T: Send>(_: T) {}
}
