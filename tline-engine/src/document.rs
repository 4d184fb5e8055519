//! 文档：四类共享数据、输电线路集合与当前激活的线路。
//!
//! 线路只以键引用共享数据。任何可能让键失效的操作都先做引用检查，
//! 整体替换集合时则通过线路快照重建引用，失败即回滚。

use std::path::{Path, PathBuf};

use tline_core::convert::UnitConvert;
use tline_core::line::{LineStructure, TransmissionLine};
use tline_core::shared::{CableFile, FileEntry, HardwareFile, StructureFile, WeatherLoadCase};
use tline_core::units::{UnitStyle, UnitSystem};
use tline_io::gateway;
use tline_io::{
    DocumentLoader, DocumentParts, DocumentSaver, SharedDataLookup, SnapshotCodec, XmlFacade,
    XmlNode,
};
use tracing::{debug, info, warn};

use crate::errors::DocumentError;

const CABLES: &str = "cables";
const HARDWARES: &str = "hardwares";
const STRUCTURES: &str = "structures";
const WEATHERCASES: &str = "weather cases";
const LINES: &str = "transmission lines";

/// 通知视图刷新的范围。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateHint {
    SharedDataEdit,
    TransmissionLineEdit,
}

/// 某一类共享数据的完整集合，整体替换时使用。
#[derive(Debug, Clone, PartialEq)]
pub enum SharedData {
    Cables(Vec<CableFile>),
    Hardwares(Vec<HardwareFile>),
    Structures(Vec<StructureFile>),
    WeatherCases(Vec<WeatherLoadCase>),
}

impl SharedData {
    pub fn collection(&self) -> &'static str {
        match self {
            SharedData::Cables(_) => CABLES,
            SharedData::Hardwares(_) => HARDWARES,
            SharedData::Structures(_) => STRUCTURES,
            SharedData::WeatherCases(_) => WEATHERCASES,
        }
    }

    fn check_unique(&self) -> Result<(), DocumentError> {
        match self {
            SharedData::Cables(entries) => check_unique_paths(entries),
            SharedData::Hardwares(entries) => check_unique_paths(entries),
            SharedData::Structures(entries) => check_unique_paths(entries),
            SharedData::WeatherCases(entries) => {
                for (index, weathercase) in entries.iter().enumerate() {
                    check_unique_description(&entries[..index], &weathercase.description, None)?;
                }
                Ok(())
            }
        }
    }
}

fn check_index(
    collection: &'static str,
    index: usize,
    len: usize,
    include_end: bool,
) -> Result<(), DocumentError> {
    if index < len || (include_end && index == len) {
        Ok(())
    } else {
        Err(DocumentError::InvalidIndex {
            collection,
            index,
            len,
        })
    }
}

fn check_unique_path<T: FileEntry>(
    entries: &[T],
    filepath: &Path,
    ignore: Option<usize>,
) -> Result<(), DocumentError> {
    let duplicate = entries
        .iter()
        .enumerate()
        .any(|(index, entry)| Some(index) != ignore && entry.filepath() == filepath);
    if duplicate {
        return Err(DocumentError::DuplicateFilePath(filepath.to_path_buf()));
    }
    Ok(())
}

fn check_unique_paths<T: FileEntry>(entries: &[T]) -> Result<(), DocumentError> {
    for (index, entry) in entries.iter().enumerate() {
        check_unique_path(&entries[..index], entry.filepath(), None)?;
    }
    Ok(())
}

fn check_unique_description(
    weathercases: &[WeatherLoadCase],
    description: &str,
    ignore: Option<usize>,
) -> Result<(), DocumentError> {
    let duplicate = weathercases
        .iter()
        .enumerate()
        .any(|(index, weathercase)| Some(index) != ignore && weathercase.description == description);
    if duplicate {
        return Err(DocumentError::DuplicateDescription(description.to_string()));
    }
    Ok(())
}

fn insert_entry<T: FileEntry>(
    entries: &mut Vec<T>,
    collection: &'static str,
    index: usize,
    entry: T,
) -> Result<(), DocumentError> {
    check_index(collection, index, entries.len(), true)?;
    check_unique_path(entries, entry.filepath(), None)?;
    entries.insert(index, entry);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Document {
    cables: Vec<CableFile>,
    hardwares: Vec<HardwareFile>,
    structures: Vec<StructureFile>,
    weathercases: Vec<WeatherLoadCase>,
    lines: Vec<TransmissionLine>,
    index_active: usize,
    modified: bool,
    filepath: Option<PathBuf>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// 新文档：一条空线路，没有共享数据。
    pub fn new() -> Self {
        Self {
            cables: Vec::new(),
            hardwares: Vec::new(),
            structures: Vec::new(),
            weathercases: Vec::new(),
            lines: vec![TransmissionLine::default()],
            index_active: 0,
            modified: false,
            filepath: None,
        }
    }

    /// 从文件打开文档。被跳过的条目与不完整的数据以说明文字返回。
    pub fn open(path: &Path, units: UnitSystem) -> Result<(Self, Vec<String>), DocumentError> {
        let load = XmlFacade::new(units).load(path)?;
        let mut problems = load.problems;
        let data = load.data;

        let mut document = Self::new();
        for entry in data.cables {
            let index = document.cables.len();
            if let Err(error) = insert_entry(&mut document.cables, CABLES, index, entry) {
                warn!(%error, "忽略重复的导线文件");
                problems.push(error.to_string());
            }
        }
        for entry in data.hardwares {
            let index = document.hardwares.len();
            if let Err(error) = insert_entry(&mut document.hardwares, HARDWARES, index, entry) {
                warn!(%error, "忽略重复的金具文件");
                problems.push(error.to_string());
            }
        }
        for entry in data.structures {
            let index = document.structures.len();
            if let Err(error) = insert_entry(&mut document.structures, STRUCTURES, index, entry) {
                warn!(%error, "忽略重复的杆塔文件");
                problems.push(error.to_string());
            }
        }
        for weathercase in data.weathercases {
            match check_unique_description(&document.weathercases, &weathercase.description, None)
            {
                Ok(()) => document.weathercases.push(weathercase),
                Err(error) => {
                    warn!(%error, "忽略重复的气象工况");
                    problems.push(error.to_string());
                }
            }
        }

        if !data.lines.is_empty() {
            document.lines = data.lines;
        }
        document.index_active = 0;
        document.modified = false;
        document.filepath = Some(path.to_path_buf());

        info!(
            path = %path.display(),
            lines = document.lines.len(),
            problems = problems.len(),
            "文档已打开"
        );
        Ok((document, problems))
    }

    /// 保存到文件并清除修改标记。
    pub fn save(&mut self, path: &Path, units: UnitSystem) -> Result<(), DocumentError> {
        XmlFacade::new(units).save(self.parts(), path)?;
        self.filepath = Some(path.to_path_buf());
        self.modified = false;
        Ok(())
    }

    pub fn parts(&self) -> DocumentParts<'_> {
        DocumentParts {
            cables: &self.cables,
            hardwares: &self.hardwares,
            structures: &self.structures,
            weathercases: &self.weathercases,
            lines: &self.lines,
        }
    }

    pub fn lookup(&self) -> SharedDataLookup<'_> {
        SharedDataLookup {
            cables: &self.cables,
            hardwares: &self.hardwares,
            structures: &self.structures,
            weathercases: &self.weathercases,
        }
    }

    #[inline]
    pub fn cables(&self) -> &[CableFile] {
        &self.cables
    }

    #[inline]
    pub fn hardwares(&self) -> &[HardwareFile] {
        &self.hardwares
    }

    #[inline]
    pub fn structures(&self) -> &[StructureFile] {
        &self.structures
    }

    #[inline]
    pub fn weathercases(&self) -> &[WeatherLoadCase] {
        &self.weathercases
    }

    #[inline]
    pub fn lines(&self) -> &[TransmissionLine] {
        &self.lines
    }

    #[inline]
    pub fn index_active(&self) -> usize {
        self.index_active
    }

    /// 当前激活的线路。线路集合始终非空。
    #[inline]
    pub fn line(&self) -> &TransmissionLine {
        &self.lines[self.index_active]
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    #[inline]
    pub fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    #[inline]
    fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub fn insert_cable_file(&mut self, index: usize, entry: CableFile) -> Result<(), DocumentError> {
        insert_entry(&mut self.cables, CABLES, index, entry)?;
        self.mark_modified();
        Ok(())
    }

    pub fn insert_hardware_file(
        &mut self,
        index: usize,
        entry: HardwareFile,
    ) -> Result<(), DocumentError> {
        insert_entry(&mut self.hardwares, HARDWARES, index, entry)?;
        self.mark_modified();
        Ok(())
    }

    pub fn insert_structure_file(
        &mut self,
        index: usize,
        entry: StructureFile,
    ) -> Result<(), DocumentError> {
        insert_entry(&mut self.structures, STRUCTURES, index, entry)?;
        self.mark_modified();
        Ok(())
    }

    pub fn insert_weathercase(
        &mut self,
        index: usize,
        weathercase: WeatherLoadCase,
    ) -> Result<(), DocumentError> {
        check_index(WEATHERCASES, index, self.weathercases.len(), true)?;
        check_unique_description(&self.weathercases, &weathercase.description, None)?;
        self.weathercases.insert(index, weathercase);
        self.mark_modified();
        Ok(())
    }

    pub fn is_referenced_cable_file(&self, index: usize) -> bool {
        self.cables.get(index).is_some_and(|entry| {
            self.lines
                .iter()
                .any(|line| line.references_cable(&entry.filepath))
        })
    }

    pub fn is_referenced_hardware_file(&self, index: usize) -> bool {
        self.hardwares.get(index).is_some_and(|entry| {
            self.lines
                .iter()
                .any(|line| line.references_hardware(&entry.filepath))
        })
    }

    pub fn is_referenced_structure_file(&self, index: usize) -> bool {
        self.structures.get(index).is_some_and(|entry| {
            self.lines
                .iter()
                .any(|line| line.references_structure(&entry.filepath))
        })
    }

    /// 检查约束、蠕变拉伸、荷载拉伸三处引用。
    pub fn is_referenced_weathercase(&self, index: usize) -> bool {
        self.weathercases.get(index).is_some_and(|weathercase| {
            self.lines
                .iter()
                .any(|line| line.references_weathercase(&weathercase.description))
        })
    }

    pub fn delete_cable_file(&mut self, index: usize) -> Result<(), DocumentError> {
        check_index(CABLES, index, self.cables.len(), false)?;
        if self.is_referenced_cable_file(index) {
            return Err(DocumentError::Referenced {
                collection: CABLES,
                index,
            });
        }
        self.cables.remove(index);
        self.mark_modified();
        Ok(())
    }

    pub fn delete_hardware_file(&mut self, index: usize) -> Result<(), DocumentError> {
        check_index(HARDWARES, index, self.hardwares.len(), false)?;
        if self.is_referenced_hardware_file(index) {
            return Err(DocumentError::Referenced {
                collection: HARDWARES,
                index,
            });
        }
        self.hardwares.remove(index);
        self.mark_modified();
        Ok(())
    }

    pub fn delete_structure_file(&mut self, index: usize) -> Result<(), DocumentError> {
        check_index(STRUCTURES, index, self.structures.len(), false)?;
        if self.is_referenced_structure_file(index) {
            return Err(DocumentError::Referenced {
                collection: STRUCTURES,
                index,
            });
        }
        self.structures.remove(index);
        self.mark_modified();
        Ok(())
    }

    pub fn delete_weathercase(&mut self, index: usize) -> Result<(), DocumentError> {
        check_index(WEATHERCASES, index, self.weathercases.len(), false)?;
        if self.is_referenced_weathercase(index) {
            return Err(DocumentError::Referenced {
                collection: WEATHERCASES,
                index,
            });
        }
        self.weathercases.remove(index);
        self.mark_modified();
        Ok(())
    }

    /// 原位替换导线并写回其外部文件。路径变化时线路引用随之改指。
    pub fn modify_cable_file(
        &mut self,
        index: usize,
        entry: CableFile,
        units: UnitSystem,
    ) -> Result<(), DocumentError> {
        check_index(CABLES, index, self.cables.len(), false)?;
        check_unique_path(&self.cables, &entry.filepath, Some(index))?;
        gateway::save_cable(&entry.filepath, &entry.cable, units)?;

        let previous = std::mem::replace(&mut self.cables[index], entry);
        let current = &self.cables[index].filepath;
        if previous.filepath != *current {
            for line in &mut self.lines {
                line.retarget_cable(&previous.filepath, current);
            }
        }
        self.mark_modified();
        Ok(())
    }

    pub fn modify_hardware_file(
        &mut self,
        index: usize,
        entry: HardwareFile,
        units: UnitSystem,
    ) -> Result<(), DocumentError> {
        check_index(HARDWARES, index, self.hardwares.len(), false)?;
        check_unique_path(&self.hardwares, &entry.filepath, Some(index))?;
        gateway::save_hardware(&entry.filepath, &entry.hardware, units)?;

        let previous = std::mem::replace(&mut self.hardwares[index], entry);
        let current = &self.hardwares[index].filepath;
        if previous.filepath != *current {
            for line in &mut self.lines {
                line.retarget_hardware(&previous.filepath, current);
            }
        }
        self.mark_modified();
        Ok(())
    }

    /// 替换杆塔后，依赖它的线路杆塔逐一原位重设，以便线路重新计算派生数据。
    pub fn modify_structure_file(
        &mut self,
        index: usize,
        entry: StructureFile,
        units: UnitSystem,
    ) -> Result<(), DocumentError> {
        check_index(STRUCTURES, index, self.structures.len(), false)?;
        check_unique_path(&self.structures, &entry.filepath, Some(index))?;
        gateway::save_structure(&entry.filepath, &entry.structure, units)?;

        let previous = std::mem::replace(&mut self.structures[index], entry);
        let current = &self.structures[index].filepath;
        for line in &mut self.lines {
            if previous.filepath != *current {
                line.retarget_structure(&previous.filepath, current);
            }
            let dependents: Vec<(usize, LineStructure)> = line
                .line_structures()
                .iter()
                .enumerate()
                .filter(|(_, line_structure)| {
                    line_structure.structure.as_deref() == Some(current.as_path())
                })
                .map(|(position, line_structure)| (position, line_structure.clone()))
                .collect();
            // TODO: 挂点列表变化时同步线路导线的连接与金具槽位。
            for (position, line_structure) in dependents {
                line.modify_line_structure(position, line_structure);
            }
        }
        self.mark_modified();
        Ok(())
    }

    pub fn modify_weathercase(
        &mut self,
        index: usize,
        weathercase: WeatherLoadCase,
    ) -> Result<(), DocumentError> {
        check_index(WEATHERCASES, index, self.weathercases.len(), false)?;
        check_unique_description(&self.weathercases, &weathercase.description, Some(index))?;

        let previous = std::mem::replace(&mut self.weathercases[index], weathercase);
        let current = &self.weathercases[index].description;
        if previous.description != *current {
            for line in &mut self.lines {
                line.retarget_weathercase(&previous.description, current);
            }
        }
        self.mark_modified();
        Ok(())
    }

    /// 插入线路，允许插到末尾。线路的每个引用都必须能在当前集合中找到。
    pub fn insert_transmission_line(
        &mut self,
        index: usize,
        line: TransmissionLine,
    ) -> Result<(), DocumentError> {
        check_index(LINES, index, self.lines.len(), true)?;
        let line = self.resolve_line(&line)?;
        self.lines.insert(index, line);
        if index <= self.index_active && self.lines.len() > 1 {
            self.index_active += 1;
        }
        self.mark_modified();
        Ok(())
    }

    /// 删除线路后激活索引减一；集合清空时补一条默认线路。
    pub fn delete_transmission_line(&mut self, index: usize) -> Result<(), DocumentError> {
        check_index(LINES, index, self.lines.len(), false)?;
        self.lines.remove(index);
        self.index_active = self.index_active.saturating_sub(1);
        if self.lines.is_empty() {
            self.lines.push(TransmissionLine::default());
            self.index_active = 0;
        }
        self.mark_modified();
        Ok(())
    }

    /// 把 `from` 处的线路移动到原 `to` 处元素之前，`to == len` 时移到末尾。
    pub fn move_transmission_line(&mut self, from: usize, to: usize) -> Result<(), DocumentError> {
        check_index(LINES, from, self.lines.len(), false)?;
        check_index(LINES, to, self.lines.len(), true)?;

        let line = self.lines.remove(from);
        let target = if to > from { to - 1 } else { to };
        self.lines.insert(target, line);

        self.index_active = if self.index_active == from {
            target
        } else {
            let mut active = self.index_active;
            if from < active {
                active -= 1;
            }
            if target <= active {
                active += 1;
            }
            active
        };
        self.mark_modified();
        Ok(())
    }

    pub fn modify_transmission_line(
        &mut self,
        index: usize,
        line: TransmissionLine,
    ) -> Result<(), DocumentError> {
        check_index(LINES, index, self.lines.len(), false)?;
        self.lines[index] = self.resolve_line(&line)?;
        self.mark_modified();
        Ok(())
    }

    pub fn set_index_active(&mut self, index: usize) -> Result<(), DocumentError> {
        check_index(LINES, index, self.lines.len(), false)?;
        self.index_active = index;
        Ok(())
    }

    pub fn set_cables(&mut self, cables: Vec<CableFile>) -> Result<(), DocumentError> {
        let node = self.snapshot_lines();
        self.replace_shared_data(SharedData::Cables(cables), &node)
    }

    pub fn set_hardwares(&mut self, hardwares: Vec<HardwareFile>) -> Result<(), DocumentError> {
        let node = self.snapshot_lines();
        self.replace_shared_data(SharedData::Hardwares(hardwares), &node)
    }

    pub fn set_structures(&mut self, structures: Vec<StructureFile>) -> Result<(), DocumentError> {
        let node = self.snapshot_lines();
        self.replace_shared_data(SharedData::Structures(structures), &node)
    }

    pub fn set_weathercases(
        &mut self,
        weathercases: Vec<WeatherLoadCase>,
    ) -> Result<(), DocumentError> {
        let node = self.snapshot_lines();
        self.replace_shared_data(SharedData::WeatherCases(weathercases), &node)
    }

    /// 换入新的共享数据集合，并从 `lines` 快照在新集合上重建全部线路。
    ///
    /// 任何一条线路无法解析时，旧集合与原有线路原样恢复，返回第一条失败原因。
    pub fn replace_shared_data(
        &mut self,
        data: SharedData,
        lines: &XmlNode,
    ) -> Result<(), DocumentError> {
        data.check_unique()?;
        let collection = data.collection();

        let lines_before = std::mem::take(&mut self.lines);
        let previous = self.swap_shared_data(data);
        let snapshot = SnapshotCodec::new().deserialize_lines(lines, &self.lookup());

        match snapshot.errors.into_iter().next() {
            None => {
                self.lines = snapshot.lines;
                self.normalize_lines();
                self.mark_modified();
                debug!(collection, lines = self.lines.len(), "共享数据已替换");
                Ok(())
            }
            Some((index, error)) => {
                warn!(collection, index, %error, "线路无法在新集合上重建，已回滚");
                self.swap_shared_data(previous);
                self.lines = lines_before;
                Err(error.into())
            }
        }
    }

    fn swap_shared_data(&mut self, data: SharedData) -> SharedData {
        match data {
            SharedData::Cables(entries) => {
                SharedData::Cables(std::mem::replace(&mut self.cables, entries))
            }
            SharedData::Hardwares(entries) => {
                SharedData::Hardwares(std::mem::replace(&mut self.hardwares, entries))
            }
            SharedData::Structures(entries) => {
                SharedData::Structures(std::mem::replace(&mut self.structures, entries))
            }
            SharedData::WeatherCases(entries) => {
                SharedData::WeatherCases(std::mem::replace(&mut self.weathercases, entries))
            }
        }
    }

    /// 以当前集合为准，把全部线路写成快照。
    pub fn snapshot_lines(&self) -> XmlNode {
        SnapshotCodec::new().serialize_lines(&self.lines)
    }

    pub fn snapshot_line(&self, index: usize) -> Result<XmlNode, DocumentError> {
        check_index(LINES, index, self.lines.len(), false)?;
        Ok(SnapshotCodec::new().serialize_line(&self.lines[index]))
    }

    /// 用快照替换全部线路。任何一条无法解析时文档保持不变。
    pub fn restore_lines(&mut self, node: &XmlNode) -> Result<(), DocumentError> {
        let snapshot = SnapshotCodec::new().deserialize_lines(node, &self.lookup());
        if let Some((_, error)) = snapshot.errors.into_iter().next() {
            return Err(error.into());
        }
        self.lines = snapshot.lines;
        self.normalize_lines();
        self.mark_modified();
        Ok(())
    }

    pub fn restore_line(&mut self, index: usize, node: &XmlNode) -> Result<(), DocumentError> {
        check_index(LINES, index, self.lines.len(), false)?;
        let line = SnapshotCodec::new().deserialize_line(node, &self.lookup())?;
        self.lines[index] = line;
        self.mark_modified();
        Ok(())
    }

    /// 单条线路从快照中解析，结果可以直接进入线路集合。
    pub fn line_from_snapshot(&self, node: &XmlNode) -> Result<TransmissionLine, DocumentError> {
        Ok(SnapshotCodec::new().deserialize_line(node, &self.lookup())?)
    }

    /// 在所有共享数据与线路上切换单位风格。
    pub fn convert_unit_style(&mut self, system: UnitSystem, from: UnitStyle, to: UnitStyle) {
        for entry in &mut self.cables {
            entry.cable.convert_unit_style(system, from, to);
        }
        for entry in &mut self.hardwares {
            entry.hardware.convert_unit_style(system, from, to);
        }
        for entry in &mut self.structures {
            entry.structure.convert_unit_style(system, from, to);
        }
        for weathercase in &mut self.weathercases {
            weathercase.convert_unit_style(system, from, to);
        }
        for line in &mut self.lines {
            line.convert_unit_style(system, from, to);
        }
    }

    pub fn convert_unit_system(&mut self, from: UnitSystem, to: UnitSystem) {
        for entry in &mut self.cables {
            entry.cable.convert_unit_system(from, to);
        }
        for entry in &mut self.hardwares {
            entry.hardware.convert_unit_system(from, to);
        }
        for entry in &mut self.structures {
            entry.structure.convert_unit_system(from, to);
        }
        for weathercase in &mut self.weathercases {
            weathercase.convert_unit_system(from, to);
        }
        for line in &mut self.lines {
            line.convert_unit_system(from, to);
        }
    }

    fn resolve_line(&self, line: &TransmissionLine) -> Result<TransmissionLine, DocumentError> {
        let codec = SnapshotCodec::new();
        Ok(codec.deserialize_line(&codec.serialize_line(line), &self.lookup())?)
    }

    fn normalize_lines(&mut self) {
        if self.lines.is_empty() {
            self.lines.push(TransmissionLine::default());
        }
        self.index_active = self.index_active.min(self.lines.len() - 1);
    }
}
