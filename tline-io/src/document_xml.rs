//! 文档文件（`line_analyzer_doc`）的读写。
//!
//! 导线、金具、杆塔只以 `file` 叶子记录相对路径，实体本身从各自的外部文件读取；
//! 气象工况与输电线路直接保存在文档内。

use std::fs;
use std::path::{Path, PathBuf};

use tline_core::convert::UnitConvert;
use tline_core::line::TransmissionLine;
use tline_core::shared::{
    Cable, CableFile, Hardware, HardwareFile, Structure, StructureFile, WeatherLoadCase,
};
use tline_core::units::{UnitStyle, UnitSystem};
use tracing::{info, warn};

use crate::codec::{self, FORMAT_VERSION, WEATHERCASE_ROOT};
use crate::gateway::{self, ExternalEntity, Loaded};
use crate::paths;
use crate::snapshot::{LINES_ROOT, SharedDataLookup, SnapshotCodec};
use crate::xml::XmlNode;
use crate::IoError;

pub const DOCUMENT_ROOT: &str = "line_analyzer_doc";

const GROUP_STRUCTURES: &str = "structures";
const GROUP_HARDWARES: &str = "hardwares";
const GROUP_CABLES: &str = "cables";
const GROUP_WEATHERCASES: &str = "weather_load_cases";

/// 从文档文件读出的全部数据，尚未经过文档的唯一性检查。
#[derive(Debug, Default, Clone)]
pub struct DocumentData {
    pub cables: Vec<CableFile>,
    pub hardwares: Vec<HardwareFile>,
    pub structures: Vec<StructureFile>,
    pub weathercases: Vec<WeatherLoadCase>,
    pub lines: Vec<TransmissionLine>,
}

impl DocumentData {
    pub fn lookup(&self) -> SharedDataLookup<'_> {
        SharedDataLookup {
            cables: &self.cables,
            hardwares: &self.hardwares,
            structures: &self.structures,
            weathercases: &self.weathercases,
        }
    }
}

/// 写出文档时借用的各集合。
#[derive(Debug, Clone, Copy)]
pub struct DocumentParts<'a> {
    pub cables: &'a [CableFile],
    pub hardwares: &'a [HardwareFile],
    pub structures: &'a [StructureFile],
    pub weathercases: &'a [WeatherLoadCase],
    pub lines: &'a [TransmissionLine],
}

/// 读取报告：数据本身、文件记录的单位制，以及被跳过或不完整的条目说明。
#[derive(Debug, Default)]
pub struct DocumentLoad {
    pub data: DocumentData,
    pub units_file: UnitSystem,
    pub problems: Vec<String>,
}

impl DocumentLoad {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.problems.is_empty()
    }
}

/// 读取文档，所有数据换算到 `units` 的一致形式。
pub fn read_document(path: &Path, units: UnitSystem) -> Result<DocumentLoad, IoError> {
    info!(path = %path.display(), "读取文档");
    let content = fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let root = XmlNode::parse_str(&content).map_err(|source| IoError::InvalidXml {
        path: path.to_path_buf(),
        source,
    })?;

    if root.name() != DOCUMENT_ROOT {
        return Err(IoError::InvalidDocument(format!(
            "expected <{DOCUMENT_ROOT}> root, found <{}>",
            root.name()
        )));
    }
    if root.attribute("version") != Some(FORMAT_VERSION) {
        return Err(IoError::InvalidDocument(format!(
            "unsupported document version `{}`",
            root.attribute("version").unwrap_or_default()
        )));
    }
    let units_file = root
        .attribute("units")
        .and_then(UnitSystem::from_attribute)
        .ok_or_else(|| IoError::InvalidDocument("missing or invalid units attribute".to_string()))?;

    let base_dir = paths::document_dir(path);
    let mut load = DocumentLoad {
        units_file,
        ..DocumentLoad::default()
    };

    load.data.structures =
        load_files::<Structure>(&root, GROUP_STRUCTURES, &base_dir, units, &mut load.problems)
            .into_iter()
            .map(|(filepath, structure)| StructureFile::new(filepath, structure))
            .collect();
    load.data.hardwares =
        load_files::<Hardware>(&root, GROUP_HARDWARES, &base_dir, units, &mut load.problems)
            .into_iter()
            .map(|(filepath, hardware)| HardwareFile::new(filepath, hardware))
            .collect();
    load.data.cables =
        load_files::<Cable>(&root, GROUP_CABLES, &base_dir, units, &mut load.problems)
            .into_iter()
            .map(|(filepath, cable)| CableFile::new(filepath, cable))
            .collect();

    if let Some(group) = root.child(GROUP_WEATHERCASES) {
        for node in group.children_named(WEATHERCASE_ROOT) {
            let mut weathercase = WeatherLoadCase::default();
            if let Err(error) = codec::parse_weathercase(node, &mut weathercase) {
                warn!(%error, description = %weathercase.description, "气象工况不完整");
                load.problems
                    .push(format!("weather case `{}`: {error}", weathercase.description));
            }
            weathercase.convert_unit_style(units_file, UnitStyle::Different, UnitStyle::Consistent);
            weathercase.convert_unit_system(units_file, units);
            load.data.weathercases.push(weathercase);
        }
    }

    if let Some(group) = root.child(LINES_ROOT) {
        let codec = SnapshotCodec::with_base_dir(&base_dir);
        let snapshot = codec.deserialize_lines(group, &load.data.lookup());
        for (index, error) in &snapshot.errors {
            load.problems.push(format!("transmission line {index}: {error}"));
        }
        load.data.lines = snapshot.lines;
        for line in &mut load.data.lines {
            line.convert_unit_style(units_file, UnitStyle::Different, UnitStyle::Consistent);
            line.convert_unit_system(units_file, units);
        }
    }

    info!(
        path = %path.display(),
        cables = load.data.cables.len(),
        hardwares = load.data.hardwares.len(),
        structures = load.data.structures.len(),
        weathercases = load.data.weathercases.len(),
        lines = load.data.lines.len(),
        problems = load.problems.len(),
        "文档读取完成"
    );
    Ok(load)
}

/// 写出文档。文档内的数据换算为 `units` 的显示形式后写出，外部文件不会被改写。
pub fn write_document(
    path: &Path,
    parts: DocumentParts<'_>,
    units: UnitSystem,
) -> Result<(), IoError> {
    let base_dir = paths::document_dir(path);

    let mut root = XmlNode::new(DOCUMENT_ROOT)
        .with_attribute("version", FORMAT_VERSION)
        .with_attribute("units", units.as_attribute());
    root.add_child(file_group(
        GROUP_STRUCTURES,
        parts.structures.iter().map(|entry| entry.filepath.as_path()),
        &base_dir,
    ));
    root.add_child(file_group(
        GROUP_HARDWARES,
        parts.hardwares.iter().map(|entry| entry.filepath.as_path()),
        &base_dir,
    ));
    root.add_child(file_group(
        GROUP_CABLES,
        parts.cables.iter().map(|entry| entry.filepath.as_path()),
        &base_dir,
    ));

    let weathercases = parts
        .weathercases
        .iter()
        .fold(XmlNode::new(GROUP_WEATHERCASES), |node, weathercase| {
            let mut converted = weathercase.clone();
            converted.convert_unit_style(units, UnitStyle::Consistent, UnitStyle::Different);
            node.with_child(codec::weathercase_to_node(&converted))
        });
    root.add_child(weathercases);

    let lines: Vec<TransmissionLine> = parts
        .lines
        .iter()
        .map(|line| {
            let mut converted = line.clone();
            converted.convert_unit_style(units, UnitStyle::Consistent, UnitStyle::Different);
            converted
        })
        .collect();
    root.add_child(SnapshotCodec::with_base_dir(&base_dir).serialize_lines(&lines));

    let content = root.to_xml_string().map_err(|source| IoError::InvalidXml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), lines = parts.lines.len(), "文档已保存");
    Ok(())
}

fn file_group<'a>(
    name: &str,
    filepaths: impl Iterator<Item = &'a Path>,
    base_dir: &Path,
) -> XmlNode {
    filepaths.fold(XmlNode::new(name), |node, filepath| {
        node.with_child(XmlNode::with_text(
            "file",
            paths::to_relative(filepath, base_dir),
        ))
    })
}

/// 读取一组外部文件。文件错误的条目被跳过，解析错误的条目保留部分实体。
fn load_files<T: ExternalEntity>(
    root: &XmlNode,
    group: &str,
    base_dir: &Path,
    units: UnitSystem,
    problems: &mut Vec<String>,
) -> Vec<(PathBuf, T)> {
    let Some(node) = root.child(group) else {
        return Vec::new();
    };

    let mut entries: Vec<(PathBuf, T)> = Vec::new();
    for file in node.children_named("file") {
        let filepath = paths::resolve(file.text(), base_dir);
        match gateway::load::<T>(&filepath, units) {
            Loaded::Ok(entity) => entries.push((filepath, entity)),
            Loaded::ParseError { entity, reason } => {
                problems.push(format!("{}: {reason}", filepath.display()));
                entries.push((filepath, entity));
            }
            Loaded::FileError(error) => {
                warn!(path = %filepath.display(), %error, "外部文件无法读取，已跳过");
                problems.push(error.to_string());
            }
        }
    }
    entries
}
