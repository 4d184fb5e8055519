//! 输电线路快照：把线路写成 XML 节点，并在给定的共享数据集合上重新解析。
//!
//! 线路只通过键引用共享数据，解析时每个键都必须能在查找表中找到，
//! 否则该线路整体失败。这是撤销/重做与集合整体替换的基础。

use std::fmt;
use std::path::{Path, PathBuf};

use glam::DVec3;
use thiserror::Error;
use tline_core::line::{
    AlignmentPoint, CableConditionType, CableConnection, ConstraintLimitType, LineCable,
    LineStructure, TransmissionLine,
};
use tline_core::shared::{CableFile, HardwareFile, StructureFile, WeatherLoadCase};
use tracing::{debug, warn};

use crate::codec::{self, CodecError, FORMAT_VERSION, Fields, number_node};
use crate::paths;
use crate::xml::XmlNode;

pub const LINE_ROOT: &str = "transmission_line";
pub const LINES_ROOT: &str = "transmission_lines";

/// 解析线路时可用的共享数据，只读。
#[derive(Debug, Clone, Copy)]
pub struct SharedDataLookup<'a> {
    pub cables: &'a [CableFile],
    pub hardwares: &'a [HardwareFile],
    pub structures: &'a [StructureFile],
    pub weathercases: &'a [WeatherLoadCase],
}

impl<'a> SharedDataLookup<'a> {
    pub fn has_cable(&self, filepath: &Path) -> bool {
        self.cables.iter().any(|entry| entry.filepath == filepath)
    }

    pub fn has_hardware(&self, filepath: &Path) -> bool {
        self.hardwares.iter().any(|entry| entry.filepath == filepath)
    }

    pub fn structure(&self, filepath: &Path) -> Option<&'a StructureFile> {
        self.structures.iter().find(|entry| entry.filepath == filepath)
    }

    pub fn has_weathercase(&self, description: &str) -> bool {
        self.weathercases
            .iter()
            .any(|weathercase| weathercase.description == description)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Cable,
    Hardware,
    Structure,
    WeatherCase,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReferenceKind::Cable => "cable",
            ReferenceKind::Hardware => "hardware",
            ReferenceKind::Structure => "structure",
            ReferenceKind::WeatherCase => "weather case",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("unresolved {kind} reference `{key}`")]
    Unresolved { kind: ReferenceKind, key: String },
    #[error("line structure {index_line_structure} has no attachment {index_attachment}")]
    InvalidAttachment {
        index_line_structure: usize,
        index_attachment: usize,
    },
    #[error("line cable {index} connects to a missing line structure")]
    InvalidConnection { index: usize },
}

/// 批量解析的结果：成功的线路与失败线路的序号和原因。
#[derive(Debug, Default)]
pub struct LinesSnapshot {
    pub lines: Vec<TransmissionLine>,
    pub errors: Vec<(usize, SnapshotError)>,
}

impl LinesSnapshot {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// 线路编解码器。带基准目录时文件键以相对路径写出，读取时再还原。
#[derive(Debug, Clone, Default)]
pub struct SnapshotCodec {
    base_dir: Option<PathBuf>,
}

impl SnapshotCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    pub fn serialize_lines<'a>(
        &self,
        lines: impl IntoIterator<Item = &'a TransmissionLine>,
    ) -> XmlNode {
        lines
            .into_iter()
            .fold(XmlNode::new(LINES_ROOT), |node, line| {
                node.with_child(self.serialize_line(line))
            })
    }

    pub fn serialize_line(&self, line: &TransmissionLine) -> XmlNode {
        let alignment = line
            .alignment()
            .iter()
            .fold(XmlNode::new("alignment"), |node, point| {
                node.with_child(
                    XmlNode::new("point")
                        .with_child(number_node("station", point.station))
                        .with_child(number_node("elevation", point.elevation))
                        .with_child(number_node("rotation", point.rotation)),
                )
            });
        let structures = line
            .line_structures()
            .iter()
            .fold(XmlNode::new("line_structures"), |node, line_structure| {
                node.with_child(self.line_structure_node(line_structure))
            });
        let cables = line
            .line_cables()
            .iter()
            .fold(XmlNode::new("line_cables"), |node, line_cable| {
                node.with_child(self.line_cable_node(line_cable))
            });

        XmlNode::new(LINE_ROOT)
            .with_attribute("version", FORMAT_VERSION)
            .with_child(XmlNode::with_text("name", line.name.as_str()))
            .with_child(vector_node("origin", line.origin()))
            .with_child(alignment)
            .with_child(structures)
            .with_child(cables)
    }

    /// 逐条解析，失败的线路记录后跳过。
    pub fn deserialize_lines(&self, node: &XmlNode, lookup: &SharedDataLookup<'_>) -> LinesSnapshot {
        let mut snapshot = LinesSnapshot::default();
        if node.name() != LINES_ROOT {
            snapshot.errors.push((
                0,
                CodecError::UnexpectedRoot {
                    expected: LINES_ROOT.to_string(),
                    found: node.name().to_string(),
                }
                .into(),
            ));
            return snapshot;
        }

        for (index, child) in node.children_named(LINE_ROOT).enumerate() {
            match self.deserialize_line(child, lookup) {
                Ok(line) => snapshot.lines.push(line),
                Err(error) => {
                    warn!(index, %error, "线路快照解析失败，已跳过");
                    snapshot.errors.push((index, error));
                }
            }
        }
        debug!(
            lines = snapshot.lines.len(),
            failed = snapshot.errors.len(),
            "线路快照解析完成"
        );
        snapshot
    }

    pub fn deserialize_line(
        &self,
        node: &XmlNode,
        lookup: &SharedDataLookup<'_>,
    ) -> Result<TransmissionLine, SnapshotError> {
        codec::expect_root(node, LINE_ROOT)?;

        let mut line = TransmissionLine::default();
        let mut fields = Fields::new(node);
        fields.text("name", &mut line.name);
        if let Some(origin) = fields.child("origin") {
            line.set_origin(parse_vector(origin)?);
        }
        fields.finish()?;

        if let Some(alignment) = node.child("alignment") {
            for point in alignment.children_named("point") {
                line.add_alignment_point(parse_alignment_point(point)?);
            }
        }

        if let Some(structures) = node.child("line_structures") {
            for child in structures.children_named("line_structure") {
                let line_structure = self.parse_line_structure(child, lookup)?;
                let index = line.line_structures().len();
                line.insert_line_structure(index, line_structure);
            }
        }

        if let Some(cables) = node.child("line_cables") {
            for (index, child) in cables.children_named("line_cable").enumerate() {
                let line_cable = self.parse_line_cable(child, lookup)?;
                check_attachments(&line, &line_cable, lookup)?;
                if !line.insert_line_cable(index, line_cable) {
                    return Err(SnapshotError::InvalidConnection { index });
                }
            }
        }

        Ok(line)
    }

    fn line_structure_node(&self, line_structure: &LineStructure) -> XmlNode {
        let hardwares = line_structure
            .hardwares
            .iter()
            .fold(XmlNode::new("hardwares"), |node, hardware| {
                node.with_child(self.key_node("hardware", hardware.as_deref()))
            });
        XmlNode::new("line_structure")
            .with_child(self.key_node("structure", line_structure.structure.as_deref()))
            .with_child(hardwares)
            .with_child(number_node("station", line_structure.station))
            .with_child(number_node("offset", line_structure.offset))
            .with_child(number_node(
                "height_adjustment",
                line_structure.height_adjustment,
            ))
            .with_child(number_node("rotation", line_structure.rotation))
    }

    fn line_cable_node(&self, line_cable: &LineCable) -> XmlNode {
        let constraint = &line_cable.constraint;
        let connections = line_cable
            .connections
            .iter()
            .fold(XmlNode::new("connections"), |node, connection| {
                node.with_child(
                    XmlNode::new("connection")
                        .with_child(XmlNode::with_text(
                            "index_line_structure",
                            connection.index_line_structure.to_string(),
                        ))
                        .with_child(XmlNode::with_text(
                            "index_attachment",
                            connection.index_attachment.to_string(),
                        )),
                )
            });
        XmlNode::new("line_cable")
            .with_child(self.key_node("cable", line_cable.cable.as_deref()))
            .with_child(
                XmlNode::new("constraint")
                    .with_child(text_key_node(
                        "weather_case",
                        constraint.case_weather.as_deref(),
                    ))
                    .with_child(XmlNode::with_text(
                        "condition",
                        constraint.condition.as_str(),
                    ))
                    .with_child(number_node("limit", constraint.limit))
                    .with_child(XmlNode::with_text(
                        "type_limit",
                        constraint.type_limit.as_str(),
                    )),
            )
            .with_child(vector_node(
                "spacing_attachments_ruling_span",
                line_cable.spacing_attachments_ruling_span,
            ))
            .with_child(text_key_node(
                "weathercase_stretch_creep",
                line_cable.weathercase_stretch_creep.as_deref(),
            ))
            .with_child(text_key_node(
                "weathercase_stretch_load",
                line_cable.weathercase_stretch_load.as_deref(),
            ))
            .with_child(connections)
    }

    fn parse_line_structure(
        &self,
        node: &XmlNode,
        lookup: &SharedDataLookup<'_>,
    ) -> Result<LineStructure, SnapshotError> {
        let mut line_structure = LineStructure::default();

        line_structure.structure = self.read_key(node, "structure")?;
        if let Some(filepath) = &line_structure.structure {
            if lookup.structure(filepath).is_none() {
                return Err(unresolved(ReferenceKind::Structure, filepath));
            }
        }

        if let Some(hardwares) = node.child("hardwares") {
            for child in hardwares.children_named("hardware") {
                let hardware = self.resolve_key(child.text());
                if let Some(filepath) = &hardware {
                    if !lookup.has_hardware(filepath) {
                        return Err(unresolved(ReferenceKind::Hardware, filepath));
                    }
                }
                line_structure.hardwares.push(hardware);
            }
        }

        let mut fields = Fields::new(node);
        fields.number("station", &mut line_structure.station);
        fields.number("offset", &mut line_structure.offset);
        fields.number("height_adjustment", &mut line_structure.height_adjustment);
        fields.number("rotation", &mut line_structure.rotation);
        fields.finish()?;
        Ok(line_structure)
    }

    fn parse_line_cable(
        &self,
        node: &XmlNode,
        lookup: &SharedDataLookup<'_>,
    ) -> Result<LineCable, SnapshotError> {
        let mut line_cable = LineCable::default();

        line_cable.cable = self.read_key(node, "cable")?;
        if let Some(filepath) = &line_cable.cable {
            if !lookup.has_cable(filepath) {
                return Err(unresolved(ReferenceKind::Cable, filepath));
            }
        }

        let constraint = codec::required_child(node, "constraint")?;
        line_cable.constraint.case_weather = read_weathercase(constraint, "weather_case", lookup)?;
        let mut fields = Fields::new(constraint);
        fields.keyword(
            "condition",
            &mut line_cable.constraint.condition,
            CableConditionType::parse,
        );
        fields.number("limit", &mut line_cable.constraint.limit);
        fields.keyword(
            "type_limit",
            &mut line_cable.constraint.type_limit,
            ConstraintLimitType::parse,
        );
        fields.finish()?;

        line_cable.spacing_attachments_ruling_span =
            parse_vector(codec::required_child(node, "spacing_attachments_ruling_span")?)?;
        line_cable.weathercase_stretch_creep =
            read_weathercase(node, "weathercase_stretch_creep", lookup)?;
        line_cable.weathercase_stretch_load =
            read_weathercase(node, "weathercase_stretch_load", lookup)?;

        if let Some(connections) = node.child("connections") {
            for child in connections.children_named("connection") {
                line_cable.connections.push(CableConnection {
                    index_line_structure: parse_index(codec::required_child(
                        child,
                        "index_line_structure",
                    )?)?,
                    index_attachment: parse_index(codec::required_child(
                        child,
                        "index_attachment",
                    )?)?,
                });
            }
        }
        Ok(line_cable)
    }

    fn key_node(&self, name: &str, filepath: Option<&Path>) -> XmlNode {
        match filepath {
            Some(filepath) => XmlNode::with_text(name, self.store_key(filepath)),
            None => XmlNode::new(name),
        }
    }

    fn store_key(&self, filepath: &Path) -> String {
        match &self.base_dir {
            Some(base_dir) => paths::to_relative(filepath, base_dir),
            None => filepath.to_string_lossy().into_owned(),
        }
    }

    fn resolve_key(&self, stored: &str) -> Option<PathBuf> {
        if stored.is_empty() {
            return None;
        }
        Some(match &self.base_dir {
            Some(base_dir) => paths::resolve(stored, base_dir),
            None => PathBuf::from(stored),
        })
    }

    fn read_key(&self, node: &XmlNode, name: &str) -> Result<Option<PathBuf>, SnapshotError> {
        let child = codec::required_child(node, name)?;
        Ok(self.resolve_key(child.text()))
    }
}

fn unresolved(kind: ReferenceKind, filepath: &Path) -> SnapshotError {
    SnapshotError::Unresolved {
        kind,
        key: filepath.display().to_string(),
    }
}

fn text_key_node(name: &str, key: Option<&str>) -> XmlNode {
    match key {
        Some(key) => XmlNode::with_text(name, key),
        None => XmlNode::new(name),
    }
}

fn read_weathercase(
    node: &XmlNode,
    name: &str,
    lookup: &SharedDataLookup<'_>,
) -> Result<Option<String>, SnapshotError> {
    let description = codec::required_child(node, name)?.text();
    if description.is_empty() {
        return Ok(None);
    }
    if !lookup.has_weathercase(description) {
        return Err(SnapshotError::Unresolved {
            kind: ReferenceKind::WeatherCase,
            key: description.to_string(),
        });
    }
    Ok(Some(description.to_string()))
}

/// 连接指向的挂点必须存在于该杆塔上。
fn check_attachments(
    line: &TransmissionLine,
    line_cable: &LineCable,
    lookup: &SharedDataLookup<'_>,
) -> Result<(), SnapshotError> {
    for connection in &line_cable.connections {
        let Some(line_structure) = line.line_structures().get(connection.index_line_structure)
        else {
            continue;
        };
        let Some(structure) = line_structure
            .structure
            .as_deref()
            .and_then(|filepath| lookup.structure(filepath))
        else {
            continue;
        };
        if connection.index_attachment >= structure.structure.attachments.len() {
            return Err(SnapshotError::InvalidAttachment {
                index_line_structure: connection.index_line_structure,
                index_attachment: connection.index_attachment,
            });
        }
    }
    Ok(())
}

fn vector_node(name: &str, vector: DVec3) -> XmlNode {
    XmlNode::new(name)
        .with_child(number_node("x", vector.x))
        .with_child(number_node("y", vector.y))
        .with_child(number_node("z", vector.z))
}

fn parse_vector(node: &XmlNode) -> Result<DVec3, CodecError> {
    let mut vector = DVec3::ZERO;
    let mut fields = Fields::new(node);
    fields.number("x", &mut vector.x);
    fields.number("y", &mut vector.y);
    fields.number("z", &mut vector.z);
    fields.finish()?;
    Ok(vector)
}

fn parse_alignment_point(node: &XmlNode) -> Result<AlignmentPoint, CodecError> {
    let mut point = AlignmentPoint::default();
    let mut fields = Fields::new(node);
    fields.number("station", &mut point.station);
    fields.number("elevation", &mut point.elevation);
    fields.number("rotation", &mut point.rotation);
    fields.finish()?;
    Ok(point)
}

fn parse_index(node: &XmlNode) -> Result<usize, CodecError> {
    node.text().trim().parse::<usize>().map_err(|_| CodecError::InvalidNumber {
        element: node.name().to_string(),
        value: node.text().to_string(),
    })
}
