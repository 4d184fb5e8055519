pub mod convert;

pub mod units {
    use serde::{Deserialize, Serialize};

    pub const METERS_PER_FOOT: f64 = 0.3048;
    pub const NEWTONS_PER_POUND: f64 = 4.448_221_615_260_5;
    pub const INCHES_PER_FOOT: f64 = 12.0;
    pub const MILLIMETERS_PER_METER: f64 = 1_000.0;

    /// 计量单位制，文件中以 `units` 属性记录。
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum UnitSystem {
        #[default]
        Imperial,
        Metric,
    }

    impl UnitSystem {
        /// 写入 XML `units` 属性时使用的取值。
        #[inline]
        pub fn as_attribute(self) -> &'static str {
            match self {
                UnitSystem::Imperial => "Imperial",
                UnitSystem::Metric => "Metric",
            }
        }

        pub fn from_attribute(value: &str) -> Option<Self> {
            match value {
                "Imperial" => Some(UnitSystem::Imperial),
                "Metric" => Some(UnitSystem::Metric),
                _ => None,
            }
        }
    }

    /// 单位风格：`Consistent` 为内部计算形式，`Different` 为显示/存储形式。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum UnitStyle {
        Consistent,
        Different,
    }

    #[inline]
    pub fn fahrenheit_to_celsius(value: f64) -> f64 {
        (value - 32.0) * 5.0 / 9.0
    }

    #[inline]
    pub fn celsius_to_fahrenheit(value: f64) -> f64 {
        value * 9.0 / 5.0 + 32.0
    }
}

pub mod shared {
    use std::path::{Path, PathBuf};

    use serde::{Deserialize, Serialize};

    /// 导线组件（芯/外层）的力学与热学参数。
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct CableComponent {
        pub coefficient_expansion_linear_thermal: f64,
        pub coefficients_polynomial_creep: Vec<f64>,
        pub coefficients_polynomial_loadstrain: Vec<f64>,
        pub load_limit_polynomial_creep: f64,
        pub load_limit_polynomial_loadstrain: f64,
        pub modulus_compression_elastic_area: f64,
        pub modulus_tension_elastic_area: f64,
    }

    impl CableComponent {
        /// 蠕变与荷载-应变两组多项式系数，便于统一补零或换算。
        pub fn polynomials_mut(&mut self) -> [&mut Vec<f64>; 2] {
            [
                &mut self.coefficients_polynomial_creep,
                &mut self.coefficients_polynomial_loadstrain,
            ]
        }
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Cable {
        pub name: String,
        pub area_physical: f64,
        pub diameter: f64,
        pub weight_unit: f64,
        pub strength_rated: f64,
        pub temperature_properties_components: f64,
        pub component_core: CableComponent,
        pub component_shell: CableComponent,
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum HardwareType {
        Deadend,
        #[default]
        Suspension,
    }

    impl HardwareType {
        pub fn as_str(self) -> &'static str {
            match self {
                HardwareType::Deadend => "Deadend",
                HardwareType::Suspension => "Suspension",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "Deadend" => Some(HardwareType::Deadend),
                "Suspension" => Some(HardwareType::Suspension),
                _ => None,
            }
        }
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Hardware {
        pub name: String,
        pub type_hardware: HardwareType,
        pub area_cross_section: f64,
        pub length: f64,
        pub weight: f64,
    }

    /// 杆塔挂点，相对杆塔顶部中心的偏移。
    #[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct StructureAttachment {
        pub offset_longitudinal: f64,
        pub offset_transverse: f64,
        pub offset_vertical_top: f64,
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Structure {
        pub name: String,
        pub height: f64,
        pub attachments: Vec<StructureAttachment>,
    }

    /// 气象荷载工况，由文档自身保存，以描述字符串作为唯一键。
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct WeatherLoadCase {
        pub description: String,
        pub thickness_ice: f64,
        pub density_ice: f64,
        pub pressure_wind: f64,
        pub temperature_cable: f64,
    }

    /// 导线与其外部文件的配对，文件路径为集合内唯一键。
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct CableFile {
        pub filepath: PathBuf,
        pub cable: Cable,
    }

    impl CableFile {
        pub fn new(filepath: impl Into<PathBuf>, cable: Cable) -> Self {
            Self {
                filepath: filepath.into(),
                cable,
            }
        }
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct HardwareFile {
        pub filepath: PathBuf,
        pub hardware: Hardware,
    }

    impl HardwareFile {
        pub fn new(filepath: impl Into<PathBuf>, hardware: Hardware) -> Self {
            Self {
                filepath: filepath.into(),
                hardware,
            }
        }
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct StructureFile {
        pub filepath: PathBuf,
        pub structure: Structure,
    }

    impl StructureFile {
        pub fn new(filepath: impl Into<PathBuf>, structure: Structure) -> Self {
            Self {
                filepath: filepath.into(),
                structure,
            }
        }
    }

    /// 外部文件条目的公共视图，供唯一性检查与引用查找复用。
    pub trait FileEntry {
        fn filepath(&self) -> &Path;
    }

    impl FileEntry for CableFile {
        fn filepath(&self) -> &Path {
            &self.filepath
        }
    }

    impl FileEntry for HardwareFile {
        fn filepath(&self) -> &Path {
            &self.filepath
        }
    }

    impl FileEntry for StructureFile {
        fn filepath(&self) -> &Path {
            &self.filepath
        }
    }
}

pub mod line {
    use std::path::{Path, PathBuf};

    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// 线路走廊中心线上的一个控制点。
    #[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct AlignmentPoint {
        pub station: f64,
        pub elevation: f64,
        pub rotation: f64,
    }

    /// 线路上的一基杆塔。`structure` 与 `hardwares` 只保存共享数据的键（文件路径）。
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LineStructure {
        pub structure: Option<PathBuf>,
        /// 每个挂点对应的金具，未挂金具时为 `None`。
        pub hardwares: Vec<Option<PathBuf>>,
        pub station: f64,
        pub offset: f64,
        pub height_adjustment: f64,
        pub rotation: f64,
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum CableConditionType {
        #[default]
        Initial,
        Creep,
        Load,
    }

    impl CableConditionType {
        pub fn as_str(self) -> &'static str {
            match self {
                CableConditionType::Initial => "Initial",
                CableConditionType::Creep => "Creep",
                CableConditionType::Load => "Load",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "Initial" => Some(CableConditionType::Initial),
                "Creep" => Some(CableConditionType::Creep),
                "Load" => Some(CableConditionType::Load),
                _ => None,
            }
        }
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ConstraintLimitType {
        CatenaryConstant,
        #[default]
        HorizontalTension,
        Length,
        Sag,
        SupportTension,
    }

    impl ConstraintLimitType {
        pub fn as_str(self) -> &'static str {
            match self {
                ConstraintLimitType::CatenaryConstant => "CatenaryConstant",
                ConstraintLimitType::HorizontalTension => "HorizontalTension",
                ConstraintLimitType::Length => "Length",
                ConstraintLimitType::Sag => "Sag",
                ConstraintLimitType::SupportTension => "SupportTension",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "CatenaryConstant" => Some(ConstraintLimitType::CatenaryConstant),
                "HorizontalTension" => Some(ConstraintLimitType::HorizontalTension),
                "Length" => Some(ConstraintLimitType::Length),
                "Sag" => Some(ConstraintLimitType::Sag),
                "SupportTension" => Some(ConstraintLimitType::SupportTension),
                _ => None,
            }
        }

        /// 张力类限值按力换算，其余按长度换算。
        #[inline]
        pub fn is_tension(self) -> bool {
            matches!(
                self,
                ConstraintLimitType::HorizontalTension | ConstraintLimitType::SupportTension
            )
        }
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct CableConstraint {
        /// 约束所用气象工况的描述。
        pub case_weather: Option<String>,
        pub condition: CableConditionType,
        pub limit: f64,
        pub type_limit: ConstraintLimitType,
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CableConnection {
        pub index_line_structure: usize,
        pub index_attachment: usize,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LineCable {
        pub cable: Option<PathBuf>,
        pub constraint: CableConstraint,
        pub spacing_attachments_ruling_span: DVec3,
        pub weathercase_stretch_creep: Option<String>,
        pub weathercase_stretch_load: Option<String>,
        pub connections: Vec<CableConnection>,
    }

    impl Default for LineCable {
        fn default() -> Self {
            Self {
                cable: None,
                constraint: CableConstraint::default(),
                spacing_attachments_ruling_span: DVec3::ZERO,
                weathercase_stretch_creep: None,
                weathercase_stretch_load: None,
                connections: Vec::new(),
            }
        }
    }

    impl LineCable {
        /// 三处气象工况引用：约束、蠕变拉伸、荷载拉伸。
        pub fn weathercases(&self) -> impl Iterator<Item = &str> {
            [
                self.constraint.case_weather.as_deref(),
                self.weathercase_stretch_creep.as_deref(),
                self.weathercase_stretch_load.as_deref(),
            ]
            .into_iter()
            .flatten()
        }

        fn weathercase_slots_mut(&mut self) -> [&mut Option<String>; 3] {
            [
                &mut self.constraint.case_weather,
                &mut self.weathercase_stretch_creep,
                &mut self.weathercase_stretch_load,
            ]
        }
    }

    /// 输电线路模型。共享数据只以键的形式被引用，从不持有实体本身。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TransmissionLine {
        pub name: String,
        origin: DVec3,
        alignment: Vec<AlignmentPoint>,
        line_structures: Vec<LineStructure>,
        line_cables: Vec<LineCable>,
        /// 每基杆塔的基础点（派生数据，不参与序列化）。
        #[serde(skip)]
        points_structure_base: Vec<DVec3>,
    }

    impl Default for TransmissionLine {
        fn default() -> Self {
            Self {
                name: String::new(),
                origin: DVec3::ZERO,
                alignment: Vec::new(),
                line_structures: Vec::new(),
                line_cables: Vec::new(),
                points_structure_base: Vec::new(),
            }
        }
    }

    impl TransmissionLine {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                ..Self::default()
            }
        }

        #[inline]
        pub fn origin(&self) -> DVec3 {
            self.origin
        }

        pub fn set_origin(&mut self, origin: DVec3) {
            self.origin = origin;
            self.update_structure_points();
        }

        #[inline]
        pub fn alignment(&self) -> &[AlignmentPoint] {
            &self.alignment
        }

        /// 按里程有序插入控制点。
        pub fn add_alignment_point(&mut self, point: AlignmentPoint) {
            let index = self
                .alignment
                .iter()
                .position(|existing| existing.station > point.station)
                .unwrap_or(self.alignment.len());
            self.alignment.insert(index, point);
            self.update_structure_points();
        }

        #[inline]
        pub fn line_structures(&self) -> &[LineStructure] {
            &self.line_structures
        }

        #[inline]
        pub fn line_cables(&self) -> &[LineCable] {
            &self.line_cables
        }

        #[inline]
        pub fn points_structure_base(&self) -> &[DVec3] {
            &self.points_structure_base
        }

        pub fn insert_line_structure(&mut self, index: usize, structure: LineStructure) -> bool {
            if index > self.line_structures.len() {
                return false;
            }
            self.line_structures.insert(index, structure);
            for line_cable in &mut self.line_cables {
                for connection in &mut line_cable.connections {
                    if connection.index_line_structure >= index {
                        connection.index_line_structure += 1;
                    }
                }
            }
            self.update_structure_points();
            true
        }

        /// 原位替换杆塔并重新计算派生数据。
        pub fn modify_line_structure(&mut self, index: usize, structure: LineStructure) -> bool {
            let Some(slot) = self.line_structures.get_mut(index) else {
                return false;
            };
            *slot = structure;
            self.update_structure_points();
            true
        }

        /// 删除杆塔，同时移除指向它的导线连接并修正其后的索引。
        pub fn delete_line_structure(&mut self, index: usize) -> bool {
            if index >= self.line_structures.len() {
                return false;
            }
            self.line_structures.remove(index);
            for line_cable in &mut self.line_cables {
                line_cable
                    .connections
                    .retain(|connection| connection.index_line_structure != index);
                for connection in &mut line_cable.connections {
                    if connection.index_line_structure > index {
                        connection.index_line_structure -= 1;
                    }
                }
            }
            self.update_structure_points();
            true
        }

        pub fn insert_line_cable(&mut self, index: usize, line_cable: LineCable) -> bool {
            if index > self.line_cables.len() {
                return false;
            }
            let valid = line_cable
                .connections
                .iter()
                .all(|connection| connection.index_line_structure < self.line_structures.len());
            if !valid {
                return false;
            }
            self.line_cables.insert(index, line_cable);
            true
        }

        pub fn modify_line_cable(&mut self, index: usize, line_cable: LineCable) -> bool {
            if index >= self.line_cables.len() {
                return false;
            }
            let valid = line_cable
                .connections
                .iter()
                .all(|connection| connection.index_line_structure < self.line_structures.len());
            if !valid {
                return false;
            }
            self.line_cables[index] = line_cable;
            true
        }

        pub fn delete_line_cable(&mut self, index: usize) -> bool {
            if index >= self.line_cables.len() {
                return false;
            }
            self.line_cables.remove(index);
            true
        }

        pub fn references_cable(&self, filepath: &Path) -> bool {
            self.line_cables
                .iter()
                .any(|line_cable| line_cable.cable.as_deref() == Some(filepath))
        }

        pub fn references_hardware(&self, filepath: &Path) -> bool {
            self.line_structures.iter().any(|line_structure| {
                line_structure
                    .hardwares
                    .iter()
                    .any(|hardware| hardware.as_deref() == Some(filepath))
            })
        }

        pub fn references_structure(&self, filepath: &Path) -> bool {
            self.line_structures
                .iter()
                .any(|line_structure| line_structure.structure.as_deref() == Some(filepath))
        }

        pub fn references_weathercase(&self, description: &str) -> bool {
            self.line_cables.iter().any(|line_cable| {
                line_cable
                    .weathercases()
                    .any(|reference| reference == description)
            })
        }

        /// 将导线引用从旧路径改指到新路径，返回改动数量。
        pub fn retarget_cable(&mut self, from: &Path, to: &Path) -> usize {
            let mut count = 0;
            for line_cable in &mut self.line_cables {
                if line_cable.cable.as_deref() == Some(from) {
                    line_cable.cable = Some(to.to_path_buf());
                    count += 1;
                }
            }
            count
        }

        pub fn retarget_hardware(&mut self, from: &Path, to: &Path) -> usize {
            let mut count = 0;
            for line_structure in &mut self.line_structures {
                for hardware in &mut line_structure.hardwares {
                    if hardware.as_deref() == Some(from) {
                        *hardware = Some(to.to_path_buf());
                        count += 1;
                    }
                }
            }
            count
        }

        pub fn retarget_structure(&mut self, from: &Path, to: &Path) -> usize {
            let mut count = 0;
            for line_structure in &mut self.line_structures {
                if line_structure.structure.as_deref() == Some(from) {
                    line_structure.structure = Some(to.to_path_buf());
                    count += 1;
                }
            }
            count
        }

        pub fn retarget_weathercase(&mut self, from: &str, to: &str) -> usize {
            let mut count = 0;
            for line_cable in &mut self.line_cables {
                for slot in line_cable.weathercase_slots_mut() {
                    if slot.as_deref() == Some(from) {
                        *slot = Some(to.to_string());
                        count += 1;
                    }
                }
            }
            count
        }

        /// 按里程在控制点之间线性插值高程，超出范围时取端点值。
        pub fn elevation_at(&self, station: f64) -> f64 {
            let Some(first) = self.alignment.first() else {
                return 0.0;
            };
            if station <= first.station {
                return first.elevation;
            }
            for pair in self.alignment.windows(2) {
                let (start, end) = (pair[0], pair[1]);
                if station <= end.station {
                    let span = end.station - start.station;
                    if span.abs() <= f64::EPSILON {
                        return end.elevation;
                    }
                    let ratio = (station - start.station) / span;
                    return start.elevation + ratio * (end.elevation - start.elevation);
                }
            }
            self.alignment
                .last()
                .map(|point| point.elevation)
                .unwrap_or_default()
        }

        pub(crate) fn update_structure_points(&mut self) {
            let points = self
                .line_structures
                .iter()
                .map(|line_structure| {
                    self.origin
                        + DVec3::new(
                            line_structure.station,
                            line_structure.offset,
                            self.elevation_at(line_structure.station)
                                + line_structure.height_adjustment,
                        )
                })
                .collect();
            self.points_structure_base = points;
        }

        pub(crate) fn parts_mut(
            &mut self,
        ) -> (
            &mut DVec3,
            &mut Vec<AlignmentPoint>,
            &mut Vec<LineStructure>,
            &mut Vec<LineCable>,
        ) {
            (
                &mut self.origin,
                &mut self.alignment,
                &mut self.line_structures,
                &mut self.line_cables,
            )
        }
    }

}
