//! 外部实体文件（导线、金具、杆塔）的读写。
//!
//! 读取时先按文件记录的单位制把显示形式换成一致形式，再换算到调用方的单位制；
//! 写出时反向进行，内存中的实体从不被修改。

use std::fs;
use std::path::Path;

use tline_core::convert::UnitConvert;
use tline_core::shared::{Cable, Hardware, Structure};
use tline_core::units::{UnitStyle, UnitSystem};
use tracing::{debug, error, info, warn};

use crate::codec::{self, CodecError};
use crate::paths;
use crate::xml::XmlNode;
use crate::IoError;

/// 导线多项式系数在读取后至少补零到该长度。
pub const MIN_POLYNOMIAL_COEFFICIENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    Ok,
    ParseError,
    FileError,
}

/// 读取结果。解析错误时仍携带部分填充的实体，由调用方决定取舍。
#[derive(Debug)]
pub enum Loaded<T> {
    Ok(T),
    ParseError { entity: T, reason: String },
    FileError(IoError),
}

impl<T> Loaded<T> {
    pub fn status(&self) -> LoadStatus {
        match self {
            Loaded::Ok(_) => LoadStatus::Ok,
            Loaded::ParseError { .. } => LoadStatus::ParseError,
            Loaded::FileError(_) => LoadStatus::FileError,
        }
    }

    pub fn entity(&self) -> Option<&T> {
        match self {
            Loaded::Ok(entity) | Loaded::ParseError { entity, .. } => Some(entity),
            Loaded::FileError(_) => None,
        }
    }

    pub fn into_entity(self) -> Option<T> {
        match self {
            Loaded::Ok(entity) | Loaded::ParseError { entity, .. } => Some(entity),
            Loaded::FileError(_) => None,
        }
    }
}

/// 可以独立保存为外部文件的实体。
pub trait ExternalEntity: Default + Clone + UnitConvert {
    const ROOT: &'static str;

    fn to_node(&self) -> XmlNode;

    fn parse_node(node: &XmlNode, entity: &mut Self) -> Result<(), CodecError>;

    /// 换算完成后的整理步骤。
    fn finish_load(&mut self) {}
}

impl ExternalEntity for Cable {
    const ROOT: &'static str = codec::CABLE_ROOT;

    fn to_node(&self) -> XmlNode {
        codec::cable_to_node(self)
    }

    fn parse_node(node: &XmlNode, entity: &mut Self) -> Result<(), CodecError> {
        codec::parse_cable(node, entity)
    }

    fn finish_load(&mut self) {
        for component in [&mut self.component_core, &mut self.component_shell] {
            for coefficients in component.polynomials_mut() {
                if coefficients.len() < MIN_POLYNOMIAL_COEFFICIENTS {
                    coefficients.resize(MIN_POLYNOMIAL_COEFFICIENTS, 0.0);
                }
            }
        }
    }
}

impl ExternalEntity for Hardware {
    const ROOT: &'static str = codec::HARDWARE_ROOT;

    fn to_node(&self) -> XmlNode {
        codec::hardware_to_node(self)
    }

    fn parse_node(node: &XmlNode, entity: &mut Self) -> Result<(), CodecError> {
        codec::parse_hardware(node, entity)
    }
}

impl ExternalEntity for Structure {
    const ROOT: &'static str = codec::STRUCTURE_ROOT;

    fn to_node(&self) -> XmlNode {
        codec::structure_to_node(self)
    }

    fn parse_node(node: &XmlNode, entity: &mut Self) -> Result<(), CodecError> {
        codec::parse_structure(node, entity)
    }
}

pub fn load<T: ExternalEntity>(filepath: &Path, units: UnitSystem) -> Loaded<T> {
    info!(path = %filepath.display(), kind = T::ROOT, "读取外部文件");

    if !paths::exists(filepath) {
        error!(path = %filepath.display(), "文件不存在");
        return Loaded::FileError(IoError::NotFound(filepath.to_path_buf()));
    }

    let content = match fs::read_to_string(filepath) {
        Ok(content) => content,
        Err(source) => {
            error!(path = %filepath.display(), %source, "读取文件失败");
            return Loaded::FileError(IoError::ReadError {
                path: filepath.to_path_buf(),
                source,
            });
        }
    };

    let root = match XmlNode::parse_str(&content) {
        Ok(root) => root,
        Err(source) => {
            error!(path = %filepath.display(), %source, "XML 格式无效");
            return Loaded::FileError(IoError::InvalidXml {
                path: filepath.to_path_buf(),
                source,
            });
        }
    };

    if root.name() != T::ROOT {
        let reason = format!("expected <{}> root, found <{}>", T::ROOT, root.name());
        error!(path = %filepath.display(), %reason, "根元素不匹配");
        return Loaded::ParseError {
            entity: T::default(),
            reason,
        };
    }

    let units_file = match root.attribute("units") {
        Some(value) => match UnitSystem::from_attribute(value) {
            Some(units_file) => units_file,
            None => {
                let reason = format!("invalid units attribute `{value}`");
                error!(path = %filepath.display(), %reason, "单位属性无效");
                return Loaded::ParseError {
                    entity: T::default(),
                    reason,
                };
            }
        },
        None => {
            let reason = "missing units attribute".to_string();
            error!(path = %filepath.display(), %reason, "缺少单位属性");
            return Loaded::ParseError {
                entity: T::default(),
                reason,
            };
        }
    };

    let mut entity = T::default();
    let parsed = T::parse_node(&root, &mut entity);
    entity.convert_unit_style(units_file, UnitStyle::Different, UnitStyle::Consistent);
    entity.convert_unit_system(units_file, units);
    entity.finish_load();

    match parsed {
        Ok(()) => {
            debug!(path = %filepath.display(), ?units_file, "外部文件读取完成");
            Loaded::Ok(entity)
        }
        Err(error) => {
            warn!(path = %filepath.display(), %error, "文件内容无效，返回部分实体");
            Loaded::ParseError {
                entity,
                reason: error.to_string(),
            }
        }
    }
}

pub fn save<T: ExternalEntity>(
    filepath: &Path,
    entity: &T,
    units: UnitSystem,
) -> Result<(), IoError> {
    let mut converted = entity.clone();
    converted.convert_unit_style(units, UnitStyle::Consistent, UnitStyle::Different);

    let mut root = converted.to_node();
    root.set_attribute("units", units.as_attribute());
    let content = root.to_xml_string().map_err(|source| IoError::InvalidXml {
        path: filepath.to_path_buf(),
        source,
    })?;

    fs::write(filepath, content).map_err(|source| {
        error!(path = %filepath.display(), %source, "写入文件失败");
        IoError::WriteError {
            path: filepath.to_path_buf(),
            source,
        }
    })?;
    info!(path = %filepath.display(), kind = T::ROOT, "外部文件已保存");
    Ok(())
}

#[inline]
pub fn load_cable(filepath: &Path, units: UnitSystem) -> Loaded<Cable> {
    load(filepath, units)
}

#[inline]
pub fn load_hardware(filepath: &Path, units: UnitSystem) -> Loaded<Hardware> {
    load(filepath, units)
}

#[inline]
pub fn load_structure(filepath: &Path, units: UnitSystem) -> Loaded<Structure> {
    load(filepath, units)
}

#[inline]
pub fn save_cable(filepath: &Path, cable: &Cable, units: UnitSystem) -> Result<(), IoError> {
    save(filepath, cable, units)
}

#[inline]
pub fn save_hardware(
    filepath: &Path,
    hardware: &Hardware,
    units: UnitSystem,
) -> Result<(), IoError> {
    save(filepath, hardware, units)
}

#[inline]
pub fn save_structure(
    filepath: &Path,
    structure: &Structure,
    units: UnitSystem,
) -> Result<(), IoError> {
    save(filepath, structure, units)
}
