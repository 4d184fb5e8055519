//! 各类实体与 XML 节点之间的转换。数值按文件中的形式读写，不做单位换算。
//!
//! 解析遇到错误时不会立即返回：其余字段继续填充，最后报告第一个错误，
//! 调用方可以决定是否使用部分填充的实体。

use thiserror::Error;
use tline_core::shared::{
    Cable, CableComponent, Hardware, HardwareType, Structure, StructureAttachment,
    WeatherLoadCase,
};
use tracing::warn;

use crate::xml::XmlNode;

pub const FORMAT_VERSION: &str = "1";

pub const CABLE_ROOT: &str = "cable";
pub const HARDWARE_ROOT: &str = "hardware";
pub const STRUCTURE_ROOT: &str = "structure";
pub const WEATHERCASE_ROOT: &str = "weather_load_case";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("expected <{expected}> element, found <{found}>")]
    UnexpectedRoot { expected: String, found: String },
    #[error("<{element}> has unsupported version `{version}`")]
    UnsupportedVersion { element: String, version: String },
    #[error("<{parent}> is missing child <{name}>")]
    MissingElement { parent: String, name: String },
    #[error("<{element}> holds an invalid number `{value}`")]
    InvalidNumber { element: String, value: String },
    #[error("<{element}> holds an invalid value `{value}`")]
    InvalidValue { element: String, value: String },
}

/// 检查根元素名称与 `version` 属性。
pub fn expect_root(node: &XmlNode, expected: &str) -> Result<(), CodecError> {
    if node.name() != expected {
        return Err(CodecError::UnexpectedRoot {
            expected: expected.to_string(),
            found: node.name().to_string(),
        });
    }
    match node.attribute("version") {
        Some(FORMAT_VERSION) => Ok(()),
        other => Err(CodecError::UnsupportedVersion {
            element: expected.to_string(),
            version: other.unwrap_or_default().to_string(),
        }),
    }
}

pub(crate) fn number_node(name: &str, value: f64) -> XmlNode {
    XmlNode::with_text(name, value.to_string())
}

pub(crate) fn parse_number(node: &XmlNode) -> Result<f64, CodecError> {
    node.text()
        .trim()
        .parse::<f64>()
        .map_err(|_| CodecError::InvalidNumber {
            element: node.name().to_string(),
            value: node.text().to_string(),
        })
}

pub(crate) fn required_child<'a>(node: &'a XmlNode, name: &str) -> Result<&'a XmlNode, CodecError> {
    node.child(name).ok_or_else(|| CodecError::MissingElement {
        parent: node.name().to_string(),
        name: name.to_string(),
    })
}

/// 逐字段读取子元素，记录遇到的第一个错误。
pub(crate) struct Fields<'a> {
    node: &'a XmlNode,
    first_error: Option<CodecError>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(node: &'a XmlNode) -> Self {
        Self {
            node,
            first_error: None,
        }
    }

    pub(crate) fn record(&mut self, error: CodecError) {
        warn!(element = self.node.name(), %error, "字段解析失败");
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    pub(crate) fn child(&mut self, name: &str) -> Option<&'a XmlNode> {
        match required_child(self.node, name) {
            Ok(child) => Some(child),
            Err(error) => {
                self.record(error);
                None
            }
        }
    }

    pub(crate) fn number(&mut self, name: &str, slot: &mut f64) {
        let Some(child) = self.child(name) else {
            return;
        };
        match parse_number(child) {
            Ok(value) => *slot = value,
            Err(error) => self.record(error),
        }
    }

    pub(crate) fn text(&mut self, name: &str, slot: &mut String) {
        if let Some(child) = self.child(name) {
            *slot = child.text().to_string();
        }
    }

    /// 读取枚举类文本，由 `parse` 决定合法取值。
    pub(crate) fn keyword<T>(&mut self, name: &str, slot: &mut T, parse: impl Fn(&str) -> Option<T>) {
        let Some(child) = self.child(name) else {
            return;
        };
        match parse(child.text().trim()) {
            Some(value) => *slot = value,
            None => self.record(CodecError::InvalidValue {
                element: name.to_string(),
                value: child.text().to_string(),
            }),
        }
    }

    /// 合并嵌套解析的结果。
    pub(crate) fn merge(&mut self, result: Result<(), CodecError>) {
        if let Err(error) = result {
            if self.first_error.is_none() {
                self.first_error = Some(error);
            }
        }
    }

    pub(crate) fn finish(self) -> Result<(), CodecError> {
        match self.first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn versioned(name: &str) -> XmlNode {
    XmlNode::new(name).with_attribute("version", FORMAT_VERSION)
}

fn coefficients_node(name: &str, values: &[f64]) -> XmlNode {
    values.iter().fold(XmlNode::new(name), |node, value| {
        node.with_child(number_node("coefficient", *value))
    })
}

fn component_node(name: &str, component: &CableComponent) -> XmlNode {
    XmlNode::new(name)
        .with_child(number_node(
            "coefficient_expansion_linear_thermal",
            component.coefficient_expansion_linear_thermal,
        ))
        .with_child(coefficients_node(
            "coefficients_polynomial_creep",
            &component.coefficients_polynomial_creep,
        ))
        .with_child(coefficients_node(
            "coefficients_polynomial_loadstrain",
            &component.coefficients_polynomial_loadstrain,
        ))
        .with_child(number_node(
            "load_limit_polynomial_creep",
            component.load_limit_polynomial_creep,
        ))
        .with_child(number_node(
            "load_limit_polynomial_loadstrain",
            component.load_limit_polynomial_loadstrain,
        ))
        .with_child(number_node(
            "modulus_compression_elastic_area",
            component.modulus_compression_elastic_area,
        ))
        .with_child(number_node(
            "modulus_tension_elastic_area",
            component.modulus_tension_elastic_area,
        ))
}

pub fn cable_to_node(cable: &Cable) -> XmlNode {
    versioned(CABLE_ROOT)
        .with_child(XmlNode::with_text("name", cable.name.as_str()))
        .with_child(number_node("area_physical", cable.area_physical))
        .with_child(number_node("diameter", cable.diameter))
        .with_child(number_node("weight_unit", cable.weight_unit))
        .with_child(number_node("strength_rated", cable.strength_rated))
        .with_child(number_node(
            "temperature_properties_components",
            cable.temperature_properties_components,
        ))
        .with_child(component_node("component_core", &cable.component_core))
        .with_child(component_node("component_shell", &cable.component_shell))
}

fn parse_coefficients(fields: &mut Fields<'_>, name: &str, slot: &mut Vec<f64>) {
    let Some(node) = fields.child(name) else {
        return;
    };
    slot.clear();
    for child in node.children_named("coefficient") {
        match parse_number(child) {
            Ok(value) => slot.push(value),
            Err(error) => fields.record(error),
        }
    }
}

fn parse_component(node: &XmlNode, component: &mut CableComponent) -> Result<(), CodecError> {
    let mut fields = Fields::new(node);
    fields.number(
        "coefficient_expansion_linear_thermal",
        &mut component.coefficient_expansion_linear_thermal,
    );
    parse_coefficients(
        &mut fields,
        "coefficients_polynomial_creep",
        &mut component.coefficients_polynomial_creep,
    );
    parse_coefficients(
        &mut fields,
        "coefficients_polynomial_loadstrain",
        &mut component.coefficients_polynomial_loadstrain,
    );
    fields.number(
        "load_limit_polynomial_creep",
        &mut component.load_limit_polynomial_creep,
    );
    fields.number(
        "load_limit_polynomial_loadstrain",
        &mut component.load_limit_polynomial_loadstrain,
    );
    fields.number(
        "modulus_compression_elastic_area",
        &mut component.modulus_compression_elastic_area,
    );
    fields.number(
        "modulus_tension_elastic_area",
        &mut component.modulus_tension_elastic_area,
    );
    fields.finish()
}

pub fn parse_cable(node: &XmlNode, cable: &mut Cable) -> Result<(), CodecError> {
    expect_root(node, CABLE_ROOT)?;
    let mut fields = Fields::new(node);
    fields.text("name", &mut cable.name);
    fields.number("area_physical", &mut cable.area_physical);
    fields.number("diameter", &mut cable.diameter);
    fields.number("weight_unit", &mut cable.weight_unit);
    fields.number("strength_rated", &mut cable.strength_rated);
    fields.number(
        "temperature_properties_components",
        &mut cable.temperature_properties_components,
    );
    if let Some(core) = fields.child("component_core") {
        let result = parse_component(core, &mut cable.component_core);
        fields.merge(result);
    }
    if let Some(shell) = fields.child("component_shell") {
        let result = parse_component(shell, &mut cable.component_shell);
        fields.merge(result);
    }
    fields.finish()
}

pub fn hardware_to_node(hardware: &Hardware) -> XmlNode {
    versioned(HARDWARE_ROOT)
        .with_child(XmlNode::with_text("name", hardware.name.as_str()))
        .with_child(XmlNode::with_text("type", hardware.type_hardware.as_str()))
        .with_child(number_node("area_cross_section", hardware.area_cross_section))
        .with_child(number_node("length", hardware.length))
        .with_child(number_node("weight", hardware.weight))
}

pub fn parse_hardware(node: &XmlNode, hardware: &mut Hardware) -> Result<(), CodecError> {
    expect_root(node, HARDWARE_ROOT)?;
    let mut fields = Fields::new(node);
    fields.text("name", &mut hardware.name);
    fields.keyword("type", &mut hardware.type_hardware, HardwareType::parse);
    fields.number("area_cross_section", &mut hardware.area_cross_section);
    fields.number("length", &mut hardware.length);
    fields.number("weight", &mut hardware.weight);
    fields.finish()
}

pub fn structure_to_node(structure: &Structure) -> XmlNode {
    let attachments = structure
        .attachments
        .iter()
        .fold(XmlNode::new("attachments"), |node, attachment| {
            node.with_child(
                XmlNode::new("attachment")
                    .with_child(number_node(
                        "offset_longitudinal",
                        attachment.offset_longitudinal,
                    ))
                    .with_child(number_node("offset_transverse", attachment.offset_transverse))
                    .with_child(number_node(
                        "offset_vertical_top",
                        attachment.offset_vertical_top,
                    )),
            )
        });
    versioned(STRUCTURE_ROOT)
        .with_child(XmlNode::with_text("name", structure.name.as_str()))
        .with_child(number_node("height", structure.height))
        .with_child(attachments)
}

pub fn parse_structure(node: &XmlNode, structure: &mut Structure) -> Result<(), CodecError> {
    expect_root(node, STRUCTURE_ROOT)?;
    let mut fields = Fields::new(node);
    fields.text("name", &mut structure.name);
    fields.number("height", &mut structure.height);
    if let Some(attachments) = fields.child("attachments") {
        structure.attachments.clear();
        for node in attachments.children_named("attachment") {
            let mut attachment = StructureAttachment::default();
            let mut inner = Fields::new(node);
            inner.number("offset_longitudinal", &mut attachment.offset_longitudinal);
            inner.number("offset_transverse", &mut attachment.offset_transverse);
            inner.number("offset_vertical_top", &mut attachment.offset_vertical_top);
            fields.merge(inner.finish());
            structure.attachments.push(attachment);
        }
    }
    fields.finish()
}

pub fn weathercase_to_node(weathercase: &WeatherLoadCase) -> XmlNode {
    versioned(WEATHERCASE_ROOT)
        .with_child(XmlNode::with_text(
            "description",
            weathercase.description.as_str(),
        ))
        .with_child(number_node("thickness_ice", weathercase.thickness_ice))
        .with_child(number_node("density_ice", weathercase.density_ice))
        .with_child(number_node("pressure_wind", weathercase.pressure_wind))
        .with_child(number_node(
            "temperature_cable",
            weathercase.temperature_cable,
        ))
}

pub fn parse_weathercase(
    node: &XmlNode,
    weathercase: &mut WeatherLoadCase,
) -> Result<(), CodecError> {
    expect_root(node, WEATHERCASE_ROOT)?;
    let mut fields = Fields::new(node);
    fields.text("description", &mut weathercase.description);
    fields.number("thickness_ice", &mut weathercase.thickness_ice);
    fields.number("density_ice", &mut weathercase.density_ice);
    fields.number("pressure_wind", &mut weathercase.pressure_wind);
    fields.number("temperature_cable", &mut weathercase.temperature_cable);
    fields.finish()
}
