//! 单位换算：在单位风格（内部一致形式 / 显示存储形式）与单位制（英制 / 公制）之间
//! 原位转换实体。所有换算都是纯函数，不分配新的实体身份。

use crate::line::TransmissionLine;
use crate::shared::{Cable, CableComponent, Hardware, Structure, WeatherLoadCase};
use crate::units::{
    INCHES_PER_FOOT, METERS_PER_FOOT, MILLIMETERS_PER_METER, NEWTONS_PER_POUND, UnitStyle,
    UnitSystem, celsius_to_fahrenheit, fahrenheit_to_celsius,
};

const PERCENT: f64 = 100.0;

pub trait UnitConvert {
    /// 在同一单位制内切换单位风格，`from == to` 时不做任何事。
    fn convert_unit_style(&mut self, system: UnitSystem, from: UnitStyle, to: UnitStyle);

    /// 在单位制之间换算，要求实体处于 `Consistent` 风格。
    fn convert_unit_system(&mut self, from: UnitSystem, to: UnitSystem);
}

/// 风格换算方向。`apply` 的 `base` 为每个一致单位对应的显示单位数量。
#[derive(Debug, Clone, Copy)]
struct StyleScale {
    to: UnitStyle,
}

impl StyleScale {
    fn new(from: UnitStyle, to: UnitStyle) -> Option<Self> {
        (from != to).then_some(Self { to })
    }

    #[inline]
    fn apply(self, value: &mut f64, base: f64) {
        match self.to {
            UnitStyle::Consistent => *value /= base,
            UnitStyle::Different => *value *= base,
        }
    }

    /// 与 `apply` 方向相反，用于"显示单位更大"的量（例如按百分应变给出的多项式系数）。
    #[inline]
    fn apply_inverse(self, value: &mut f64, base: f64) {
        match self.to {
            UnitStyle::Consistent => *value *= base,
            UnitStyle::Different => *value /= base,
        }
    }
}

/// 小长度单位（英寸或毫米）与一致长度单位（英尺或米）之比。
#[inline]
fn small_length_base(system: UnitSystem) -> f64 {
    match system {
        UnitSystem::Imperial => INCHES_PER_FOOT,
        UnitSystem::Metric => MILLIMETERS_PER_METER,
    }
}

#[derive(Debug, Clone, Copy)]
struct SystemScale {
    length: f64,
    force: f64,
    to: UnitSystem,
}

impl SystemScale {
    fn new(from: UnitSystem, to: UnitSystem) -> Option<Self> {
        if from == to {
            return None;
        }
        let (length, force) = match to {
            UnitSystem::Metric => (METERS_PER_FOOT, NEWTONS_PER_POUND),
            UnitSystem::Imperial => (1.0 / METERS_PER_FOOT, 1.0 / NEWTONS_PER_POUND),
        };
        Some(Self { length, force, to })
    }

    #[inline]
    fn length(self, value: &mut f64) {
        *value *= self.length;
    }

    #[inline]
    fn area(self, value: &mut f64) {
        *value *= self.length * self.length;
    }

    #[inline]
    fn force(self, value: &mut f64) {
        *value *= self.force;
    }

    /// 力 / 长度^exponent，例如线重（1）、风压（2）、冰密度（3）。
    #[inline]
    fn force_per_length(self, value: &mut f64, exponent: i32) {
        *value *= self.force / self.length.powi(exponent);
    }

    #[inline]
    fn temperature(self, value: &mut f64) {
        *value = match self.to {
            UnitSystem::Metric => fahrenheit_to_celsius(*value),
            UnitSystem::Imperial => celsius_to_fahrenheit(*value),
        };
    }

    /// 每度的系数：华氏度更小，因此每华氏度的数值更小。
    #[inline]
    fn per_degree(self, value: &mut f64) {
        *value = match self.to {
            UnitSystem::Metric => *value * 9.0 / 5.0,
            UnitSystem::Imperial => *value * 5.0 / 9.0,
        };
    }
}

fn convert_component_style(component: &mut CableComponent, scale: StyleScale) {
    scale.apply(&mut component.coefficient_expansion_linear_thermal, PERCENT);
    for polynomial in component.polynomials_mut() {
        for (order, coefficient) in polynomial.iter_mut().enumerate() {
            scale.apply_inverse(coefficient, PERCENT.powi(order as i32));
        }
    }
    scale.apply_inverse(&mut component.modulus_compression_elastic_area, PERCENT);
    scale.apply_inverse(&mut component.modulus_tension_elastic_area, PERCENT);
}

fn convert_component_system(component: &mut CableComponent, scale: SystemScale) {
    scale.per_degree(&mut component.coefficient_expansion_linear_thermal);
    for polynomial in component.polynomials_mut() {
        polynomial.iter_mut().for_each(|coefficient| scale.force(coefficient));
    }
    scale.force(&mut component.load_limit_polynomial_creep);
    scale.force(&mut component.load_limit_polynomial_loadstrain);
    scale.force(&mut component.modulus_compression_elastic_area);
    scale.force(&mut component.modulus_tension_elastic_area);
}

impl UnitConvert for Cable {
    fn convert_unit_style(&mut self, system: UnitSystem, from: UnitStyle, to: UnitStyle) {
        let Some(scale) = StyleScale::new(from, to) else {
            return;
        };
        let base = small_length_base(system);
        scale.apply(&mut self.area_physical, base * base);
        scale.apply(&mut self.diameter, base);
        convert_component_style(&mut self.component_core, scale);
        convert_component_style(&mut self.component_shell, scale);
    }

    fn convert_unit_system(&mut self, from: UnitSystem, to: UnitSystem) {
        let Some(scale) = SystemScale::new(from, to) else {
            return;
        };
        scale.area(&mut self.area_physical);
        scale.length(&mut self.diameter);
        scale.force_per_length(&mut self.weight_unit, 1);
        scale.force(&mut self.strength_rated);
        scale.temperature(&mut self.temperature_properties_components);
        convert_component_system(&mut self.component_core, scale);
        convert_component_system(&mut self.component_shell, scale);
    }
}

impl UnitConvert for Hardware {
    fn convert_unit_style(&mut self, system: UnitSystem, from: UnitStyle, to: UnitStyle) {
        let Some(scale) = StyleScale::new(from, to) else {
            return;
        };
        let base = small_length_base(system);
        scale.apply(&mut self.area_cross_section, base * base);
    }

    fn convert_unit_system(&mut self, from: UnitSystem, to: UnitSystem) {
        let Some(scale) = SystemScale::new(from, to) else {
            return;
        };
        scale.area(&mut self.area_cross_section);
        scale.length(&mut self.length);
        scale.force(&mut self.weight);
    }
}

impl UnitConvert for Structure {
    /// 杆塔只含长度量，两种风格使用相同单位。
    fn convert_unit_style(&mut self, _system: UnitSystem, _from: UnitStyle, _to: UnitStyle) {}

    fn convert_unit_system(&mut self, from: UnitSystem, to: UnitSystem) {
        let Some(scale) = SystemScale::new(from, to) else {
            return;
        };
        scale.length(&mut self.height);
        for attachment in &mut self.attachments {
            scale.length(&mut attachment.offset_longitudinal);
            scale.length(&mut attachment.offset_transverse);
            scale.length(&mut attachment.offset_vertical_top);
        }
    }
}

impl UnitConvert for WeatherLoadCase {
    fn convert_unit_style(&mut self, system: UnitSystem, from: UnitStyle, to: UnitStyle) {
        let Some(scale) = StyleScale::new(from, to) else {
            return;
        };
        scale.apply(&mut self.thickness_ice, small_length_base(system));
    }

    fn convert_unit_system(&mut self, from: UnitSystem, to: UnitSystem) {
        let Some(scale) = SystemScale::new(from, to) else {
            return;
        };
        scale.length(&mut self.thickness_ice);
        scale.force_per_length(&mut self.density_ice, 3);
        scale.force_per_length(&mut self.pressure_wind, 2);
        scale.temperature(&mut self.temperature_cable);
    }
}

impl UnitConvert for TransmissionLine {
    /// 线路数据（里程、高程、偏移、张力）在两种风格下单位相同。
    fn convert_unit_style(&mut self, _system: UnitSystem, _from: UnitStyle, _to: UnitStyle) {}

    fn convert_unit_system(&mut self, from: UnitSystem, to: UnitSystem) {
        let Some(scale) = SystemScale::new(from, to) else {
            return;
        };
        let (origin, alignment, line_structures, line_cables) = self.parts_mut();
        *origin *= scale.length;
        for point in alignment.iter_mut() {
            scale.length(&mut point.station);
            scale.length(&mut point.elevation);
        }
        for line_structure in line_structures.iter_mut() {
            scale.length(&mut line_structure.station);
            scale.length(&mut line_structure.offset);
            scale.length(&mut line_structure.height_adjustment);
        }
        for line_cable in line_cables.iter_mut() {
            let constraint = &mut line_cable.constraint;
            if constraint.type_limit.is_tension() {
                scale.force(&mut constraint.limit);
            } else {
                scale.length(&mut constraint.limit);
            }
            line_cable.spacing_attachments_ruling_span *= scale.length;
        }
        self.update_structure_points();
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use glam::DVec3;

    use super::*;
    use crate::line::{
        AlignmentPoint, CableConstraint, CableConnection, ConstraintLimitType, LineCable,
        LineStructure,
    };
    use crate::shared::{HardwareType, StructureAttachment};

    const TOLERANCE: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        let scale = expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= TOLERANCE * scale,
            "期望 {expected}，实际 {actual}"
        );
    }

    fn sample_component() -> CableComponent {
        CableComponent {
            coefficient_expansion_linear_thermal: 0.0011,
            coefficients_polynomial_creep: vec![-544.8, 21426.8, -18842.2, 5495.0, 0.0],
            coefficients_polynomial_loadstrain: vec![-1213.0, 44308.1, -14004.4, -37618.0, 30676.0],
            load_limit_polynomial_creep: 0.5,
            load_limit_polynomial_loadstrain: 0.7,
            modulus_compression_elastic_area: 0.0,
            modulus_tension_elastic_area: 64_000.0,
        }
    }

    fn sample_cable() -> Cable {
        Cable {
            name: "Drake".to_string(),
            area_physical: 0.7264,
            diameter: 1.108,
            weight_unit: 1.094,
            strength_rated: 31_500.0,
            temperature_properties_components: 70.0,
            component_core: sample_component(),
            component_shell: sample_component(),
        }
    }

    fn sample_line() -> TransmissionLine {
        let mut line = TransmissionLine::new("L1");
        line.set_origin(DVec3::new(10.0, 20.0, 30.0));
        line.add_alignment_point(AlignmentPoint {
            station: 0.0,
            elevation: 100.0,
            rotation: 0.0,
        });
        line.add_alignment_point(AlignmentPoint {
            station: 1200.0,
            elevation: 140.0,
            rotation: 15.0,
        });
        line.insert_line_structure(
            0,
            LineStructure {
                structure: Some(PathBuf::from("/s.structure")),
                station: 600.0,
                offset: 2.0,
                height_adjustment: 5.0,
                ..LineStructure::default()
            },
        );
        line.insert_line_cable(
            0,
            LineCable {
                cable: Some(PathBuf::from("/c.cable")),
                constraint: CableConstraint {
                    limit: 6_000.0,
                    type_limit: ConstraintLimitType::HorizontalTension,
                    ..CableConstraint::default()
                },
                spacing_attachments_ruling_span: DVec3::new(0.0, 0.0, 10.0),
                connections: vec![CableConnection::default()],
                ..LineCable::default()
            },
        );
        line
    }

    #[test]
    fn cable_style_round_trip_restores_values() {
        for system in [UnitSystem::Imperial, UnitSystem::Metric] {
            let original = sample_cable();
            let mut cable = original.clone();
            cable.convert_unit_style(system, UnitStyle::Different, UnitStyle::Consistent);
            assert_ne!(cable, original);
            cable.convert_unit_style(system, UnitStyle::Consistent, UnitStyle::Different);

            assert_close(cable.area_physical, original.area_physical);
            assert_close(cable.diameter, original.diameter);
            let pairs = cable
                .component_core
                .coefficients_polynomial_loadstrain
                .iter()
                .zip(&original.component_core.coefficients_polynomial_loadstrain);
            for (actual, expected) in pairs {
                assert_close(*actual, *expected);
            }
            assert_close(
                cable.component_shell.modulus_tension_elastic_area,
                original.component_shell.modulus_tension_elastic_area,
            );
        }
    }

    #[test]
    fn cable_style_converts_inches_to_feet() {
        let mut cable = sample_cable();
        cable.convert_unit_style(
            UnitSystem::Imperial,
            UnitStyle::Different,
            UnitStyle::Consistent,
        );
        assert_close(cable.diameter, 1.108 / 12.0);
        assert_close(cable.area_physical, 0.7264 / 144.0);
        // 百分应变 -> 应变：一次项乘以 100。
        assert_close(
            cable.component_core.coefficients_polynomial_creep[1],
            21426.8 * 100.0,
        );
    }

    #[test]
    fn same_style_or_system_is_noop() {
        let original = sample_cable();
        let mut cable = original.clone();
        cable.convert_unit_style(
            UnitSystem::Metric,
            UnitStyle::Consistent,
            UnitStyle::Consistent,
        );
        cable.convert_unit_system(UnitSystem::Metric, UnitSystem::Metric);
        assert_eq!(cable, original);
    }

    #[test]
    fn cable_system_round_trip_restores_values() {
        let original = sample_cable();
        let mut cable = original.clone();
        cable.convert_unit_system(UnitSystem::Imperial, UnitSystem::Metric);
        assert_close(cable.strength_rated, 31_500.0 * NEWTONS_PER_POUND);
        assert_close(cable.temperature_properties_components, 21.111_111_111_111_11);
        cable.convert_unit_system(UnitSystem::Metric, UnitSystem::Imperial);
        assert_close(cable.strength_rated, original.strength_rated);
        assert_close(cable.weight_unit, original.weight_unit);
        assert_close(
            cable.temperature_properties_components,
            original.temperature_properties_components,
        );
        assert_close(
            cable.component_core.coefficient_expansion_linear_thermal,
            original.component_core.coefficient_expansion_linear_thermal,
        );
    }

    #[test]
    fn hardware_structure_and_weathercase_round_trip() {
        let hardware = Hardware {
            name: "Insulator".to_string(),
            type_hardware: HardwareType::Suspension,
            area_cross_section: 60.0,
            length: 5.5,
            weight: 90.0,
        };
        let structure = Structure {
            name: "Tangent".to_string(),
            height: 85.0,
            attachments: vec![StructureAttachment {
                offset_longitudinal: 0.0,
                offset_transverse: -12.5,
                offset_vertical_top: -4.0,
            }],
        };
        let weathercase = WeatherLoadCase {
            description: "NESC Heavy".to_string(),
            thickness_ice: 0.5,
            density_ice: 57.3,
            pressure_wind: 4.0,
            temperature_cable: 0.0,
        };

        for system in [UnitSystem::Imperial, UnitSystem::Metric] {
            let mut converted = hardware.clone();
            converted.convert_unit_style(system, UnitStyle::Different, UnitStyle::Consistent);
            converted.convert_unit_style(system, UnitStyle::Consistent, UnitStyle::Different);
            assert_close(converted.area_cross_section, hardware.area_cross_section);

            let mut converted = weathercase.clone();
            converted.convert_unit_style(system, UnitStyle::Different, UnitStyle::Consistent);
            converted.convert_unit_style(system, UnitStyle::Consistent, UnitStyle::Different);
            assert_close(converted.thickness_ice, weathercase.thickness_ice);

            let mut converted = structure.clone();
            converted.convert_unit_style(system, UnitStyle::Different, UnitStyle::Consistent);
            assert_eq!(converted, structure);
        }

        let mut converted = weathercase.clone();
        converted.convert_unit_system(UnitSystem::Imperial, UnitSystem::Metric);
        assert_close(converted.temperature_cable, -17.777_777_777_777_78);
        converted.convert_unit_system(UnitSystem::Metric, UnitSystem::Imperial);
        assert_close(converted.density_ice, weathercase.density_ice);
        assert_close(converted.pressure_wind, weathercase.pressure_wind);
        assert_close(converted.temperature_cable, weathercase.temperature_cable);

        let mut converted = structure.clone();
        converted.convert_unit_system(UnitSystem::Imperial, UnitSystem::Metric);
        assert_close(converted.height, 85.0 * METERS_PER_FOOT);
        converted.convert_unit_system(UnitSystem::Metric, UnitSystem::Imperial);
        assert_close(converted.attachments[0].offset_transverse, -12.5);
    }

    #[test]
    fn transmission_line_round_trip_and_cache_refresh() {
        let original = sample_line();
        let mut line = original.clone();
        line.convert_unit_style(
            UnitSystem::Imperial,
            UnitStyle::Consistent,
            UnitStyle::Different,
        );
        assert_eq!(line, original);

        line.convert_unit_system(UnitSystem::Imperial, UnitSystem::Metric);
        let base = line.points_structure_base()[0];
        assert_close(base.x, (10.0 + 600.0) * METERS_PER_FOOT);
        assert_close(
            line.line_cables()[0].constraint.limit,
            6_000.0 * NEWTONS_PER_POUND,
        );

        line.convert_unit_system(UnitSystem::Metric, UnitSystem::Imperial);
        assert_close(line.line_structures()[0].station, 600.0);
        assert_close(line.alignment()[1].elevation, 140.0);
        assert_close(line.origin().y, 20.0);
        assert_close(line.line_cables()[0].spacing_attachments_ruling_span.z, 10.0);
        assert_close(line.points_structure_base()[0].z, 30.0 + 120.0 + 5.0);
    }
}
