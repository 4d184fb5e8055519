use std::fs;
use std::path::{Path, PathBuf};

use glam::DVec3;
use tline_core::units::{INCHES_PER_FOOT, UnitSystem};
use tline_io::{DocumentLoader, DocumentParts, DocumentSaver, IoError, XmlFacade};

fn fixtures_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path
}

fn copy_fixtures(target: &Path) {
    for name in ["sample.lad", "drake.cable", "insulator.hardware", "tangent.structure"] {
        fs::copy(fixtures_dir().join(name), target.join(name)).expect("复制测试数据失败");
    }
}

#[test]
fn read_sample_document() {
    let facade = XmlFacade::new(UnitSystem::Imperial);
    let load = facade
        .load(&fixtures_dir().join("sample.lad"))
        .expect("读取文档失败");
    assert!(load.is_complete(), "问题: {:?}", load.problems);
    assert_eq!(load.units_file, UnitSystem::Imperial);

    let data = &load.data;
    assert_eq!(data.cables.len(), 1);
    assert_eq!(data.hardwares.len(), 1);
    assert_eq!(data.structures.len(), 1);
    assert_eq!(data.weathercases.len(), 2);
    assert_eq!(data.lines.len(), 1);

    assert!(data.cables[0].filepath.is_absolute());
    assert_eq!(data.cables[0].filepath, fixtures_dir().join("drake.cable"));
    assert_eq!(data.cables[0].cable.name, "Drake ACSR");

    let heavy = &data.weathercases[0];
    assert_eq!(heavy.description, "NESC Heavy");
    assert!((heavy.thickness_ice - 0.5 / INCHES_PER_FOOT).abs() < 1e-12);

    let line = &data.lines[0];
    assert_eq!(line.name, "Demo Line");
    assert!(line.references_cable(&data.cables[0].filepath));
    assert!(line.references_hardware(&data.hardwares[0].filepath));
    assert!(line.references_structure(&data.structures[0].filepath));
    assert!(line.references_weathercase("NESC Heavy"));
    assert_eq!(line.points_structure_base()[1], DVec3::new(1200.0, 0.0, 55.0));
}

#[test]
fn save_and_reload_document() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    copy_fixtures(dir.path());
    let facade = XmlFacade::new(UnitSystem::Imperial);

    let original = facade
        .load(&dir.path().join("sample.lad"))
        .expect("读取文档失败");
    let data = &original.data;

    let saved = dir.path().join("saved.lad");
    facade
        .save(
            DocumentParts {
                cables: &data.cables,
                hardwares: &data.hardwares,
                structures: &data.structures,
                weathercases: &data.weathercases,
                lines: &data.lines,
            },
            &saved,
        )
        .expect("保存文档失败");

    let text = fs::read_to_string(&saved).expect("读取保存结果失败");
    assert!(text.contains("<file>drake.cable</file>"));
    assert!(!text.contains(&dir.path().display().to_string()));

    let reloaded = facade.load(&saved).expect("重新读取失败");
    assert!(reloaded.is_complete(), "问题: {:?}", reloaded.problems);
    assert_eq!(
        serde_json::to_value(&reloaded.data.lines).expect("序列化失败"),
        serde_json::to_value(&data.lines).expect("序列化失败"),
    );
    assert_eq!(reloaded.data.cables, data.cables);
    assert_eq!(reloaded.data.weathercases.len(), data.weathercases.len());
    for (left, right) in reloaded.data.weathercases.iter().zip(&data.weathercases) {
        assert_eq!(left.description, right.description);
        assert!((left.thickness_ice - right.thickness_ice).abs() < 1e-12);
    }
}

#[test]
fn metric_application_reads_imperial_document() {
    let facade = XmlFacade::new(UnitSystem::Metric);
    let load = facade
        .load(&fixtures_dir().join("sample.lad"))
        .expect("读取文档失败");
    assert_eq!(load.units_file, UnitSystem::Imperial);
    let structure = &load.data.structures[0].structure;
    assert!((structure.height - 30.48).abs() < 1e-9);
    let line = &load.data.lines[0];
    assert!((line.alignment()[1].station - 1200.0 * 0.3048).abs() < 1e-9);
}

#[test]
fn missing_external_file_is_reported_and_skipped() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    copy_fixtures(dir.path());
    fs::remove_file(dir.path().join("drake.cable")).expect("删除导线文件失败");

    let load = XmlFacade::new(UnitSystem::Imperial)
        .load(&dir.path().join("sample.lad"))
        .expect("读取文档失败");
    assert!(load.data.cables.is_empty());
    // 导线缺失后线路无法解析
    assert!(load.data.lines.is_empty());
    assert_eq!(load.problems.len(), 2);
}

#[test]
fn invalid_documents_are_rejected() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let facade = XmlFacade::new(UnitSystem::Imperial);

    let wrong_root = dir.path().join("wrong_root.lad");
    fs::write(&wrong_root, r#"<cable version="1" units="Imperial"/>"#).expect("写入失败");
    assert!(matches!(
        facade.load(&wrong_root),
        Err(IoError::InvalidDocument(_))
    ));

    let no_units = dir.path().join("no_units.lad");
    fs::write(&no_units, r#"<line_analyzer_doc version="1"/>"#).expect("写入失败");
    assert!(matches!(facade.load(&no_units), Err(IoError::InvalidDocument(_))));

    assert!(matches!(
        facade.load(&dir.path().join("absent.lad")),
        Err(IoError::ReadError { .. })
    ));
}
