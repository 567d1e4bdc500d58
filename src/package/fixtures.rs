//! Minimal but complete diagram packages for tests.
//!
//! The sample package holds two masters (Process, Decision), one page with
//! two Process instances and one Decision instance, a style table whose ids
//! differ from the ones used by the snapshots, and a custom-properties part
//! with pids 2 and 4 taken.

use crate::model::{Status, StyleNames, TemplateSnapshot};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const VISIO_NS: &str = "http://schemas.microsoft.com/office/visio/2012/main";
pub const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const B1: &str = "{0B100000-0000-0000-0000-000000000001}";
pub const U1: &str = "{0A100000-0000-0000-0000-000000000001}";
pub const U2: &str = "{0A100000-0000-0000-0000-000000000002}";
pub const B_DECISION: &str = "{0B100000-0000-0000-0000-000000000002}";
pub const U_DECISION: &str = "{0A200000-0000-0000-0000-000000000001}";

pub const LOCAL_PROCESS: u32 = 12;
pub const LOCAL_DECISION: u32 = 15;

pub const MASTERS_PART: &str = "visio/masters/masters.xml";
pub const PROCESS_MASTER_PART: &str = "visio/masters/master1.xml";
pub const PAGE_PART: &str = "visio/pages/page1.xml";
pub const CUSTOM_PART: &str = "docProps/custom.xml";
pub const ROOT_RELS_PART: &str = "_rels/.rels";

pub struct PackageFixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

pub fn sample_package() -> PackageFixture {
    package_with(&[])
}

/// Sample package with some parts replaced (`Some`) or left out (`None`).
pub fn package_with(changes: &[(&str, Option<String>)]) -> PackageFixture {
    let mut parts = sample_parts();
    for (name, content) in changes {
        parts.retain(|(existing, _)| existing != name);
        if let Some(content) = content {
            parts.push((name.to_string(), content.clone()));
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diagram.vsdx");
    write_package(&path, &parts);
    PackageFixture { dir, path }
}

pub fn write_package(path: &Path, parts: &[(String, String)]) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in parts {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

pub fn sample_parts() -> Vec<(String, String)> {
    vec![
        ("[Content_Types].xml".to_string(), content_types()),
        (ROOT_RELS_PART.to_string(), root_rels(true)),
        (CUSTOM_PART.to_string(), custom_properties()),
        ("visio/document.xml".to_string(), document()),
        ("visio/_rels/document.xml.rels".to_string(), document_rels()),
        (MASTERS_PART.to_string(), masters()),
        (
            "visio/masters/_rels/masters.xml.rels".to_string(),
            masters_rels(),
        ),
        (PROCESS_MASTER_PART.to_string(), process_master_v1()),
        ("visio/masters/master2.xml".to_string(), decision_master()),
        ("visio/pages/pages.xml".to_string(), pages()),
        ("visio/pages/_rels/pages.xml.rels".to_string(), pages_rels()),
        (PAGE_PART.to_string(), page()),
    ]
}

fn content_types() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/visio/document.xml" ContentType="application/vnd.ms-visio.drawing.main+xml"/><Override PartName="/visio/masters/masters.xml" ContentType="application/vnd.ms-visio.masters+xml"/><Override PartName="/visio/masters/master1.xml" ContentType="application/vnd.ms-visio.master+xml"/><Override PartName="/visio/masters/master2.xml" ContentType="application/vnd.ms-visio.master+xml"/><Override PartName="/visio/pages/pages.xml" ContentType="application/vnd.ms-visio.pages+xml"/><Override PartName="/visio/pages/page1.xml" ContentType="application/vnd.ms-visio.page+xml"/><Override PartName="/docProps/custom.xml" ContentType="application/vnd.openxmlformats-officedocument.custom-properties+xml"/></Types>"#
        .to_string()
}

pub fn root_rels(with_custom: bool) -> String {
    let custom = if with_custom {
        r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/custom-properties" Target="docProps/custom.xml"/>"#
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.microsoft.com/visio/2010/relationships/document" Target="visio/document.xml"/>{custom}</Relationships>"#
    )
}

fn custom_properties() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/custom-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="2" name="Department"><vt:lpwstr>Operations</vt:lpwstr></property><property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="4" name="Reviewed"><vt:bool>false</vt:bool></property></Properties>"#
        .to_string()
}

fn document() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<VisioDocument xmlns="{VISIO_NS}" xmlns:r="{REL_NS}"><DocumentSettings TopPage="0"/><StyleSheets><StyleSheet ID="0" NameU="No Style" Name="No Style"/><StyleSheet ID="1" NameU="None" Name="None" LineStyle="0" FillStyle="0" TextStyle="0"/><StyleSheet ID="3" NameU="Normal" Name="Normal" LineStyle="0" FillStyle="0" TextStyle="0"/><StyleSheet ID="7" NameU="Connector" Name="Connector" LineStyle="3" FillStyle="3" TextStyle="3"/><StyleSheet ID="9" NameU="Corporate Fill" Name="Corporate Fill" LineStyle="3" FillStyle="3" TextStyle="3"/><StyleSheet ID="10" NameU="Corporate Line" Name="Corporate Line" LineStyle="3" FillStyle="3" TextStyle="3"/></StyleSheets></VisioDocument>"#
    )
}

fn document_rels() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.microsoft.com/visio/2010/relationships/masters" Target="masters/masters.xml"/><Relationship Id="rId2" Type="http://schemas.microsoft.com/visio/2010/relationships/pages" Target="pages/pages.xml"/></Relationships>"#
        .to_string()
}

pub fn masters() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Masters xmlns="{VISIO_NS}" xmlns:r="{REL_NS}"><Master ID="{LOCAL_PROCESS}" NameU="Process" Name="Process" BaseID="{B1}" UniqueID="{U1}" MasterType="2"><PageSheet LineStyle="0" FillStyle="0" TextStyle="0"/><Rel r:id="rId1"/></Master><Master ID="{LOCAL_DECISION}" NameU="Decision" Name="Decision" BaseID="{B_DECISION}" UniqueID="{U_DECISION}" MasterType="2"><PageSheet LineStyle="0" FillStyle="0" TextStyle="0"/><Rel r:id="rId2"/></Master></Masters>"#
    )
}

fn masters_rels() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.microsoft.com/visio/2010/relationships/master" Target="master1.xml"/><Relationship Id="rId2" Type="http://schemas.microsoft.com/visio/2010/relationships/master" Target="master2.xml"/></Relationships>"#
        .to_string()
}

fn process_master_v1() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<MasterContents xmlns="{VISIO_NS}" xmlns:r="{REL_NS}"><Shapes><Shape ID="5" NameU="Process" Type="Group" LineStyle="3" FillStyle="3" TextStyle="3"><Shapes><Shape ID="6" NameU="Label" Name="Label" Type="Shape" LineStyle="3" FillStyle="3" TextStyle="3"/><Shape ID="7" NameU="Icon" Name="Icon" Type="Shape" LineStyle="3" FillStyle="3" TextStyle="3"/></Shapes></Shape></Shapes></MasterContents>"#
    )
}

fn decision_master() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<MasterContents xmlns="{VISIO_NS}" xmlns:r="{REL_NS}"><Shapes><Shape ID="5" NameU="Decision" Type="Shape" LineStyle="3" FillStyle="3" TextStyle="3"/></Shapes></MasterContents>"#
    )
}

fn pages() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Pages xmlns="{VISIO_NS}" xmlns:r="{REL_NS}"><Page ID="0" NameU="Page-1" Name="Page-1"><PageSheet LineStyle="0" FillStyle="0" TextStyle="0"/><Rel r:id="rId1"/></Page></Pages>"#
    )
}

fn pages_rels() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.microsoft.com/visio/2010/relationships/page" Target="page1.xml"/></Relationships>"#
        .to_string()
}

/// Page whose highest shape id is 9.
pub fn page() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<PageContents xmlns="{VISIO_NS}" xmlns:r="{REL_NS}"><Shapes><Shape ID="1" NameU="Process" Name="Process" Type="Group" Master="{LOCAL_PROCESS}"><Cell N="PinX" V="2"/><Section N="Property"><Row N="SubClass"><Cell N="Value" V="Legacy" U="STR"/></Row></Section><Shapes><Shape ID="2" Type="Shape" MasterShape="6"><Cell N="PinX" V="1.5"/></Shape><Shape ID="3" Type="Shape" MasterShape="7"/></Shapes></Shape><Shape ID="4" NameU="Decision" Name="Decision" Type="Shape" Master="{LOCAL_DECISION}"/><Shape ID="8" NameU="Process.8" Name="Process.8" Type="Group" Master="{LOCAL_PROCESS}"><Section N="Property"><Row N="SubClass"><Cell N="Value" V="Legacy" U="STR"/></Row><Row N="Owner"><Cell N="Value" V="Ops" U="STR"/></Row></Section><Shapes><Shape ID="9" Type="Shape" MasterShape="6"/></Shapes></Shape></Shapes></PageContents>"#
    )
}

/// Second revision of the Process master: label kept, icon replaced by a
/// badge, styles from a different document (ids 30/31/32).
pub fn process_snapshot_v2() -> TemplateSnapshot {
    TemplateSnapshot {
        template_id: B1.into(),
        name: "Process".to_string(),
        revision_id: U2.into(),
        status: Status::Published,
        sequence: 2,
        styles: StyleNames {
            fill: Some("Corporate Fill".to_string()),
            line: Some("Corporate Line".to_string()),
            text: Some("Normal".to_string()),
        },
        definition_fragment: format!(
            r#"<Master xmlns="{VISIO_NS}" xmlns:r="{REL_NS}" ID="999" NameU="Process" Name="Process" BaseID="{B1}" UniqueID="{U2}" MasterType="2"><PageSheet LineStyle="30" FillStyle="31" TextStyle="32"/><Rel r:id="rId9"/></Master>"#
        ),
        definition_body: format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<MasterContents xmlns="{VISIO_NS}" xmlns:r="{REL_NS}"><Shapes><Shape ID="5" NameU="Process" Type="Group" LineStyle="30" FillStyle="31" TextStyle="32"><Shapes><Shape ID="6" NameU="Label" Name="Label" Type="Shape" LineStyle="30" FillStyle="31" TextStyle="32"/><Shape ID="11" NameU="Badge" Name="Badge" Type="Shape" FillStyle="31"/></Shapes></Shape></Shapes></MasterContents>"#
        ),
    }
}

pub fn decision_snapshot_v2() -> TemplateSnapshot {
    TemplateSnapshot {
        template_id: B_DECISION.into(),
        name: "Decision".to_string(),
        revision_id: "{0A200000-0000-0000-0000-000000000002}".into(),
        status: Status::Approved,
        sequence: 2,
        styles: StyleNames::default(),
        definition_fragment: format!(
            r#"<Master xmlns:r="{REL_NS}" ID="3" NameU="Decision" Name="Decision" BaseID="{B_DECISION}" UniqueID="{{0A200000-0000-0000-0000-000000000002}}"><Rel r:id="rId1"/></Master>"#
        ),
        definition_body: format!(
            r#"<MasterContents xmlns="{VISIO_NS}"><Shapes><Shape ID="5" NameU="Decision" Type="Shape" LineStyle="3" FillStyle="3" TextStyle="3"/></Shapes></MasterContents>"#
        ),
    }
}
