//! Sidecar metadata document.
//!
//! A DPUfsImport-style XML document generated from the level-dimension
//! list and the raw auxiliary payloads, independent of the raster
//! pipeline: acquisition and calibration fields, the main image's pixel
//! spacing and per-level dimensions, and Base64-embedded macro/label
//! payloads.

use base64::{engine::general_purpose, Engine as _};
use chrono::Local;
use std::fmt::Write;

pub struct SidecarInfo<'a> {
    pub source_name: &'a str,
    pub width: u32,
    pub height: u32,
    /// Micrometers per pixel at the base level.
    pub pixel_spacing_um: (f64, f64),
    pub level_dimensions: &'a [(u32, u32)],
    pub macro_jpeg: Option<&'a [u8]>,
    pub label_jpeg: Option<&'a [u8]>,
}

pub fn render(info: &SidecarInfo) -> String {
    let now = Local::now();
    let acquisition = now.format("%Y%m%d%H%M%S.%6f");
    let calibration_date = now.format("%Y%m%d");
    let calibration_time = now.format("%H%M%S");
    // DICOM pixel spacing is in millimeters
    let spacing_mm = info.pixel_spacing_um.0 / 1000.0;

    let mut xml = String::new();
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8" ?>"#);
    let _ = writeln!(xml, r#"<DataObject ObjectType="DPUfsImport">"#);
    let _ = writeln!(
        xml,
        "\t<Attribute Name=\"DICOM_ACQUISITION_DATETIME\" Group=\"0x0008\" Element=\"0x002A\" PMSVR=\"IString\">{acquisition}</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t<Attribute Name=\"DICOM_DATE_OF_LAST_CALIBRATION\" Group=\"0x0018\" Element=\"0x1200\" PMSVR=\"IStringArray\">&quot;{calibration_date}&quot;</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t<Attribute Name=\"DICOM_TIME_OF_LAST_CALIBRATION\" Group=\"0x0018\" Element=\"0x1201\" PMSVR=\"IStringArray\">&quot;{calibration_time}&quot;</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t<Attribute Name=\"DICOM_MANUFACTURER\" Group=\"0x0008\" Element=\"0x0070\" PMSVR=\"IString\">PHILIPS</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t<Attribute Name=\"DICOM_SOFTWARE_VERSIONS\" Group=\"0x0018\" Element=\"0x1020\" PMSVR=\"IStringArray\">&quot;slidetiff {}&quot;</Attribute>",
        env!("CARGO_PKG_VERSION")
    );
    let _ = writeln!(
        xml,
        "\t<Attribute Name=\"PIIM_DP_SCANNER_CALIBRATION_STATUS\" Group=\"0x101D\" Element=\"0x100A\" PMSVR=\"IString\">OK</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t<Attribute Name=\"PIM_DP_SCANNED_IMAGES\" Group=\"0x301D\" Element=\"0x1003\" PMSVR=\"IDataObjectArray\">"
    );
    let _ = writeln!(xml, "\t\t<Array>");

    // Main image with its pyramid structure
    let _ = writeln!(xml, "\t\t\t<DataObject ObjectType=\"DPScannedImage\">");
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"PIM_DP_IMAGE_TYPE\" Group=\"0x301D\" Element=\"0x1004\" PMSVR=\"IString\">WSI</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"DICOM_PHOTOMETRIC_INTERPRETATION\" Group=\"0x0028\" Element=\"0x0004\" PMSVR=\"IString\">RGB</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"DICOM_SAMPLES_PER_PIXEL\" Group=\"0x0028\" Element=\"0x0002\" PMSVR=\"IUInt16\">3</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"DICOM_BITS_ALLOCATED\" Group=\"0x0028\" Element=\"0x0100\" PMSVR=\"IUInt16\">8</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"DICOM_PIXEL_SPACING\" Group=\"0x0028\" Element=\"0x0030\" PMSVR=\"IDoubleArray\">&quot;{spacing_mm}&quot; &quot;{spacing_mm}&quot;</Attribute>"
    );
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"PIIM_PIXEL_DATA_REPRESENTATION_SEQUENCE\" Group=\"0x1001\" Element=\"0x8B01\" PMSVR=\"IDataObjectArray\">"
    );
    let _ = writeln!(xml, "\t\t\t\t\t<Array>");
    for (number, (width, height)) in info.level_dimensions.iter().enumerate() {
        let level_spacing = spacing_mm * (1u64 << number) as f64;
        let _ = writeln!(xml, "\t\t\t\t\t\t<DataObject ObjectType=\"PixelDataRepresentation\">");
        let _ = writeln!(
            xml,
            "\t\t\t\t\t\t\t<Attribute Name=\"DICOM_PIXEL_SPACING\" Group=\"0x0028\" Element=\"0x0030\" PMSVR=\"IDoubleArray\">&quot;{level_spacing}&quot; &quot;{level_spacing}&quot;</Attribute>"
        );
        let _ = writeln!(
            xml,
            "\t\t\t\t\t\t\t<Attribute Name=\"PIIM_PIXEL_DATA_REPRESENTATION_NUMBER\" Group=\"0x1001\" Element=\"0x8B02\" PMSVR=\"IUInt16\">{number}</Attribute>"
        );
        let _ = writeln!(
            xml,
            "\t\t\t\t\t\t\t<Attribute Name=\"PIIM_PIXEL_DATA_REPRESENTATION_COLUMNS\" Group=\"0x2001\" Element=\"0x115E\" PMSVR=\"IUInt32\">{width}</Attribute>"
        );
        let _ = writeln!(
            xml,
            "\t\t\t\t\t\t\t<Attribute Name=\"PIIM_PIXEL_DATA_REPRESENTATION_ROWS\" Group=\"0x2001\" Element=\"0x115D\" PMSVR=\"IUInt32\">{height}</Attribute>"
        );
        let _ = writeln!(xml, "\t\t\t\t\t\t</DataObject>");
    }
    let _ = writeln!(xml, "\t\t\t\t\t</Array>");
    let _ = writeln!(xml, "\t\t\t\t</Attribute>");
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"PIM_DP_IMAGE_COLUMNS\" Group=\"0x301D\" Element=\"0x1007\" PMSVR=\"IUInt32\">{}</Attribute>",
        info.width
    );
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"PIM_DP_IMAGE_ROWS\" Group=\"0x301D\" Element=\"0x1006\" PMSVR=\"IUInt32\">{}</Attribute>",
        info.height
    );
    let _ = writeln!(
        xml,
        "\t\t\t\t<Attribute Name=\"PIM_DP_SOURCE_FILE\" Group=\"0x301D\" Element=\"0x1000\" PMSVR=\"IString\">{}</Attribute>",
        info.source_name
    );
    let _ = writeln!(xml, "\t\t\t</DataObject>");

    for (kind, payload) in [("MACROIMAGE", info.macro_jpeg), ("LABELIMAGE", info.label_jpeg)] {
        let Some(payload) = payload else { continue };
        let encoded = general_purpose::STANDARD.encode(payload);
        let _ = writeln!(xml, "\t\t\t<DataObject ObjectType=\"DPScannedImage\">");
        let _ = writeln!(
            xml,
            "\t\t\t\t<Attribute Name=\"PIM_DP_IMAGE_DATA\" Group=\"0x301D\" Element=\"0x1005\" PMSVR=\"IString\">{encoded}</Attribute>"
        );
        let _ = writeln!(
            xml,
            "\t\t\t\t<Attribute Name=\"PIM_DP_IMAGE_TYPE\" Group=\"0x301D\" Element=\"0x1004\" PMSVR=\"IString\">{kind}</Attribute>"
        );
        let _ = writeln!(xml, "\t\t\t</DataObject>");
    }

    let _ = writeln!(xml, "\t\t</Array>");
    let _ = writeln!(xml, "\t</Attribute>");
    let _ = writeln!(xml, "</DataObject>");
    xml
}
