use std::io::Cursor;
use std::path::Path;

use chrono::{SubsecRound, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use uuid::Uuid;

use crate::jobs::types::{CompressionLevel, JobItem, JobParameters, JobStatus, ToolType};
use crate::tools::ToolInput;

pub fn default_parameters(tool_type: ToolType) -> JobParameters {
    match tool_type {
        ToolType::Merge => JobParameters::Merge,
        ToolType::Compress => JobParameters::Compress { level: CompressionLevel::Medium },
        ToolType::Reduce => JobParameters::Reduce { level: CompressionLevel::Medium },
        ToolType::Convert => JobParameters::Convert,
    }
}

pub fn build_job_item(tool_type: ToolType, status: JobStatus, input_refs: Vec<String>) -> JobItem {
    let now = Utc::now().round_subsecs(0);
    JobItem {
        id: Uuid::new_v4(),
        owner_token: "session-fixture".to_string(),
        tool_type,
        status,
        file_count: input_refs.len() as u64,
        parameters: default_parameters(tool_type),
        input_refs,
        result_ref: None,
        error_detail: None,
        original_size: None,
        result_size: None,
        version: 0,
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}

/// A single page document with the given page width. Distinct widths make
/// page order observable after a merge.
pub fn single_page_pdf(page_width: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![10.into(), 60.into()]),
            Operation::new("Tj", vec![Object::string_literal("fixture")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), page_width.into(), 120.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal("paperpress fixtures"),
    });
    doc.trailer.set("Info", info_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn gradient_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = gradient_image(width, height);
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&img).unwrap();
    buffer
}

pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_image(width, height);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

pub fn gradient_bmp(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_image(width, height);
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Bmp).unwrap();
    buffer.into_inner()
}

/// Spools fixture bytes into a scratch directory the way the entry point
/// does before invoking an executor.
pub fn write_tool_input(dir: &Path, index: usize, file_name: &str, data: &[u8]) -> ToolInput {
    let path = dir.join(format!("input_{}_{}", index, file_name));
    std::fs::write(&path, data).unwrap();
    ToolInput { path, source_key: format!("tmp/{}/{}", Uuid::new_v4(), file_name) }
}
