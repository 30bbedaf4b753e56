use image::codecs::jpeg::JpegEncoder;
use image::{GenericImageView, ImageReader};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::jobs::constants::CONVERT_RESULT_FILE_NAME;
use crate::jobs::error::ValidationError;
use crate::jobs::types::{JobParameters, ToolType};
use crate::tools::{ResultFile, ToolError, ToolHandler, ToolInput};

/// Quality for the DCT streams embedded in the produced document.
const EMBED_JPEG_QUALITY: u8 = 85;

pub struct ConvertHandler;

impl ToolHandler for ConvertHandler {
    fn tool_type(&self) -> ToolType {
        ToolType::Convert
    }

    fn validate_submission(&self, _input_refs: &[String], parameters: &JobParameters) -> Result<(), ValidationError> {
        parameters.ensure_matches_tool(&ToolType::Convert)
    }

    /// Builds one document with one page per input image, in input order.
    /// Each page is sized to its image (one PDF point per pixel) and draws
    /// the image as a DCT XObject covering the whole page.
    fn execute(&self, inputs: &[ToolInput], _parameters: &JobParameters) -> Result<Vec<ResultFile>, ToolError> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(inputs.len());

        for input in inputs {
            let reader = ImageReader::open(&input.path)
                .map_err(|e| ToolError::Io(e.to_string()))?
                .with_guessed_format()
                .map_err(|e| ToolError::Io(e.to_string()))?;
            if reader.format().is_none() {
                return Err(ToolError::UnsupportedFormat { name: input.label().to_string() });
            }
            let img = reader.decode().map_err(|e| ToolError::MalformedInput {
                name: input.label().to_string(),
                reason: e.to_string(),
            })?;

            let (width, height) = img.dimensions();
            let rgb = img.to_rgb8();
            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, EMBED_JPEG_QUALITY)
                .encode_image(&rgb)
                .map_err(|e| ToolError::EncodeFailure(e.to_string()))?;

            let image_id = document.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            ));

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            (width as i64).into(),
                            0.into(),
                            0.into(),
                            (height as i64).into(),
                            0.into(),
                            0.into(),
                        ],
                    ),
                    Operation::new("Do", vec!["Im0".into()]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_id = document.add_object(Stream::new(
                dictionary! {},
                content.encode().map_err(|e| ToolError::EncodeFailure(e.to_string()))?,
            ));

            let resources_id = document.add_object(dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            });
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as u32;
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        document.save_to(&mut buffer).map_err(|e| ToolError::EncodeFailure(e.to_string()))?;

        Ok(vec![ResultFile {
            name: CONVERT_RESULT_FILE_NAME.to_string(),
            data: buffer,
            content_type: "application/pdf",
        }])
    }
}
