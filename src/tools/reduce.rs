use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use lopdf::{Document, Object, ObjectId};

use crate::jobs::constants::REDUCE_RESULT_FILE_NAME;
use crate::jobs::error::ValidationError;
use crate::jobs::types::{CompressionLevel, JobParameters, ToolType};
use crate::tools::{ResultFile, ToolError, ToolHandler, ToolInput};

pub struct ReduceHandler;

impl ToolHandler for ReduceHandler {
    fn tool_type(&self) -> ToolType {
        ToolType::Reduce
    }

    fn validate_submission(&self, input_refs: &[String], parameters: &JobParameters) -> Result<(), ValidationError> {
        parameters.ensure_matches_tool(&ToolType::Reduce)?;
        if input_refs.len() != 1 {
            return Err(ValidationError::InvalidCardinality {
                tool_type: ToolType::Reduce,
                expected: 1,
                got: input_refs.len(),
            });
        }
        Ok(())
    }

    fn execute(&self, inputs: &[ToolInput], parameters: &JobParameters) -> Result<Vec<ResultFile>, ToolError> {
        let JobParameters::Reduce { level } = parameters else {
            return Err(ToolError::Internal("reduce invoked with foreign parameters".to_string()));
        };
        let input = &inputs[0];

        let mut document = Document::load(&input.path).map_err(|e| ToolError::MalformedInput {
            name: input.label().to_string(),
            reason: e.to_string(),
        })?;
        if document.get_pages().is_empty() {
            return Err(ToolError::MalformedInput {
                name: input.label().to_string(),
                reason: "document has no pages".to_string(),
            });
        }

        strip_metadata_and_annotations(&mut document);
        if matches!(level, CompressionLevel::Medium | CompressionLevel::High) {
            recompress_embedded_images(&mut document, level.quality());
        }

        document.prune_objects();
        document.compress();

        let mut buffer = Vec::new();
        document.save_to(&mut buffer).map_err(|e| ToolError::EncodeFailure(e.to_string()))?;

        tracing::debug!(input = %input.label(), level = %level, output_bytes = buffer.len(), "Reduced document");
        Ok(vec![ResultFile {
            name: REDUCE_RESULT_FILE_NAME.to_string(),
            data: buffer,
            content_type: "application/pdf",
        }])
    }
}

/// Every level drops the document info dictionary and page annotations.
fn strip_metadata_and_annotations(document: &mut Document) {
    document.trailer.remove(b"Info");

    let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
    for page_id in page_ids {
        if let Ok(page) = document.get_object_mut(page_id) {
            if let Ok(dictionary) = page.as_dict_mut() {
                dictionary.remove(b"Annots");
            }
        }
    }
}

/// Re-encodes embedded DCT (JPEG) image streams at the level's quality.
/// Streams that fail to decode, use filter chains, or grow after
/// re-encoding are left untouched. Uses the same canonical quality table
/// as standalone image compression.
fn recompress_embedded_images(document: &mut Document, quality: u8) {
    let object_ids: Vec<ObjectId> = document.objects.keys().copied().collect();

    for object_id in object_ids {
        let Some(Object::Stream(stream)) = document.objects.get_mut(&object_id) else {
            continue;
        };

        let is_image = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image");
        let is_plain_dct = matches!(stream.dict.get(b"Filter"), Ok(Object::Name(name)) if name == b"DCTDecode");
        if !is_image || !is_plain_dct {
            continue;
        }

        let Ok(img) = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg) else {
            tracing::debug!(object_id = ?object_id, "Skipping embedded image that failed to decode");
            continue;
        };

        let rgb = img.to_rgb8();
        let mut buffer = Vec::new();
        if JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&rgb).is_err() {
            continue;
        }

        if buffer.len() < stream.content.len() {
            stream.set_content(buffer);
            stream.dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
            stream.dict.set("BitsPerComponent", 8);
        }
    }
}
