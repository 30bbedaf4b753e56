use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::jobs::error::ValidationError;
use crate::jobs::types::{JobParameters, ToolType};
use crate::tools::{ResultFile, ToolError, ToolHandler, ToolInput};

pub struct CompressHandler;

impl ToolHandler for CompressHandler {
    fn tool_type(&self) -> ToolType {
        ToolType::Compress
    }

    fn validate_submission(&self, _input_refs: &[String], parameters: &JobParameters) -> Result<(), ValidationError> {
        parameters.ensure_matches_tool(&ToolType::Compress)
    }

    /// Re-encodes every input at the requested level. One result per
    /// input; the first one is the canonical result on the job record.
    fn execute(&self, inputs: &[ToolInput], parameters: &JobParameters) -> Result<Vec<ResultFile>, ToolError> {
        let JobParameters::Compress { level } = parameters else {
            return Err(ToolError::Internal("compress invoked with foreign parameters".to_string()));
        };

        let mut results = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let reader = ImageReader::open(&input.path)
                .map_err(|e| ToolError::Io(e.to_string()))?
                .with_guessed_format()
                .map_err(|e| ToolError::Io(e.to_string()))?;
            let format = reader
                .format()
                .ok_or_else(|| ToolError::UnsupportedFormat { name: input.label().to_string() })?;
            let img = reader.decode().map_err(|e| ToolError::MalformedInput {
                name: input.label().to_string(),
                reason: e.to_string(),
            })?;

            let (data, extension, content_type) = match format {
                ImageFormat::Png => (encode_png_optimized(&img)?, "png", "image/png"),
                // WebP re-encoding in this stack is lossless only, so lossy
                // levels go through the JPEG encoder as well.
                ImageFormat::Jpeg | ImageFormat::WebP => {
                    (encode_jpeg(&img, level.quality())?, "jpg", "image/jpeg")
                }
                _ => return Err(ToolError::UnsupportedFormat { name: input.label().to_string() }),
            };

            tracing::debug!(
                input = %input.label(),
                level = %level,
                output_bytes = data.len(),
                "Compressed image"
            );
            results.push(ResultFile { name: format!("compressed_{}.{}", index, extension), data, content_type });
        }

        Ok(results)
    }
}

/// JPEG carries no alpha channel; flatten to RGB before encoding.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ToolError> {
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .map_err(|e| ToolError::EncodeFailure(e.to_string()))?;
    Ok(buffer)
}

fn encode_png_optimized(img: &DynamicImage) -> Result<Vec<u8>, ToolError> {
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder).map_err(|e| ToolError::EncodeFailure(e.to_string()))?;
    Ok(buffer)
}
