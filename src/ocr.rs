use crate::error::GatewayResult;
use crate::llm::{CompletionClient, CompletionRequest, CompletionResponse, ContentPart, RequestMessage};
use crate::types::OcrResponse;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

pub const DEFAULT_OCR_MODEL: &str = "pixtral-12b-2409";

const OCR_PROMPT: &str = "Extract all text from this image with high accuracy. Pay special attention to:
1. Distinguishing between field labels and field values (e.g., 'Depositor's Name' vs the actual name)
2. Properly identifying currency amounts vs names (e.g., 'Rupees' should not be part of a person's name)
3. Separating different sections of the form clearly
4. Maintaining the logical structure and hierarchy of the document
5. Identifying what text belongs to which field or section

For financial documents, be especially careful to:
- Separate currency indicators (Rs., Rupees, $) from actual names
- Distinguish between amount fields and name/address fields
- Preserve the original field structure

Provide the text content in a clear, structured format that preserves the form's organization.";

/// Turns an uploaded image into text.
pub trait OcrGateway {
    /// `subtype` is the image MIME subtype ("jpeg", "png", ...).
    fn extract_text(&self, image: &[u8], subtype: &str) -> GatewayResult<OcrResponse>;
}

/// `data:image/{subtype};base64,...` payload for the vision model.
pub fn image_data_uri(image: &[u8], subtype: &str) -> String {
    format!("data:image/{};base64,{}", subtype, BASE64.encode(image))
}

pub fn build_ocr_request(model: &str, image: &[u8], subtype: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        messages: vec![RequestMessage::user_parts(vec![
            ContentPart::Text {
                text: OCR_PROMPT.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: image_data_uri(image, subtype),
            },
        ])],
        temperature: 0.1,
        max_tokens: 2000,
    }
}

/// Map the wire response onto the fields we keep. Fails when the model returned no text.
pub fn ocr_response_from_completion(resp: &CompletionResponse) -> GatewayResult<OcrResponse> {
    let text = resp.first_text()?.to_string();
    Ok(OcrResponse {
        text,
        response_id: resp.id.clone(),
        model: resp.model.clone(),
        created: resp.created,
        finish_reason: resp.finish_reason().map(String::from),
        usage: resp.usage.clone(),
    })
}

/// OCR through Mistral's vision chat model.
pub struct MistralOcr {
    client: CompletionClient,
    model: String,
}

impl MistralOcr {
    pub fn new(client: CompletionClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl OcrGateway for MistralOcr {
    fn extract_text(&self, image: &[u8], subtype: &str) -> GatewayResult<OcrResponse> {
        tracing::info!(model = %self.model, subtype, bytes = image.len(), "running OCR");
        let request = build_ocr_request(&self.model, image, subtype);
        let resp = self.client.complete(&request)?;
        let ocr = ocr_response_from_completion(&resp)?;
        tracing::info!(chars = ocr.text.chars().count(), "OCR finished");
        Ok(ocr)
    }
}
