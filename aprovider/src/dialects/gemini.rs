//! Google Gemini `generateContent` payloads.

use http::Method;
use http::header::HeaderName;
use serde::{Deserialize, Serialize};

use crate::model::data_url_payload;
use crate::{
    AttachmentContent, ChatRequest, HttpRequest, ParsedResponse, ProviderDescriptor,
    ProviderError, Role, StreamFrame,
};

use super::{build_headers, compose_user_text, frame_payload, merge_extra_body, to_body};

const API_KEY_HEADER: &str = "x-goog-api-key";
const TOP_K: u32 = 40;
const TOP_P: f32 = 0.95;

pub(crate) fn build(
    descriptor: &ProviderDescriptor,
    request: &ChatRequest,
    api_key: Option<&str>,
) -> Result<HttpRequest, ProviderError> {
    let stream = request.options.stream && descriptor.supports_native_streaming;
    let action = if stream {
        "streamGenerateContent?alt=sse"
    } else {
        "generateContent"
    };
    let url = format!(
        "{}/{}:{action}",
        descriptor.endpoint.trim_end_matches('/'),
        descriptor.model
    );

    let mut system_parts = Vec::new();
    let mut contents = Vec::new();
    for message in &request.history {
        let role = match message.role {
            Role::System => {
                system_parts.push(ApiPart::text(message.content.clone()));
                continue;
            }
            Role::User => "user",
            Role::Assistant => "model",
        };
        contents.push(ApiContent {
            role,
            parts: vec![ApiPart::text(message.content.clone())],
        });
    }

    let mut parts = vec![ApiPart::text(compose_user_text(
        request,
        descriptor.accepts_images,
    ))];
    if descriptor.accepts_images {
        parts.extend(
            request
                .attachments
                .iter()
                .filter_map(|attachment| match &attachment.content {
                    AttachmentContent::Image {
                        mime_type,
                        data_url,
                    } => Some(ApiPart {
                        text: None,
                        inline_data: Some(ApiInlineData {
                            mime_type: mime_type.clone(),
                            data: data_url_payload(data_url).to_string(),
                        }),
                    }),
                    AttachmentContent::Text(_) => None,
                }),
        );
    }
    contents.push(ApiContent {
        role: "user",
        parts,
    });

    let payload = ApiRequest {
        contents,
        system_instruction: (!system_parts.is_empty()).then_some(ApiSystemInstruction {
            parts: system_parts,
        }),
        generation_config: ApiGenerationConfig {
            temperature: request.options.temperature,
            top_k: TOP_K,
            top_p: TOP_P,
            max_output_tokens: request.options.max_tokens,
        },
    };

    let body = merge_extra_body(to_body(&payload)?, &descriptor.extra_body)?;
    let credential = api_key.map(|key| (HeaderName::from_static(API_KEY_HEADER), key.to_string()));

    Ok(HttpRequest {
        url,
        method: Method::POST,
        headers: build_headers(descriptor, credential)?,
        body,
    })
}

pub(crate) fn parse_response(
    descriptor: &ProviderDescriptor,
    body: &str,
) -> Result<ParsedResponse, ProviderError> {
    let parsed: ApiResponse = serde_json::from_str(body).map_err(|err| {
        ProviderError::parse(format!(
            "{} response was not valid JSON: {err}",
            descriptor.display_name
        ))
    })?;

    let (text, reasoning) = collect_parts(parsed).ok_or_else(|| {
        ProviderError::parse(format!(
            "{} response did not include candidates",
            descriptor.display_name
        ))
    })?;

    if text.trim().is_empty() {
        return Err(ProviderError::parse(format!(
            "No response from {}",
            descriptor.display_name
        )));
    }

    Ok(ParsedResponse {
        text,
        reasoning: (!reasoning.is_empty()).then_some(reasoning),
    })
}

pub(crate) fn parse_frame(payload: &[u8]) -> StreamFrame {
    match serde_json::from_slice::<ApiResponse>(frame_payload(payload)) {
        Ok(parsed) => match collect_parts(parsed) {
            Some((content, reasoning)) => StreamFrame::delta(content, reasoning),
            None => StreamFrame::Ignorable,
        },
        Err(_) => StreamFrame::Ignorable,
    }
}

/// Splits the first candidate's parts into answer text and `thought` text.
fn collect_parts(response: ApiResponse) -> Option<(String, String)> {
    let candidate = response.candidates.into_iter().next()?;
    let mut text = String::new();
    let mut reasoning = String::new();

    for part in candidate.content?.parts {
        let Some(value) = part.text else { continue };
        if part.thought {
            reasoning.push_str(&value);
        } else {
            text.push_str(&value);
        }
    }

    Some((text, reasoning))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: &'static str,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiInlineData>,
}

impl ApiPart {
    fn text(value: String) -> Self {
        Self {
            text: Some(value),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    top_k: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ApiResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Attachment, Message, ProviderErrorKind};

    #[test]
    fn request_maps_roles_and_inlines_images() {
        let descriptor = ProviderDescriptor::gemini().with_model("gemini-test");
        let request = ChatRequest::new(
            vec![
                Message::new(Role::System, "Be brief"),
                Message::new(Role::User, "Hi"),
                Message::new(Role::Assistant, "Hello"),
            ],
            "Describe",
        )
        .with_attachments(vec![Attachment::image(
            "img",
            "leaf.png",
            "image/png",
            "data:image/png;base64,QUJD",
        )])
        .with_options(acommon::GenerationOptions::default().with_temperature(0.7));

        let http = build(&descriptor, &request, Some("g-key")).expect("request should build");

        assert_eq!(
            http.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(
            http.headers.get("x-goog-api-key").map(|v| v.as_bytes()),
            Some(&b"g-key"[..])
        );
        assert_eq!(http.body["systemInstruction"], json!({"parts": [{"text": "Be brief"}]}));
        assert_eq!(http.body["contents"][1]["role"], "model");
        assert_eq!(
            http.body["contents"][2]["parts"][1],
            json!({"inline_data": {"mime_type": "image/png", "data": "QUJD"}})
        );
        assert_eq!(http.body["generationConfig"]["topK"], 40);
    }

    #[test]
    fn streaming_uses_sse_action_only_when_supported() {
        let request = ChatRequest::new(Vec::new(), "Hi").with_streaming(true);

        let plain = build(&ProviderDescriptor::gemini(), &request, Some("k")).expect("build");
        assert!(plain.url.ends_with(":generateContent"));

        let streaming = build(
            &ProviderDescriptor::gemini().with_native_streaming(true),
            &request,
            Some("k"),
        )
        .expect("build");
        assert!(streaming.url.ends_with(":streamGenerateContent?alt=sse"));
    }

    #[test]
    fn thought_parts_are_reasoning() {
        let descriptor = ProviderDescriptor::gemini();
        let parsed = parse_response(
            &descriptor,
            r#"{"candidates":[{"content":{"parts":[{"text":"plan","thought":true},{"text":"Answer"}]}}]}"#,
        )
        .expect("response should parse");

        assert_eq!(parsed.text, "Answer");
        assert_eq!(parsed.reasoning.as_deref(), Some("plan"));
    }

    #[test]
    fn missing_candidates_is_a_parse_error() {
        let error = parse_response(&ProviderDescriptor::gemini(), r#"{"candidates":[]}"#)
            .expect_err("no candidates");
        assert_eq!(error.kind, ProviderErrorKind::Parse);

        assert_eq!(parse_frame(br#"{"candidates":[]}"#), StreamFrame::Ignorable);
    }
}
