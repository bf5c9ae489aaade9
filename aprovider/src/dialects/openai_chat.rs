//! OpenAI-compatible chat completions payloads (Groq, OpenRouter, OpenAI).

use http::Method;
use http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

use crate::{
    AttachmentContent, ChatRequest, HttpRequest, ParsedResponse, ProviderDescriptor,
    ProviderError, StreamFrame,
};

use super::{build_headers, compose_user_text, frame_payload, merge_extra_body, to_body};

pub(crate) fn build(
    descriptor: &ProviderDescriptor,
    request: &ChatRequest,
    api_key: Option<&str>,
) -> Result<HttpRequest, ProviderError> {
    let stream = request.options.stream && descriptor.supports_native_streaming;
    let payload = ApiRequest {
        model: &descriptor.model,
        messages: build_messages(request, descriptor.accepts_images),
        temperature: request.options.temperature,
        max_tokens: request.options.max_tokens,
        stream,
    };

    let body = merge_extra_body(to_body(&payload)?, &descriptor.extra_body)?;
    let credential = api_key.map(|key| (AUTHORIZATION, format!("Bearer {key}")));

    Ok(HttpRequest {
        url: descriptor.endpoint.clone(),
        method: Method::POST,
        headers: build_headers(descriptor, credential)?,
        body,
    })
}

pub(crate) fn build_messages(request: &ChatRequest, accepts_images: bool) -> Vec<ApiMessage> {
    let mut messages = request
        .history
        .iter()
        .map(|message| ApiMessage {
            role: message.role.as_str(),
            content: ApiContent::Text(message.content.clone()),
        })
        .collect::<Vec<_>>();

    let text = compose_user_text(request, accepts_images);
    let images = if accepts_images {
        request
            .attachments
            .iter()
            .filter_map(|attachment| match &attachment.content {
                AttachmentContent::Image { data_url, .. } => Some(ApiContentPart::ImageUrl {
                    image_url: ApiImageUrl {
                        url: data_url.clone(),
                    },
                }),
                AttachmentContent::Text(_) => None,
            })
            .collect::<Vec<_>>()
    } else {
        Vec::new()
    };

    let content = if images.is_empty() {
        ApiContent::Text(text)
    } else {
        let mut parts = vec![ApiContentPart::Text { text }];
        parts.extend(images);
        ApiContent::Parts(parts)
    };

    messages.push(ApiMessage {
        role: "user",
        content,
    });
    messages
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

    let choice = parsed.choices.into_iter().next().ok_or_else(|| {
        ProviderError::parse(format!(
            "{} response did not include choices",
            descriptor.display_name
        ))
    })?;

    let text = choice.message.content.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ProviderError::parse(format!(
            "No response from {}",
            descriptor.display_name
        )));
    }

    Ok(ParsedResponse {
        text,
        reasoning: choice.message.reasoning.filter(|value| !value.is_empty()),
    })
}

pub(crate) fn parse_frame(payload: &[u8]) -> StreamFrame {
    let payload = frame_payload(payload);
    if payload == b"[DONE]" {
        return StreamFrame::Done;
    }

    let Ok(chunk) = serde_json::from_slice::<ApiStreamChunk>(payload) else {
        return StreamFrame::Ignorable;
    };

    match chunk.choices.into_iter().next() {
        Some(choice) => StreamFrame::delta(
            choice.delta.content.unwrap_or_default(),
            choice.delta.reasoning.unwrap_or_default(),
        ),
        None => StreamFrame::Ignorable,
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiMessage {
    pub role: &'static str,
    pub content: ApiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    #[serde(default)]
    pub choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiChoice {
    pub message: ApiAssistantMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiAssistantMessage {
    pub content: Option<String>,
    pub reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChunk {
    #[serde(default)]
    choices: Vec<ApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChoice {
    #[serde(default)]
    delta: ApiStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ApiStreamDelta {
    content: Option<String>,
    reasoning: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Attachment, Message, ProviderErrorKind, Role};

    #[test]
    fn images_become_image_url_parts_on_the_last_user_message() {
        let request = ChatRequest::new(vec![Message::new(Role::Assistant, "Hello")], "Look")
            .with_attachments(vec![Attachment::image(
                "img",
                "cell.png",
                "image/png",
                "data:image/png;base64,QUJD",
            )]);

        let value = serde_json::to_value(build_messages(&request, true)).expect("serialize");
        assert_eq!(
            value,
            json!([
                {"role": "assistant", "content": "Hello"},
                {"role": "user", "content": [
                    {"type": "text", "text": "Look"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,QUJD"}}
                ]}
            ])
        );
    }

    #[test]
    fn stream_frames_carry_content_and_reasoning_together() {
        let frame = parse_frame(br#"{"choices":[{"delta":{"content":"Hi","reasoning":"think"}}]}"#);
        assert_eq!(
            frame,
            StreamFrame::Delta {
                content: "Hi".to_string(),
                reasoning: "think".to_string(),
            }
        );
    }

    #[test]
    fn malformed_and_empty_frames_are_ignorable() {
        assert_eq!(parse_frame(b"{not json"), StreamFrame::Ignorable);
        assert_eq!(parse_frame(br#"{"choices":[]}"#), StreamFrame::Ignorable);
        assert_eq!(
            parse_frame(br#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            StreamFrame::Ignorable
        );
        assert_eq!(parse_frame(b"[DONE]"), StreamFrame::Done);
    }

    #[test]
    fn empty_message_content_is_a_parse_error() {
        let descriptor = ProviderDescriptor::groq();
        let error = parse_response(&descriptor, r#"{"choices":[{"message":{"content":""}}]}"#)
            .expect_err("empty text must fail");

        assert_eq!(error.kind, ProviderErrorKind::Parse);
        assert_eq!(error.message, "No response from Groq");
    }
}
