//! Same-origin relay payloads.
//!
//! The relay receives the key in the body, composes attachments itself and forwards to the
//! upstream vendor. Streams come back either as `{type, data}` JSON lines or as the vendor's
//! own SSE passed through.

use http::Method;
use serde::{Deserialize, Serialize};

use crate::{
    AttachmentContent, ChatRequest, HttpRequest, ParsedResponse, ProviderDescriptor,
    ProviderError, StreamFrame,
};

use super::{build_headers, frame_payload, merge_extra_body, openai_chat, to_body};

pub(crate) fn build(
    descriptor: &ProviderDescriptor,
    request: &ChatRequest,
    api_key: Option<&str>,
) -> Result<HttpRequest, ProviderError> {
    let mut messages = request
        .history
        .iter()
        .map(|message| RelayMessage {
            role: message.role.as_str(),
            content: &message.content,
        })
        .collect::<Vec<_>>();
    messages.push(RelayMessage {
        role: "user",
        content: &request.message,
    });

    let attachments = request
        .attachments
        .iter()
        .map(|attachment| match &attachment.content {
            AttachmentContent::Image { data_url, .. } => RelayAttachment {
                kind: "image",
                name: &attachment.name,
                data_url: Some(data_url),
                text: None,
            },
            AttachmentContent::Text(text) => RelayAttachment {
                kind: "text",
                name: &attachment.name,
                data_url: None,
                text: Some(text),
            },
        })
        .collect::<Vec<_>>();

    let payload = RelayRequest {
        api_key,
        model: &descriptor.model,
        messages,
        attachments,
        stream: request.options.stream && descriptor.supports_native_streaming,
    };

    Ok(HttpRequest {
        url: descriptor.endpoint.clone(),
        method: Method::POST,
        headers: build_headers(descriptor, None)?,
        body: merge_extra_body(to_body(&payload)?, &descriptor.extra_body)?,
    })
}

pub(crate) fn parse_response(
    descriptor: &ProviderDescriptor,
    body: &str,
) -> Result<ParsedResponse, ProviderError> {
    openai_chat::parse_response(descriptor, body)
}

pub(crate) fn parse_frame(payload: &[u8]) -> StreamFrame {
    match serde_json::from_slice::<RelayFrame>(frame_payload(payload)) {
        Ok(RelayFrame::Content { data }) => StreamFrame::content(data),
        Ok(RelayFrame::Reasoning { data }) => StreamFrame::reasoning(data),
        Err(_) => openai_chat::parse_frame(payload),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    api_key: Option<&'a str>,
    model: &'a str,
    messages: Vec<RelayMessage<'a>>,
    attachments: Vec<RelayAttachment<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayAttachment<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RelayFrame {
    Content { data: String },
    Reasoning { data: String },
}
