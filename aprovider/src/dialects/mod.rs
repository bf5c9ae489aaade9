//! Pure request/response functions for each [`crate::ProviderDialect`].

pub(crate) mod gemini;
pub(crate) mod openai_chat;
pub(crate) mod relay;

use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::HeaderMap;
use serde_json::{Map, Value};

use crate::{AttachmentContent, ChatRequest, ProviderDescriptor, ProviderError};

const IMAGE_NOTE: &str = "This model cannot process images directly";

/// Appends text attachments as `[File: name]` blocks and, when the provider cannot take
/// images, a note per image so the model knows something was attached.
pub(crate) fn compose_user_text(request: &ChatRequest, accepts_images: bool) -> String {
    let mut text = request.message.clone();

    for attachment in &request.attachments {
        match &attachment.content {
            AttachmentContent::Text(content) => {
                text.push_str(&format!("\n\n[File: {}]\n{}", attachment.name, content));
            }
            AttachmentContent::Image { .. } if !accepts_images => {
                text.push_str(&format!("\n\n[Image: {} - {IMAGE_NOTE}]", attachment.name));
            }
            AttachmentContent::Image { .. } => {}
        }
    }

    text
}

/// JSON content type, the descriptor's extra headers, and an optional credential header.
pub(crate) fn build_headers(
    descriptor: &ProviderDescriptor,
    credential: Option<(HeaderName, String)>,
) -> Result<HeaderMap, ProviderError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in &descriptor.extra_headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ProviderError::configuration(format!(
                "{} header name '{name}' is not valid",
                descriptor.display_name
            ))
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            ProviderError::configuration(format!(
                "{} header '{name}' has an invalid value",
                descriptor.display_name
            ))
        })?;
        headers.insert(name, value);
    }

    if let Some((name, secret)) = credential {
        let mut value = HeaderValue::from_str(&secret).map_err(|_| {
            ProviderError::configuration(format!(
                "{} API key contains characters that cannot be sent in a header",
                descriptor.display_name
            ))
        })?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Merges descriptor-level body fields into a serialized request body.
pub(crate) fn merge_extra_body(
    mut body: Value,
    extra: &Map<String, Value>,
) -> Result<Value, ProviderError> {
    if extra.is_empty() {
        return Ok(body);
    }

    let Value::Object(fields) = &mut body else {
        return Err(ProviderError::configuration(
            "request body must be a JSON object to accept extra fields",
        ));
    };

    for (key, value) in extra {
        fields.insert(key.clone(), value.clone());
    }

    Ok(body)
}

pub(crate) fn to_body<T: serde::Serialize>(payload: &T) -> Result<Value, ProviderError> {
    serde_json::to_value(payload)
        .map_err(|err| ProviderError::invalid_request(format!("request body: {err}")))
}

/// Strips the leading `data:` of an SSE payload if a caller passes the whole line.
pub(crate) fn frame_payload(payload: &[u8]) -> &[u8] {
    let trimmed = payload.trim_ascii();
    match trimmed.strip_prefix(b"data:") {
        Some(rest) => rest.trim_ascii(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attachment, ProviderDescriptor};

    #[test]
    fn text_attachments_become_file_blocks() {
        let request = ChatRequest::new(Vec::new(), "Summarize").with_attachments(vec![
            Attachment::text("a", "notes.txt", "cells divide"),
            Attachment::image("b", "diagram.png", "image/png", "data:image/png;base64,QUJD"),
        ]);

        assert_eq!(
            compose_user_text(&request, true),
            "Summarize\n\n[File: notes.txt]\ncells divide"
        );
        assert_eq!(
            compose_user_text(&request, false),
            "Summarize\n\n[File: notes.txt]\ncells divide\n\n[Image: diagram.png - This model cannot process images directly]"
        );
    }

    #[test]
    fn control_characters_in_keys_are_configuration_errors() {
        let descriptor = ProviderDescriptor::groq();
        let error = build_headers(
            &descriptor,
            Some((http::header::AUTHORIZATION, "Bearer bad\nkey".to_string())),
        )
        .expect_err("newline must be rejected");

        assert_eq!(error.kind, crate::ProviderErrorKind::Configuration);
    }

    #[test]
    fn credential_headers_are_marked_sensitive() {
        let descriptor = ProviderDescriptor::groq();
        let headers = build_headers(
            &descriptor,
            Some((http::header::AUTHORIZATION, "Bearer sk-test".to_string())),
        )
        .expect("headers should build");

        let value = headers
            .get(http::header::AUTHORIZATION)
            .expect("authorization header should exist");
        assert!(value.is_sensitive());
    }

    #[test]
    fn frame_payload_accepts_bare_or_prefixed_input() {
        assert_eq!(frame_payload(b"data: {\"a\":1}"), b"{\"a\":1}");
        assert_eq!(frame_payload(b"  {\"a\":1}\r"), b"{\"a\":1}");
    }
}
