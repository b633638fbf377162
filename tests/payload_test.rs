use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use email_normalize::*;
use serde_json::{Value, json};

fn b64(text: &str) -> String {
    URL_SAFE_NO_PAD.encode(text)
}

fn text_part(mime_type: &str, body: &str) -> Value {
    json!({
        "mimeType": mime_type,
        "filename": "",
        "headers": [],
        "body": { "size": body.len(), "data": b64(body) }
    })
}

fn message(id: &str, headers: Value, payload: Value) -> RawMessage {
    let mut payload = payload;
    payload["headers"] = headers;
    serde_json::from_value(json!({
        "id": id,
        "threadId": "thread-1",
        "internalDate": "1700000000000",
        "payload": payload
    }))
    .unwrap()
}

fn headers(from: &str, subject: &str) -> Value {
    json!([
        { "name": "From", "value": from },
        { "name": "To", "value": "Alice <alice@example.com>, bob@example.com" },
        { "name": "Subject", "value": subject },
        { "name": "Date", "value": "Tue, 3 Feb 2026 09:15:00 +0000" }
    ])
}

// --- decode_body ---

#[test]
fn test_decode_body_padded_and_unpadded() {
    let text = "Hello, world? Padding check";
    assert_eq!(decode_body(&URL_SAFE.encode(text)).unwrap(), text);
    assert_eq!(decode_body(&URL_SAFE_NO_PAD.encode(text)).unwrap(), text);
}

#[test]
fn test_decode_body_ignores_line_breaks() {
    let encoded = URL_SAFE_NO_PAD.encode("A body long enough to be wrapped over lines");
    let (head, tail) = encoded.split_at(12);
    let wrapped = format!("{head}\r\n{tail}");

    assert_eq!(
        decode_body(&wrapped).unwrap(),
        "A body long enough to be wrapped over lines"
    );
}

#[test]
fn test_decode_body_replaces_invalid_utf8() {
    let encoded = URL_SAFE_NO_PAD.encode([b'o', b'k', 0xff]);
    assert_eq!(decode_body(&encoded).unwrap(), "ok\u{fffd}");
}

#[test]
fn test_decode_body_rejects_garbage() {
    let err = decode_body("!!!not base64!!!").unwrap_err();
    assert!(matches!(err, ExtractError::Decode(_)));
}

// --- walk_payload ---

#[test]
fn test_walk_alternative_bodies() {
    let payload: RawPayload = serde_json::from_value(json!({
        "mimeType": "multipart/alternative",
        "parts": [
            text_part("text/plain", "Plain version"),
            text_part("text/html", "<p>HTML version</p>")
        ]
    }))
    .unwrap();

    let walked = walk_payload(&payload);
    assert_eq!(walked.body_text.as_deref(), Some("Plain version"));
    assert_eq!(walked.body_html.as_deref(), Some("<p>HTML version</p>"));
    assert!(walked.issues.is_empty());
}

#[test]
fn test_walk_prefers_shallowest_body() {
    let payload: RawPayload = serde_json::from_value(json!({
        "mimeType": "multipart/mixed",
        "parts": [
            {
                "mimeType": "multipart/alternative",
                "parts": [ text_part("text/plain", "deep") ]
            },
            text_part("text/plain", "shallow")
        ]
    }))
    .unwrap();

    assert_eq!(walk_payload(&payload).body_text.as_deref(), Some("shallow"));
}

#[test]
fn test_walk_single_part_message() {
    let payload: RawPayload =
        serde_json::from_value(text_part("text/plain", "Just text")).unwrap();

    let walked = walk_payload(&payload);
    assert_eq!(walked.body_text.as_deref(), Some("Just text"));
    assert!(walked.body_html.is_none());
    assert!(walked.attachments.is_empty());
}

#[test]
fn test_walk_collects_attachments() {
    let payload: RawPayload = serde_json::from_value(json!({
        "mimeType": "multipart/mixed",
        "parts": [
            text_part("text/plain", "See attached"),
            {
                "mimeType": "application/pdf",
                "filename": "Q4_Roadmap.pdf",
                "body": { "attachmentId": "ANGjdJ8", "size": 245760 }
            },
            {
                "mimeType": "",
                "filename": "data.bin",
                "body": { "attachmentId": "ANGjdJ9", "size": 12 }
            }
        ]
    }))
    .unwrap();

    let walked = walk_payload(&payload);
    assert_eq!(walked.body_text.as_deref(), Some("See attached"));
    assert_eq!(walked.attachments.len(), 2);
    assert_eq!(walked.attachments[0].filename, "Q4_Roadmap.pdf");
    assert_eq!(walked.attachments[0].attachment_id, "ANGjdJ8");
    assert_eq!(walked.attachments[0].size, 245_760);
    assert_eq!(walked.attachments[1].mime_type, "application/octet-stream");
}

#[test]
fn test_walk_text_attachment_is_not_the_body() {
    let payload: RawPayload = serde_json::from_value(json!({
        "mimeType": "multipart/mixed",
        "parts": [
            {
                "mimeType": "text/plain",
                "filename": "notes.txt",
                "body": { "attachmentId": "ATT1", "size": 40 }
            },
            text_part("text/plain", "Real body")
        ]
    }))
    .unwrap();

    let walked = walk_payload(&payload);
    assert_eq!(walked.body_text.as_deref(), Some("Real body"));
    assert_eq!(walked.attachments.len(), 1);
}

#[test]
fn test_walk_forwarded_rfc822_parts() {
    let payload: RawPayload = serde_json::from_value(json!({
        "mimeType": "multipart/mixed",
        "parts": [
            text_part("text/plain", "Outer body"),
            {
                "mimeType": "message/rfc822",
                "headers": [
                    { "name": "From", "value": "Carol <carol@example.com>" },
                    { "name": "Date", "value": "Sat, 31 Jan 2026 16:00:00 +0000" },
                    { "name": "Subject", "value": "First" }
                ],
                "parts": [ text_part("text/plain", "First forwarded body") ]
            },
            {
                "mimeType": "message/rfc822",
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "headers": [
                            { "name": "From", "value": "Dan <dan@example.com>" },
                            { "name": "Subject", "value": "Second" }
                        ],
                        "parts": [ text_part("text/html", "<p>Second forwarded body</p>") ]
                    }
                ]
            }
        ]
    }))
    .unwrap();

    let walked = walk_payload(&payload);
    assert_eq!(walked.body_text.as_deref(), Some("Outer body"));
    assert_eq!(walked.forwarded.len(), 2);

    let first = &walked.forwarded[0];
    assert_eq!(first.from_address, "Carol <carol@example.com>");
    assert_eq!(first.subject, "First");
    assert_eq!(first.body_text, "First forwarded body");
    assert!(first.body_html.is_none());

    let second = &walked.forwarded[1];
    assert_eq!(second.from_address, "Dan <dan@example.com>");
    assert_eq!(second.subject, "Second");
    assert!(second.body_text.is_empty());
    assert_eq!(second.body_html.as_deref(), Some("<p>Second forwarded body</p>"));
}

#[test]
fn test_walk_inline_rfc822_message() {
    let raw = "From: Erin <erin@example.com>\r\nSubject: Old thread\r\nDate: Wed, 4 Feb 2026 08:00:00 +0000\r\n\r\nOld body text";
    let payload: RawPayload = serde_json::from_value(json!({
        "mimeType": "multipart/mixed",
        "parts": [
            text_part("text/plain", "Forwarding as attachment"),
            {
                "mimeType": "message/rfc822",
                "body": { "data": b64(raw), "size": raw.len() }
            }
        ]
    }))
    .unwrap();

    let walked = walk_payload(&payload);
    assert_eq!(walked.forwarded.len(), 1);
    assert_eq!(walked.forwarded[0].from_address, "Erin <erin@example.com>");
    assert_eq!(walked.forwarded[0].subject, "Old thread");
    assert!(walked.forwarded[0].body_text.contains("Old body text"));
}

#[test]
fn test_walk_null_fields_are_empty() {
    let raw = RawMessage::from_json(
        r#"{
            "id": "m1",
            "threadId": null,
            "internalDate": null,
            "payload": {
                "mimeType": "text/plain",
                "filename": null,
                "headers": null,
                "body": { "data": null, "size": null },
                "parts": null
            }
        }"#,
    )
    .unwrap();

    let walked = walk_payload(&raw.payload);
    assert!(walked.body_text.is_none());
    assert!(walked.issues.is_empty());

    let parsed = parse_message(&raw, &AttachmentFilter::default());
    assert!(!parsed.has_body());
    assert!(parsed.date.is_none());
    assert!(parsed.from_address.is_empty());
}

#[test]
fn test_walk_reports_undecodable_body() {
    let payload: RawPayload = serde_json::from_value(json!({
        "mimeType": "multipart/alternative",
        "parts": [
            { "mimeType": "text/plain", "body": { "data": "!!!not base64!!!" } },
            text_part("text/html", "<p>Still here</p>")
        ]
    }))
    .unwrap();

    let walked = walk_payload(&payload);
    assert!(walked.body_text.is_none());
    assert_eq!(walked.body_html.as_deref(), Some("<p>Still here</p>"));
    assert_eq!(walked.issues.len(), 1);
    assert!(walked.issues[0].starts_with("Could not decode text/plain body"));
}

#[test]
fn test_raw_message_rejects_malformed_json() {
    let err = RawMessage::from_json(r#"{"payload": 42}"#).unwrap_err();
    assert!(matches!(err, ExtractError::Structure(_)));
}

// --- parse_message ---

#[test]
fn test_parse_message_headers() {
    let raw = message(
        "m1",
        headers("Alice <alice@example.com>", "Planning"),
        text_part("text/plain", "Hello"),
    );
    let parsed = parse_message(&raw, &AttachmentFilter::default());

    assert_eq!(parsed.message_id.as_str(), "m1");
    assert_eq!(parsed.from_address, "Alice <alice@example.com>");
    assert_eq!(
        parsed.to_addresses,
        vec!["Alice <alice@example.com>", "bob@example.com"]
    );
    assert!(parsed.cc_addresses.is_empty());
    assert_eq!(parsed.subject, "Planning");
    assert_eq!(
        parsed.date.unwrap().format("%Y-%m-%d %H:%M").to_string(),
        "2026-02-03 09:15"
    );
    assert_eq!(parsed.body_text.as_deref(), Some("Hello"));
}

#[test]
fn test_header_lookup_is_case_insensitive() {
    let raw = message(
        "m1",
        json!([{ "name": "SUBJECT", "value": "Shouting" }, { "name": "subject", "value": "Later" }]),
        text_part("text/plain", "Hello"),
    );

    assert_eq!(raw.payload.header("Subject"), Some("Shouting"));
    assert_eq!(parse_message(&raw, &AttachmentFilter::default()).subject, "Shouting");
}

#[test]
fn test_parse_message_falls_back_to_internal_date() {
    let raw = message(
        "m1",
        json!([{ "name": "From", "value": "a@x.com" }, { "name": "Date", "value": "sometime soon" }]),
        text_part("text/plain", "Hello"),
    );
    let parsed = parse_message(&raw, &AttachmentFilter::default());

    assert_eq!(
        parsed.date.unwrap().format("%Y-%m-%d %H:%M").to_string(),
        "2023-11-14 22:13"
    );
}

#[test]
fn test_parse_message_filters_attachments() {
    let raw = message(
        "m1",
        headers("a@x.com", "Files"),
        json!({
            "mimeType": "multipart/mixed",
            "parts": [
                text_part("text/plain", "Files attached"),
                {
                    "mimeType": "image/png",
                    "filename": "image001.png",
                    "body": { "attachmentId": "A1", "size": 3000 }
                },
                {
                    "mimeType": "text/calendar",
                    "filename": "invite.ics",
                    "body": { "attachmentId": "A2", "size": 900 }
                },
                {
                    "mimeType": "application/pdf",
                    "filename": "contract.pdf",
                    "body": { "attachmentId": "A3", "size": 80000 }
                }
            ]
        }),
    );

    let parsed = parse_message(&raw, &AttachmentFilter::default());
    assert_eq!(parsed.attachments.len(), 1);
    assert_eq!(parsed.attachments[0].filename, "contract.pdf");

    let unfiltered = parse_message(&raw, &AttachmentFilter::allow_all());
    assert_eq!(unfiltered.attachments.len(), 3);
}

#[test]
fn test_parse_message_finds_drive_links() {
    let raw = message(
        "m1",
        headers("a@x.com", "Budget"),
        text_part(
            "text/plain",
            "Budget is here: https://docs.google.com/spreadsheets/d/1ABC_budget/edit",
        ),
    );

    let parsed = parse_message(&raw, &AttachmentFilter::default());
    assert_eq!(parsed.drive_links.len(), 1);
    assert_eq!(parsed.drive_links[0].file_id, "1ABC_budget");
}

#[test]
fn test_parse_message_drive_links_from_html() {
    let raw = message(
        "m1",
        headers("a@x.com", "Deck"),
        text_part(
            "text/html",
            r#"<a href="https://docs.google.com/presentation/d/1DECK/edit">deck</a>"#,
        ),
    );

    let parsed = parse_message(&raw, &AttachmentFilter::default());
    assert_eq!(parsed.drive_links.len(), 1);
    assert_eq!(parsed.drive_links[0].file_id, "1DECK");
}

// --- parse_thread ---

#[test]
fn test_parse_thread_keeps_order_and_subject() {
    let raw: RawThread = serde_json::from_value(json!({
        "id": "thread-1",
        "messages": [
            {
                "id": "m1",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [{ "name": "Subject", "value": "Kickoff" }],
                    "body": { "data": b64("First") }
                }
            },
            {
                "id": "m2",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [{ "name": "Subject", "value": "Re: Kickoff" }],
                    "body": { "data": b64("Second") }
                }
            }
        ]
    }))
    .unwrap();

    let thread = parse_thread(&raw, &AttachmentFilter::default());
    assert_eq!(thread.thread_id, "thread-1");
    assert_eq!(thread.subject, "Kickoff");
    assert_eq!(thread.message_count(), 2);
    assert_eq!(thread.messages[0].message_id.as_str(), "m1");
    assert_eq!(thread.messages[1].body_text.as_deref(), Some("Second"));
    assert!(!thread.has_attachments());
}

#[test]
fn test_parse_empty_thread() {
    let thread = parse_thread(&RawThread::from_json("{}").unwrap(), &AttachmentFilter::default());

    assert!(thread.subject.is_empty());
    assert_eq!(thread.message_count(), 0);
}
