// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope builders for tests.

use chrono::Utc;

use courier_core::envelope::{Ack, Hello, Request, Response};
use courier_core::{Body, Envelope};

pub fn hello(msg_id: &str, client_id: &str) -> Envelope {
    Envelope::new(
        msg_id,
        Body::Hello(Hello {
            client_id: client_id.to_string(),
            client_name: format!("{client_id}-client"),
            client_version: "1.0.0".to_string(),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }),
    )
}

pub fn leave(msg_id: &str, client_id: &str) -> Envelope {
    Envelope::leave(msg_id, client_id)
}

pub fn request(msg_id: &str, req_id: &str, from: &str, to: &str, content: &str) -> Envelope {
    Envelope::new(
        msg_id,
        Body::Request(Request {
            req_id: req_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            command_id: 1,
            content: content.to_string(),
            timestamp: Some(Utc::now()),
        }),
    )
}

pub fn response(msg_id: &str, resp_id: &str, from: &str, to: &str, content: &str) -> Envelope {
    Envelope::new(
        msg_id,
        Body::Response(Response {
            resp_id: resp_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            content: content.to_string(),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }),
    )
}

/// The Ack body of `env`, if it is one.
pub fn as_ack(env: &Envelope) -> Option<&Ack> {
    match &env.body {
        Body::Ack(ack) => Some(ack),
        _ => None,
    }
}

pub fn as_request(env: &Envelope) -> Option<&Request> {
    match &env.body {
        Body::Request(req) => Some(req),
        _ => None,
    }
}

pub fn as_response(env: &Envelope) -> Option<&Response> {
    match &env.body {
        Body::Response(resp) => Some(resp),
        _ => None,
    }
}
