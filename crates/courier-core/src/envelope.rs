// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The envelope exchanged between clients and the relay.
//!
//! On the wire an envelope is a JSON object with a top-level `msgid` and
//! exactly one of the arms `hi`, `leave`, `req`, `resp` or `ack`. In memory it
//! is a tagged enum, so a zero-arm or multi-arm frame cannot be represented
//! and is rejected during deserialization.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CourierError;
use crate::types::{ClientId, ClientInfo, RecordKind};

/// Registration sent by a client right after connecting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hello {
    #[serde(rename = "clientid")]
    pub client_id: String,
    #[serde(rename = "clientname")]
    pub client_name: String,
    #[serde(rename = "clientversion")]
    pub client_version: String,
    #[serde(rename = "clientdescription")]
    pub client_description: String,
    #[serde(rename = "allowedcommandids")]
    pub allowed_command_ids: BTreeMap<i64, String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Hello {
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            client_id: ClientId(self.client_id.clone()),
            name: self.client_name.clone(),
            version: self.client_version.clone(),
            description: self.client_description.clone(),
            allowed_command_ids: self.allowed_command_ids.clone(),
        }
    }
}

/// Graceful disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Leave {
    #[serde(rename = "clientid")]
    pub client_id: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Addressed request routed by client identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    #[serde(rename = "reqid")]
    pub req_id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "commandid")]
    pub command_id: i64,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Addressed response routed by client identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    #[serde(rename = "respid")]
    pub resp_id: String,
    pub from: String,
    pub to: String,
    pub content: String,
    #[serde(rename = "errcode")]
    pub err_code: i32,
    #[serde(rename = "errmsg")]
    pub err_msg: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Acknowledgement. `msg_id` quotes the envelope being acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ack {
    #[serde(rename = "msgid")]
    pub msg_id: String,
    #[serde(rename = "isok")]
    pub is_ok: bool,
    pub msg: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// The single populated arm of an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Hello(Hello),
    Leave(Leave),
    Request(Request),
    Response(Response),
    Ack(Ack),
}

/// A relay envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub struct Envelope {
    /// Relay-generated for envelopes the relay originates, client-supplied otherwise.
    pub msg_id: String,
    pub body: Body,
}

impl Envelope {
    pub fn new(msg_id: impl Into<String>, body: Body) -> Self {
        Self {
            msg_id: msg_id.into(),
            body,
        }
    }

    /// Builds an Ack that quotes `quoted_msg_id`.
    pub fn ack(
        msg_id: impl Into<String>,
        quoted_msg_id: impl Into<String>,
        is_ok: bool,
        msg: impl Into<String>,
    ) -> Self {
        Self::new(
            msg_id,
            Body::Ack(Ack {
                msg_id: quoted_msg_id.into(),
                is_ok,
                msg: msg.into(),
                timestamp: Some(Utc::now()),
            }),
        )
    }

    /// Builds a Leave for `client_id`.
    pub fn leave(msg_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self::new(
            msg_id,
            Body::Leave(Leave {
                client_id: client_id.into(),
                timestamp: Some(Utc::now()),
            }),
        )
    }

    /// Short arm name for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match &self.body {
            Body::Hello(_) => "hello",
            Body::Leave(_) => "leave",
            Body::Request(_) => "request",
            Body::Response(_) => "response",
            Body::Ack(_) => "ack",
        }
    }

    /// The pending table a forwarded Request or Response is persisted in.
    pub fn record_kind(&self) -> Option<RecordKind> {
        match self.body {
            Body::Request(_) => Some(RecordKind::Request),
            Body::Response(_) => Some(RecordKind::Response),
            _ => None,
        }
    }

    /// `(correlation id, from, to)` of a Request or Response.
    pub fn route(&self) -> Option<(&str, &str, &str)> {
        match &self.body {
            Body::Request(r) => Some((r.req_id.as_str(), r.from.as_str(), r.to.as_str())),
            Body::Response(r) => Some((r.resp_id.as_str(), r.from.as_str(), r.to.as_str())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String, CourierError> {
        serde_json::to_string(self).map_err(|e| CourierError::Internal(e.to_string()))
    }

    /// Decodes a frame. Any decode failure is a protocol error.
    pub fn from_json(s: &str) -> Result<Self, CourierError> {
        serde_json::from_str(s).map_err(|e| CourierError::Protocol(e.to_string()))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hi: Option<Hello>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    leave: Option<Leave>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    req: Option<Request>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resp: Option<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ack: Option<Ack>,
    #[serde(default)]
    msgid: String,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let RawEnvelope {
            hi,
            leave,
            req,
            resp,
            ack,
            msgid,
        } = raw;

        let mut arms = [
            hi.map(Body::Hello),
            leave.map(Body::Leave),
            req.map(Body::Request),
            resp.map(Body::Response),
            ack.map(Body::Ack),
        ]
        .into_iter()
        .flatten();

        match (arms.next(), arms.next()) {
            (Some(body), None) => Ok(Envelope { msg_id: msgid, body }),
            (None, _) => Err("envelope has no body".to_string()),
            (Some(_), Some(_)) => Err("envelope has more than one body".to_string()),
        }
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(env: Envelope) -> Self {
        let mut raw = RawEnvelope {
            msgid: env.msg_id,
            ..Default::default()
        };
        match env.body {
            Body::Hello(b) => raw.hi = Some(b),
            Body::Leave(b) => raw.leave = Some(b),
            Body::Request(b) => raw.req = Some(b),
            Body::Response(b) => raw.resp = Some(b),
            Body::Ack(b) => raw.ack = Some(b),
        }
        raw
    }
}
