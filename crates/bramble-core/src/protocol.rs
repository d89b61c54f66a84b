//! Wire envelope for communication with the helper process.
//!
//! Each message is one frame: a 4-byte little-endian length header followed
//! by a JSON payload. Payloads are the tag-discriminated [`Request`] and
//! [`Response`] enums below. Everything past this envelope (most notably
//! the selector grammar inside [`Request::Query`]) belongs to the helper
//! process and is deliberately not modelled here.
//!
//! ```text
//! [Header: 4 bytes LE u32 payload length] [Payload: JSON]
//! ```
//!
//! # Example
//!
//! ```
//! use bramble_core::protocol::{Request, encode_request, decode_request};
//!
//! let req = Request::Query { selector: "button marked:'Save'".to_string() };
//! let wire = encode_request(&req).unwrap();
//!
//! // Skip the 4-byte length header to decode.
//! let decoded = decode_request(&wire[4..]).unwrap();
//! assert_eq!(decoded, req);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on a single frame payload. Screenshots dominate frame size;
/// anything beyond this indicates a desynchronized stream, not real data.
pub const MAX_FRAME_LEN: u32 = 32 * 1024 * 1024;

/// Errors that can occur while encoding or decoding frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The payload was not valid JSON for the expected message shape.
    #[error("invalid frame payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// A frame header announced a payload larger than [`MAX_FRAME_LEN`].
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    Oversize(u32),
}

/// A typed request from this library to the helper process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Liveness probe; the helper answers [`Response::Ok`].
    Ping,
    /// Launch the instrumented application and begin serving UI commands.
    Start {
        /// Package name of the application under test.
        package: String,
    },
    /// Evaluate a selector against the current UI tree.
    Query {
        /// Opaque selector expression, forwarded untouched.
        selector: String,
    },
    /// Touch a previously resolved element.
    Touch {
        /// Element reference from an earlier query or tree dump.
        reference: String,
    },
    /// Replace the text of a previously resolved element.
    SetText {
        /// Element reference from an earlier query or tree dump.
        reference: String,
        /// The text to set.
        value: String,
    },
    /// Dump the full UI tree.
    DumpTree,
    /// Capture the device screen.
    Screenshot,
    /// Read a shared-preferences file of the application under test.
    ReadPreferences {
        /// Preferences file name, without path or extension.
        file_name: String,
    },
}

impl Request {
    /// Short static name for tracing span metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Start { .. } => "start",
            Request::Query { .. } => "query",
            Request::Touch { .. } => "touch",
            Request::SetText { .. } => "set_text",
            Request::DumpTree => "dump_tree",
            Request::Screenshot => "screenshot",
            Request::ReadPreferences { .. } => "read_preferences",
        }
    }
}

/// A typed response from the helper process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// The operation completed with no data.
    Ok,
    /// The operation failed on the helper side.
    Error {
        /// Human-readable failure description.
        message: String,
        /// True when the failure was a stale element reference (the UI
        /// changed after the element was fetched).
        #[serde(default)]
        stale: bool,
    },
    /// Elements matched by a query, in document order.
    Elements {
        /// The matched element descriptors.
        elements: Vec<ElementDescriptor>,
    },
    /// The full UI tree. `root` is absent when no window is attached.
    Tree {
        /// Root node of the tree, if any.
        root: Option<TreeNode>,
    },
    /// A captured screen image.
    Screenshot {
        /// PNG bytes, base64-encoded.
        data: String,
    },
    /// Contents of a shared-preferences file.
    Preferences {
        /// Key/value pairs, all values rendered as strings.
        values: HashMap<String, String>,
    },
}

/// One UI element as reported by the helper process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Opaque reference used to address this element in later requests.
    /// Valid only until the UI changes.
    pub reference: String,

    /// Native widget class name (e.g. `android.widget.Button`).
    #[serde(rename = "class")]
    pub element_class: String,

    /// Visible text, when the element has any.
    #[serde(default)]
    pub text: Option<String>,

    /// Accessibility content description, when set.
    #[serde(default)]
    pub content_description: Option<String>,
}

/// A node of the dumped UI tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// The element at this node.
    #[serde(flatten)]
    pub element: ElementDescriptor,

    /// Child nodes in document order.
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

/// Wraps a payload with the 4-byte LE length header.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Reads the payload length from a 4-byte LE header.
pub fn read_frame_length(header: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*header)
}

/// Serializes a request into a complete frame (header included).
pub fn encode_request(request: &Request) -> Result<Vec<u8>, ProtocolError> {
    Ok(encode_frame(&serde_json::to_vec(request)?))
}

/// Deserializes a request payload (header already stripped).
pub fn decode_request(payload: &[u8]) -> Result<Request, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Serializes a response into a complete frame (header included).
pub fn encode_response(response: &Response) -> Result<Vec<u8>, ProtocolError> {
    Ok(encode_frame(&serde_json::to_vec(response)?))
}

/// Deserializes a response payload (header already stripped).
pub fn decode_response(payload: &[u8]) -> Result<Response, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}
