//! Method-tagged envelope codec
//!
//! An envelope is a JSON object `{ "method": <tag>, "data": <payload> }`.
//! Each protocol layer declares its request and response variants once with
//! [`rpc_protocol!`](crate::rpc_protocol), which guarantees that every
//! request tag has exactly one response variant with the same tag.
//!
//! [`call`] performs one round trip over a [`Transport`] and refuses a
//! response whose tag does not pair with the request.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{RpcError, RpcResult};

/// A value that carries a method tag
pub trait RpcMessage {
    /// The tag this value serializes under
    fn method(&self) -> &'static str;
}

/// A request variant set with its paired response set
pub trait RpcRequest: RpcMessage + Serialize + Send + Sync {
    type Response: RpcMessage + Serialize + DeserializeOwned + Send;
}

/// The single opaque round trip everything is built on
///
/// Implementations move one request envelope to the host side and return its
/// response envelope. Rejections are reported as [`RpcError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Value) -> RpcResult<Value>;
}

/// Serialize a message into its envelope
pub fn encode<M: RpcMessage + Serialize>(message: &M) -> RpcResult<Value> {
    serde_json::to_value(message).map_err(|e| RpcError::Encode(e.to_string()))
}

/// Read the method tag of an envelope
pub fn envelope_method(envelope: &Value) -> RpcResult<&str> {
    envelope
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::MalformedEnvelope(truncate_for_log(envelope)))
}

/// Decode a response envelope, checking its tag against the request tag
pub fn decode_response<R: RpcRequest>(
    expected: &'static str,
    envelope: Value,
) -> RpcResult<R::Response> {
    let actual = envelope_method(&envelope)?;
    if actual != expected {
        return Err(RpcError::MethodMismatch {
            expected,
            actual: actual.to_string(),
        });
    }
    serde_json::from_value(envelope).map_err(|e| RpcError::Decode(e.to_string()))
}

/// Decode a request envelope on the host side
pub fn decode_request<R: RpcRequest + DeserializeOwned>(envelope: Value) -> RpcResult<R> {
    envelope_method(&envelope)?;
    serde_json::from_value(envelope).map_err(|e| RpcError::Decode(e.to_string()))
}

/// Send one request and return its paired response
///
/// Exactly one round trip; no retry.
pub async fn call<R: RpcRequest>(transport: &dyn Transport, request: R) -> RpcResult<R::Response> {
    let method = request.method();
    let envelope = encode(&request)?;
    debug!(method, "Sending envelope");
    let response = transport.send(envelope).await?;
    decode_response::<R>(method, response)
}

fn truncate_for_log(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 120 {
        let mut end = 120;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("...");
    }
    text
}

/// Declare a protocol layer's request and response enums
///
/// ```ignore
/// rpc_protocol! {
///     /// Requests understood by a lamp
///     pub LampRequest => LampResponse {
///         Toggle "toggle" {} -> bool;
///         SetLevel "set_level" { level: u8 } -> ();
///     }
/// }
/// ```
#[macro_export]
macro_rules! rpc_protocol {
    (
        $(#[$meta:meta])*
        $vis:vis $req:ident => $rsp:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident $tag:literal { $($field:ident : $fty:ty),* $(,)? } -> $out:ty;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(tag = "method", content = "data")]
        $vis enum $req {
            $(
                $(#[$vmeta])*
                #[serde(rename = $tag)]
                $variant { $($field: $fty),* },
            )*
        }

        #[doc = concat!("Responses paired with [`", stringify!($req), "`]")]
        #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(tag = "method", content = "data")]
        $vis enum $rsp {
            $(
                #[serde(rename = $tag)]
                $variant($out),
            )*
        }

        impl $crate::envelope::RpcMessage for $req {
            fn method(&self) -> &'static str {
                match self {
                    $( $req::$variant { .. } => $tag, )*
                }
            }
        }

        impl $crate::envelope::RpcMessage for $rsp {
            fn method(&self) -> &'static str {
                match self {
                    $( $rsp::$variant(..) => $tag, )*
                }
            }
        }

        impl $crate::envelope::RpcRequest for $req {
            type Response = $rsp;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    rpc_protocol! {
        /// Test protocol
        pub LampRequest => LampResponse {
            Toggle "toggle" {} -> bool;
            SetLevel "set_level" { level: u8 } -> ();
        }
    }

    /// Transport that records requests and answers with a canned response
    struct Recorder {
        sent: Mutex<Vec<Value>>,
        reply: RpcResult<Value>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&self, envelope: Value) -> RpcResult<Value> {
            self.sent.lock().unwrap().push(envelope);
            self.reply.clone()
        }
    }

    fn recorder(reply: RpcResult<Value>) -> Recorder {
        Recorder {
            sent: Default::default(),
            reply,
        }
    }

    #[test]
    fn test_request_envelope_shape() {
        let envelope = encode(&LampRequest::SetLevel { level: 3 }).unwrap();
        assert_eq!(envelope, json!({"method": "set_level", "data": {"level": 3}}));
        assert_eq!(LampRequest::Toggle {}.method(), "toggle");
    }

    #[tokio::test]
    async fn test_call_unwraps_paired_response() {
        let transport = recorder(Ok(json!({"method": "toggle", "data": true})));
        let rsp = call(&transport, LampRequest::Toggle {}).await.unwrap();
        assert_eq!(rsp, LampResponse::Toggle(true));
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_call_rejects_mismatched_tag() {
        let transport = recorder(Ok(json!({"method": "set_level", "data": null})));
        let err = call(&transport, LampRequest::Toggle {}).await.unwrap_err();
        assert_eq!(
            err,
            RpcError::MethodMismatch {
                expected: "toggle",
                actual: "set_level".into()
            }
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let transport = recorder(Err(RpcError::Transport("link down".into())));
        let err = call(&transport, LampRequest::Toggle {}).await.unwrap_err();
        assert_eq!(err.to_string(), "link down");
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let transport = recorder(Ok(json!({"data": true})));
        let err = call(&transport, LampRequest::Toggle {}).await.unwrap_err();
        assert!(matches!(err, RpcError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_decode_request_wrong_shape() {
        let err = decode_request::<LampRequest>(json!({"method": "set_level", "data": {"level": "hi"}}))
            .unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));

        let err = decode_request::<LampRequest>(json!({"method": "explode", "data": {}})).unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
    }
}
