//! Value object pairing an inbound payload with its delivery metadata

use lapin::message::Delivery;

use crate::errors::{Error, Result};

/// One inbound delivery.
///
/// A `Message` is created per delivery, decoded once, handed to the
/// consumer callback and then discarded. It only decodes the wire
/// payload; turning the text into structured data is layered above in
/// the consume loop.
#[derive(Clone, Debug)]
pub struct Message {
    /// Raw payload bytes as they came off the wire
    data: Vec<u8>,

    /// Routing key the message was published with
    routing_key: String,

    /// Broker-assigned delivery tag
    delivery_tag: u64,
}

impl Message {
    /// Build a message from raw bytes. Mostly useful for tests;
    /// inbound messages come from [`Message::from_delivery`]
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, routing_key: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            routing_key: routing_key.into(),
            delivery_tag: 0,
        }
    }

    /// Wrap a lapin delivery
    pub(crate) fn from_delivery(delivery: &Delivery) -> Self {
        Self {
            data: delivery.data.clone(),
            routing_key: delivery.routing_key.as_str().to_string(),
            delivery_tag: delivery.delivery_tag,
        }
    }

    /// Decode the payload to text.
    ///
    /// This is UTF-8 decoding only: the body of `b"{}"` is the
    /// two-character string `"{}"`, not a parsed object.
    pub fn prepare_body(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.data)?)
    }

    /// Parse the payload as JSON. Built on top of
    /// [`Message::prepare_body`]
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(self.prepare_body()?).map_err(Error::Deserialize)
    }

    /// Routing key the message was published with
    #[must_use]
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Broker-assigned delivery tag
    #[must_use]
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_body_decodes_without_parsing() -> eyre::Result<()> {
        let message = Message::new(&b"{}"[..], "dummy");
        assert_eq!(message.prepare_body()?, "{}");
        Ok(())
    }

    #[test]
    fn prepare_body_rejects_bad_utf8() {
        let message = Message::new(vec![0xff, 0xfe], "dummy");
        assert!(matches!(message.prepare_body(), Err(Error::Utf8(_))));
    }

    #[test]
    fn json_is_layered_above() -> eyre::Result<()> {
        let message = Message::new(&br#"{"message": "Hello, world!"}"#[..], "dummy");
        assert_eq!(message.json()?, json!({"message": "Hello, world!"}));
        Ok(())
    }

    #[test]
    fn json_reports_parse_failures() {
        let message = Message::new(&b"not json"[..], "dummy");
        assert!(matches!(message.json(), Err(Error::Deserialize(_))));
    }
}
