//! Queue service: XML message envelopes.
//!
//! Message text is sent exactly as given (XML-escaped, not base64), so
//! consumers that read raw text see the original JSON.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;

use super::{AzureBackend, Service, check, ignore_conflict};
use crate::storage::StorageError;
use crate::storage::backend::{QueueMessage, QueueStore};

#[derive(Debug, Deserialize)]
struct QueueMessagesList {
    #[serde(rename = "QueueMessage", default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMessage {
    message_id: String,
    pop_receipt: String,
    #[serde(default)]
    message_text: String,
}

fn message_envelope(text: &str) -> String {
    format!(
        "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
        quick_xml::escape::escape(text)
    )
}

fn parse_messages(xml: &str) -> Result<Option<QueueMessage>, StorageError> {
    let list: QueueMessagesList =
        quick_xml::de::from_str(xml).map_err(|e| StorageError::Xml(e.to_string()))?;
    Ok(list.messages.into_iter().next().map(|m| QueueMessage {
        id: m.message_id,
        pop_receipt: m.pop_receipt,
        text: m.message_text,
    }))
}

#[async_trait]
impl QueueStore for AzureBackend {
    async fn create_queue_if_not_exists(&self, queue: &str) -> Result<(), StorageError> {
        let url = self.resource_url(Service::Queue, &[queue])?;
        let response = self
            .send(Service::Queue, Method::PUT, url, HeaderMap::new(), Bytes::new())
            .await?;
        ignore_conflict(check(response, &format!("create queue {queue}")).await)
    }

    async fn send_message(&self, queue: &str, text: &str) -> Result<(), StorageError> {
        let url = self.resource_url(Service::Queue, &[queue, "messages"])?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        let response = self
            .send(
                Service::Queue,
                Method::POST,
                url,
                headers,
                Bytes::from(message_envelope(text)),
            )
            .await?;
        check(response, &format!("send to {queue}")).await?;
        Ok(())
    }

    async fn receive_message(&self, queue: &str) -> Result<Option<QueueMessage>, StorageError> {
        let mut url = self.resource_url(Service::Queue, &[queue, "messages"])?;
        url.query_pairs_mut().append_pair("numofmessages", "1");
        let response = self
            .send(Service::Queue, Method::GET, url, HeaderMap::new(), Bytes::new())
            .await?;
        let body = check(response, &format!("receive from {queue}"))
            .await?
            .text()
            .await?;
        parse_messages(&body)
    }

    async fn delete_message(
        &self,
        queue: &str,
        message: &QueueMessage,
    ) -> Result<(), StorageError> {
        let mut url = self.resource_url(Service::Queue, &[queue, "messages", &message.id])?;
        url.query_pairs_mut()
            .append_pair("popreceipt", &message.pop_receipt);
        let response = self
            .send(Service::Queue, Method::DELETE, url, HeaderMap::new(), Bytes::new())
            .await?;
        check(response, &format!("delete message {}", message.id)).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_escapes_text() {
        assert_eq!(
            message_envelope(r#"{"Name":"A & B <c>"}"#),
            "<QueueMessage><MessageText>{&quot;Name&quot;:&quot;A &amp; B &lt;c&gt;&quot;}</MessageText></QueueMessage>"
        );
    }

    #[test]
    fn test_parse_single_message() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<QueueMessagesList>
  <QueueMessage>
    <MessageId>5974b586-0df3-4e2d-ad0c-18e3892bfca2</MessageId>
    <InsertionTime>Fri, 09 Oct 2009 21:04:30 GMT</InsertionTime>
    <ExpirationTime>Fri, 16 Oct 2009 21:04:30 GMT</ExpirationTime>
    <PopReceipt>YzQ4Yzg1MDItYTc0Ny00OWNjLTkxYTUtZGM0MDFiZDAwYzEw</PopReceipt>
    <TimeNextVisible>Fri, 09 Oct 2009 23:29:20 GMT</TimeNextVisible>
    <DequeueCount>1</DequeueCount>
    <MessageText>{&quot;OrderId&quot;:&quot;42&quot;}</MessageText>
  </QueueMessage>
</QueueMessagesList>"#;

        let message = parse_messages(xml).unwrap().unwrap();
        assert_eq!(message.id, "5974b586-0df3-4e2d-ad0c-18e3892bfca2");
        assert_eq!(message.pop_receipt, "YzQ4Yzg1MDItYTc0Ny00OWNjLTkxYTUtZGM0MDFiZDAwYzEw");
        assert_eq!(message.text, r#"{"OrderId":"42"}"#);
    }

    #[test]
    fn test_parse_empty_queue() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?><QueueMessagesList />"#;
        assert!(parse_messages(xml).unwrap().is_none());
    }

    #[test]
    fn test_parse_garbage_is_xml_error() {
        assert!(matches!(
            parse_messages("<QueueMessagesList><QueueMessage>"),
            Err(StorageError::Xml(_))
        ));
    }
}
