//! Request signing: Shared Key, Shared Key Lite and service SAS.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha2::Sha256;
use url::Url;

use super::AZURE_API_VERSION;
use crate::storage::StorageError;

type HmacSha256 = Hmac<Sha256>;

/// Standard headers that take part in a Shared Key signature, in order.
const SIGNED_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

/// How a request is authorized.
#[derive(Clone)]
pub(crate) enum Credential {
    /// Shared Key authentication using the decoded account key.
    SharedKey { key_bytes: Vec<u8> },
    /// SAS token appended to every request URL.
    SasToken { token: String },
}

impl Credential {
    /// Append the SAS token to a URL if using SAS auth.
    pub(crate) fn maybe_append_sas(&self, url: &mut Url) {
        if let Self::SasToken { token } = self {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
                _ => token.clone(),
            };
            url.set_query(Some(&query));
        }
    }
}

/// HMAC-SHA256 a string with the account key and base64 the result.
pub(crate) fn sign(key_bytes: &[u8], string_to_sign: &str) -> Result<String, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key_bytes)
        .map_err(|e| StorageError::Signing(format!("HMAC key error: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// String-to-sign for Shared Key (blob, queue and file services).
///
/// ```text
/// VERB\n
/// Content-Encoding\n ... Range\n      (Content-Length empty when zero)
/// CanonicalizedHeaders                (x-ms-*, lowercased, sorted, one per line)
/// CanonicalizedResource               (/account/path, then \nparam:value per query key)
/// ```
pub(crate) fn shared_key_string_to_sign(
    method: &str,
    headers: &HeaderMap,
    url: &Url,
    account: &str,
) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(method);
    out.push('\n');

    for name in SIGNED_HEADERS {
        let value = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if name == "content-length" && value == "0" {
            out.push('\n');
            continue;
        }
        out.push_str(value);
        out.push('\n');
    }

    let mut ms_headers: Vec<(String, String)> = headers
        .iter()
        .filter_map(|(k, v)| {
            let name = k.as_str().to_ascii_lowercase();
            if !name.starts_with("x-ms-") {
                return None;
            }
            Some((name, v.to_str().unwrap_or_default().trim().to_owned()))
        })
        .collect();
    ms_headers.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in ms_headers {
        out.push_str(&name);
        out.push(':');
        out.push_str(&value);
        out.push('\n');
    }

    out.push_str(&canonicalized_resource(url, account));
    out
}

/// `/account/path` followed by every query parameter as `\nname:v1,v2`.
fn canonicalized_resource(url: &Url, account: &str) -> String {
    let mut resource = format!("/{account}{}", url.path());

    let mut params: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in url.query_pairs() {
        let key = key.to_ascii_lowercase();
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => params.push((key, vec![value.into_owned()])),
        }
    }
    params.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, mut values) in params {
        values.sort();
        resource.push('\n');
        resource.push_str(&key);
        resource.push(':');
        resource.push_str(&values.join(","));
    }
    resource
}

/// String-to-sign for Shared Key Lite on the table service:
/// `x-ms-date\n/account/path[?comp=value]`.
pub(crate) fn table_string_to_sign(date: &str, url: &Url, account: &str) -> String {
    let mut resource = format!("/{account}{}", url.path());
    if let Some((_, comp)) = url.query_pairs().find(|(k, _)| k == "comp") {
        resource.push_str("?comp=");
        resource.push_str(&comp);
    }
    format!("{date}\n{resource}")
}

/// Query string for a read-only blob service SAS.
pub(crate) fn blob_read_sas(
    key_bytes: &[u8],
    account: &str,
    container: &str,
    blob_name: &str,
    expiry: DateTime<Utc>,
) -> Result<String, StorageError> {
    let permissions = "r";
    let signed_expiry = expiry.to_rfc3339_opts(SecondsFormat::Secs, true);
    let resource = format!("/blob/{account}/{container}/{blob_name}");

    // Fields: sp, st, se, resource, si, sip, spr, sv, sr, snapshot, ses,
    // rscc, rscd, rsce, rscl, rsct.
    let string_to_sign = [
        permissions,
        "",
        &signed_expiry,
        &resource,
        "",
        "",
        "",
        AZURE_API_VERSION,
        "b",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
    ]
    .join("\n");
    let signature = sign(key_bytes, &string_to_sign)?;

    Ok(format!(
        "sv={AZURE_API_VERSION}&se={}&sr=b&sp={permissions}&sig={}",
        urlencoding::encode(&signed_expiry),
        urlencoding::encode(&signature)
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_shared_key_string_layout() {
        let url = Url::parse(
            "https://acct.blob.core.windows.net/uploads/file%20one.txt?restype=container&comp=list",
        )
        .unwrap();
        let h = headers(&[
            ("content-length", "11"),
            ("content-type", "text/plain"),
            ("x-ms-version", AZURE_API_VERSION),
            ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("x-ms-blob-type", "BlockBlob"),
        ]);

        let s = shared_key_string_to_sign("PUT", &h, &url, "acct");
        let expected = "PUT\n\n\n11\n\ntext/plain\n\n\n\n\n\n\n\
                        x-ms-blob-type:BlockBlob\n\
                        x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
                        x-ms-version:2023-11-03\n\
                        /acct/uploads/file%20one.txt\ncomp:list\nrestype:container";
        assert_eq!(s, expected);
    }

    #[test]
    fn test_zero_content_length_is_blank() {
        let url = Url::parse("https://acct.queue.core.windows.net/orders-queue").unwrap();
        let h = headers(&[("content-length", "0")]);
        let s = shared_key_string_to_sign("PUT", &h, &url, "acct");
        assert!(s.starts_with("PUT\n\n\n\n"));
    }

    #[test]
    fn test_emulator_resource_repeats_account() {
        let url = Url::parse("http://127.0.0.1:10000/devstoreaccount1/uploads").unwrap();
        assert_eq!(
            canonicalized_resource(&url, "devstoreaccount1"),
            "/devstoreaccount1/devstoreaccount1/uploads"
        );
    }

    #[test]
    fn test_table_string_keeps_only_comp() {
        let url = Url::parse(
            "https://acct.table.core.windows.net/Products()?NextPartitionKey=a&comp=metadata",
        )
        .unwrap();
        assert_eq!(
            table_string_to_sign("Mon, 01 Jan 2024 00:00:00 GMT", &url, "acct"),
            "Mon, 01 Jan 2024 00:00:00 GMT\n/acct/Products()?comp=metadata"
        );
    }

    #[test]
    fn test_sign_is_deterministic_base64() {
        let a = sign(b"secret", "payload").unwrap();
        let b = sign(b"secret", "payload").unwrap();
        assert_eq!(a, b);
        assert_eq!(BASE64_STANDARD.decode(&a).unwrap().len(), 32);
        assert_ne!(a, sign(b"other", "payload").unwrap());
    }

    #[test]
    fn test_blob_read_sas_fields() {
        let expiry = Utc.with_ymd_and_hms(2030, 5, 1, 12, 0, 0).unwrap();
        let sas = blob_read_sas(b"key", "acct", "product-images", "a.png", expiry).unwrap();

        assert!(sas.starts_with("sv=2023-11-03&se=2030-05-01T12%3A00%3A00Z&sr=b&sp=r&sig="));
        let sig = sas.rsplit("sig=").next().unwrap();
        let sig = urlencoding::decode(sig).unwrap();
        assert_eq!(BASE64_STANDARD.decode(sig.as_bytes()).unwrap().len(), 32);
    }

    #[test]
    fn test_sas_appended_to_existing_query() {
        let credential = Credential::SasToken {
            token: "sv=1&sig=abc".to_string(),
        };
        let mut url = Url::parse("https://a.queue.core.windows.net/q/messages?numofmessages=1").unwrap();
        credential.maybe_append_sas(&mut url);
        assert_eq!(url.query(), Some("numofmessages=1&sv=1&sig=abc"));

        let mut bare = Url::parse("https://a.queue.core.windows.net/q").unwrap();
        credential.maybe_append_sas(&mut bare);
        assert_eq!(bare.query(), Some("sv=1&sig=abc"));
    }
}
