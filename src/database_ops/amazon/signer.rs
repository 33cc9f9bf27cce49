//! Product Advertising API request signing.
//!
//! Requests are plain `GET`s whose query string carries an HMAC-SHA256
//! signature over the canonical (sorted, RFC 3986 encoded) parameter list:
//!
//! ```text
//! GET\n<host>\n<path>\n<canonical query>
//! ```
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::AmazonSettings;

pub const SERVICE: &str = "AWSECommerceService";
pub const API_VERSION: &str = "2013-08-01";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret: String,
    associate_tag: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("associate_tag", &self.associate_tag)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(access_key: &str, secret: &str, associate_tag: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret: secret.to_string(),
            associate_tag: associate_tag.to_string(),
        }
    }

    pub fn from_settings(settings: &AmazonSettings) -> Self {
        Self::new(
            &settings.credentials.access_key,
            &settings.credentials.access_secret,
            &settings.associates_id,
        )
    }

    /// Adds the common parameters and returns the full signed query string
    /// (without the leading `?`).
    pub fn signed_query(
        &self,
        host: &str,
        path: &str,
        operation_params: &[(&str, String)],
        timestamp: DateTime<Utc>,
    ) -> String {
        let mut params: Vec<(String, String)> = vec![
            ("Service".into(), SERVICE.into()),
            ("AWSAccessKeyId".into(), self.access_key.clone()),
            ("AssociateTag".into(), self.associate_tag.clone()),
            ("Version".into(), API_VERSION.into()),
            ("Timestamp".into(), format_timestamp(timestamp)),
        ];
        params.extend(
            operation_params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone())),
        );

        let canonical = canonical_query(&params);
        let signature = self.signature(host, path, &canonical);
        format!("{canonical}&Signature={}", urlencoding::encode(&signature))
    }

    /// Base64 HMAC-SHA256 of the string to sign.
    pub fn signature(&self, host: &str, path: &str, canonical: &str) -> String {
        let string_to_sign = format!("GET\n{}\n{}\n{}", host.to_ascii_lowercase(), path, canonical);
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            unreachable!("HMAC accepts keys of any length");
        };
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// Encode every pair per RFC 3986, sort by key then value, join with `&`.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
