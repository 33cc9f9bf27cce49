use chrono::Utc;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use super::response::{parse_browse_node, parse_error, parse_items};
use super::signer::RequestSigner;
use super::throttle::{RateLimitSettings, RequestThrottle};
use crate::config::{AmazonSettings, ConfigProvider};
use crate::error::{AmazonError, RemoteError, Result};
use crate::models::{BrowseNode, IdType, ItemRecord};

/// The catalog refuses more than this many ids in one `ItemLookup`.
pub const MAX_ITEMS_PER_REQUEST: usize = 10;

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Product Advertising API client.
///
/// Key operations:
/// - `ItemLookup` (batched, up to 10 ids per call)
/// - `SimilarityLookup`
/// - `BrowseNodeLookup`
///
/// Every call is signed with the configured credentials and paced by a
/// [`RequestThrottle`]; calls are issued one at a time.
#[derive(Debug, Clone)]
pub struct AmazonProvider {
    http: Client,
    endpoint: Url,
    host: String,
    signer: RequestSigner,
    throttle: RequestThrottle,
}

impl AmazonProvider {
    pub fn new(settings: &AmazonSettings) -> Result<Self> {
        let endpoint = Url::parse(&settings.endpoint).map_err(|e| {
            AmazonError::Configuration(format!("invalid endpoint {:?}: {e}", settings.endpoint))
        })?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(h), Some(port)) => format!("{h}:{port}"),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(AmazonError::Configuration(format!(
                    "endpoint {:?} has no host",
                    settings.endpoint
                )))
            }
        };
        let http = Client::builder()
            .user_agent(concat!("amazon-lookup/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            host,
            signer: RequestSigner::from_settings(settings),
            throttle: RequestThrottle::new(RateLimitSettings::from_settings(settings)),
        })
    }

    /// Resolve settings from `config`; fails if credentials are absent.
    pub fn from_config(config: &dyn ConfigProvider) -> Result<Self> {
        Self::new(&AmazonSettings::from_config(config)?)
    }

    /// Sign and send one operation, returning the raw XML body.
    async fn execute(&self, operation: &str, params: Vec<(&str, String)>) -> Result<String> {
        let mut all_params = vec![("Operation", operation.to_string())];
        all_params.extend(params);

        let query = self
            .signer
            .signed_query(&self.host, self.endpoint.path(), &all_params, Utc::now());
        let mut url = self.endpoint.clone();
        url.set_query(Some(&query));

        self.throttle.wait().await;
        debug!(operation, host = %self.host, "amazon: sending request");
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            if let Some((code, message)) = parse_error(&body) {
                return Err(RemoteError::Api { code, message }.into());
            }
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: truncate_for_log(body, 2000),
            }
            .into());
        }
        Ok(body)
    }

    /// Look up items by id. Ids are sent in batches of [`MAX_ITEMS_PER_REQUEST`]
    /// and the results of every batch are returned in request order.
    #[instrument(skip(self, ids), fields(count = ids.len(), id_type = %id_type))]
    pub async fn lookup<S: AsRef<str>>(
        &self,
        ids: &[S],
        id_type: IdType,
    ) -> Result<Vec<ItemRecord>> {
        if ids.is_empty() {
            return Err(AmazonError::Validation(
                "lookup called without anything to look up".into(),
            ));
        }
        let ids: Vec<&str> = ids.iter().map(|s| s.as_ref().trim()).collect();
        if ids.iter().any(|s| s.is_empty()) {
            return Err(AmazonError::Validation("lookup called with a blank id".into()));
        }

        let mut results = Vec::new();
        for batch in ids.chunks(MAX_ITEMS_PER_REQUEST) {
            let mut params = vec![
                ("ItemId", batch.join(",")),
                ("ResponseGroup", "Large".to_string()),
            ];
            if id_type != IdType::Asin {
                params.push(("IdType", id_type.as_str().to_string()));
            }
            if let Some(index) = id_type.search_index() {
                params.push(("SearchIndex", index.to_string()));
            }
            let body = self.execute("ItemLookup", params).await?;
            let items = parse_items(&body)?;
            debug!(batch = batch.len(), found = items.len(), "amazon: lookup batch done");
            results.extend(items);
        }
        Ok(results)
    }

    /// Items the catalog considers similar to `asin`.
    #[instrument(skip(self))]
    pub async fn similarity_lookup(&self, asin: &str) -> Result<Vec<ItemRecord>> {
        let asin = asin.trim();
        if asin.is_empty() {
            return Err(AmazonError::Validation(
                "similarity lookup called without an item id".into(),
            ));
        }
        let params = vec![
            ("ItemId", asin.to_string()),
            ("ResponseGroup", "Large".to_string()),
        ];
        let body = self.execute("SimilarityLookup", params).await?;
        parse_items(&body)
    }

    /// Category metadata for `node_id`. Remote failures are logged and yield
    /// `None`; only an empty node id is an error.
    #[instrument(skip(self))]
    pub async fn browse_node_lookup(&self, node_id: &str) -> Result<Option<BrowseNode>> {
        let node_id = node_id.trim();
        if node_id.is_empty() {
            return Err(AmazonError::Validation(
                "browse node lookup called without a node id".into(),
            ));
        }
        let params = vec![
            ("BrowseNodeId", node_id.to_string()),
            ("ResponseGroup", "BrowseNodeInfo,TopSellers".to_string()),
        ];
        match self
            .execute("BrowseNodeLookup", params)
            .await
            .and_then(|body| parse_browse_node(&body))
        {
            Ok(node) => Ok(node),
            Err(e) => {
                warn!(node_id, error = %e, "amazon: browse node lookup failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        StaticConfig, ACCESS_KEY, ACCESS_SECRET, ASSOCIATES_ID, ENDPOINT, MAX_OPS_PER_WINDOW,
    };
    use crate::database_ops::amazon::response::fixtures::*;
    use httpmock::prelude::*;

    fn provider_for(server: &MockServer) -> AmazonProvider {
        let cfg = StaticConfig::new()
            .with(ACCESS_KEY, "AKIAEXAMPLE")
            .with(ACCESS_SECRET, "secret")
            .with(ASSOCIATES_ID, "tag-20")
            .with(ENDPOINT, server.url("/onca/xml"))
            .with(MAX_OPS_PER_WINDOW, "0");
        AmazonProvider::from_config(&cfg).unwrap()
    }

    #[test]
    fn construction_requires_credentials() {
        let err = AmazonProvider::from_config(&StaticConfig::new()).unwrap_err();
        assert!(matches!(err, AmazonError::Configuration(_)));
    }

    #[test]
    fn truncates_on_char_boundary() {
        let out = truncate_for_log("ééé".to_string(), 3);
        assert_eq!(out, "é…");
    }

    #[tokio::test]
    async fn batches_lookups_by_ten() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/onca/xml")
                    .query_param("Operation", "ItemLookup")
                    .query_param("IdType", "UPC")
                    .query_param("SearchIndex", "All")
                    .query_param_exists("Signature");
                then.status(200).body(items_response(
                    "ItemLookupResponse",
                    &[item_xml("B0001", &["111"])],
                ));
            })
            .await;

        let provider = provider_for(&server);
        let ids: Vec<String> = (0..25).map(|i| format!("{i:012}")).collect();
        let items = provider.lookup(ids.as_slice(), IdType::Upc).await.unwrap();

        assert_eq!(mock.hits_async().await, 3);
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn asin_lookup_omits_id_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .query_param("Operation", "ItemLookup")
                    .query_param("ItemId", "B0001,B0002")
                    .query_param("ResponseGroup", "Large")
                    .query_param("AssociateTag", "tag-20");
                then.status(200).body(items_response(
                    "ItemLookupResponse",
                    &[item_xml("B0001", &[]), item_xml("B0002", &[])],
                ));
            })
            .await;

        let provider = provider_for(&server);
        let items = provider.lookup(&["B0001", "B0002"], IdType::Asin).await.unwrap();
        assert_eq!(items.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_lookup_is_validation_error() {
        let server = MockServer::start_async().await;
        let provider = provider_for(&server);
        let none: [&str; 0] = [];
        let err = provider.lookup(&none, IdType::Asin).await.unwrap_err();
        assert!(matches!(err, AmazonError::Validation(_)));

        let err = provider.lookup(&["B0001", " "], IdType::Asin).await.unwrap_err();
        assert!(matches!(err, AmazonError::Validation(_)));
    }

    #[tokio::test]
    async fn error_envelope_becomes_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(403).body(SIGNATURE_ERROR);
            })
            .await;

        let provider = provider_for(&server);
        let err = provider.lookup(&["B0001"], IdType::Asin).await.unwrap_err();
        assert!(matches!(
            err,
            AmazonError::Remote(RemoteError::Api { ref code, .. }) if code == "SignatureDoesNotMatch"
        ));
    }

    #[tokio::test]
    async fn plain_http_failure_becomes_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(503).body("service unavailable");
            })
            .await;

        let provider = provider_for(&server);
        let err = provider.similarity_lookup("B0001").await.unwrap_err();
        assert!(matches!(
            err,
            AmazonError::Remote(RemoteError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn similarity_lookup_returns_items() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .query_param("Operation", "SimilarityLookup")
                    .query_param("ItemId", "B0001");
                then.status(200).body(items_response(
                    "SimilarityLookupResponse",
                    &[item_xml("B0009", &["999"])],
                ));
            })
            .await;

        let provider = provider_for(&server);
        let items = provider.similarity_lookup("B0001").await.unwrap();
        assert_eq!(items[0].asin, "B0009");
    }

    #[tokio::test]
    async fn browse_node_lookup_degrades_to_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).query_param("Operation", "BrowseNodeLookup");
                then.status(500).body("boom");
            })
            .await;

        let provider = provider_for(&server);
        assert_eq!(provider.browse_node_lookup("165793011").await.unwrap(), None);
        assert!(provider.browse_node_lookup("").await.is_err());
    }

    #[tokio::test]
    async fn browse_node_lookup_parses_node() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .query_param("Operation", "BrowseNodeLookup")
                    .query_param("BrowseNodeId", "165793011")
                    .query_param("ResponseGroup", "BrowseNodeInfo,TopSellers");
                then.status(200).body(BROWSE_NODE);
            })
            .await;

        let provider = provider_for(&server);
        let node = provider.browse_node_lookup("165793011").await.unwrap().unwrap();
        assert_eq!(node.top_sellers.len(), 2);
    }
}
