//! Typed decoding of catalog XML payloads.
//!
//! `ItemLookup` and `SimilarityLookup` share the `<Items>` envelope; the raw
//! serde shapes below mirror the wire markup and are flattened into
//! [`ItemRecord`] / [`BrowseNode`] right away.
use serde::Deserialize;
use tracing::warn;

use crate::error::{AmazonError, RemoteError};
use crate::models::{BrowseNode, Image, ImageSet, ItemRecord, TopSeller};

/// Request-level error codes that only mean "nothing matched".
const NO_MATCH_CODES: [&str; 3] = [
    "AWS.ECommerceService.NoExactMatches",
    "AWS.ECommerceService.NoSimilarities",
    "AWS.InvalidParameterValue",
];

#[derive(Debug, Deserialize)]
struct RawItemsResponse {
    #[serde(rename = "Items")]
    items: Option<RawItems>,
}

#[derive(Debug, Deserialize)]
struct RawItems {
    #[serde(rename = "Request")]
    request: Option<RawRequest>,
    #[serde(rename = "Item", default)]
    item: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(rename = "Errors")]
    errors: Option<RawErrors>,
}

#[derive(Debug, Deserialize)]
struct RawErrors {
    #[serde(rename = "Error", default)]
    error: Vec<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawErrorResponse {
    #[serde(rename = "Error")]
    error: Option<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "ASIN")]
    asin: String,
    #[serde(rename = "DetailPageURL")]
    detail_page_url: Option<String>,
    #[serde(rename = "ImageSets")]
    image_sets: Option<RawImageSets>,
    #[serde(rename = "ItemAttributes")]
    attributes: Option<RawAttributes>,
}

#[derive(Debug, Deserialize)]
struct RawImageSets {
    #[serde(rename = "ImageSet", default)]
    sets: Vec<RawImageSet>,
}

#[derive(Debug, Deserialize)]
struct RawImageSet {
    #[serde(rename = "@Category", default)]
    category: String,
    #[serde(rename = "SwatchImage")]
    swatch: Option<RawImage>,
    #[serde(rename = "SmallImage")]
    small: Option<RawImage>,
    #[serde(rename = "ThumbnailImage")]
    thumbnail: Option<RawImage>,
    #[serde(rename = "TinyImage")]
    tiny: Option<RawImage>,
    #[serde(rename = "MediumImage")]
    medium: Option<RawImage>,
    #[serde(rename = "LargeImage")]
    large: Option<RawImage>,
    #[serde(rename = "HiResImage")]
    hi_res: Option<RawImage>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(rename = "Height")]
    height: Option<RawDimension>,
    #[serde(rename = "Width")]
    width: Option<RawDimension>,
}

/// `<Height Units="pixels">75</Height>`
#[derive(Debug, Deserialize)]
struct RawDimension {
    #[serde(rename = "$text", default)]
    value: u32,
}

#[derive(Debug, Deserialize)]
struct RawAttributes {
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "UPC")]
    upc: Option<String>,
    #[serde(rename = "UPCList")]
    upc_list: Option<RawUpcList>,
    #[serde(rename = "EAN")]
    ean: Option<String>,
    #[serde(rename = "EANList")]
    ean_list: Option<RawEanList>,
    #[serde(rename = "ISBN")]
    isbn: Option<String>,
    #[serde(rename = "Brand")]
    brand: Option<String>,
    #[serde(rename = "Manufacturer")]
    manufacturer: Option<String>,
    #[serde(rename = "ProductGroup")]
    product_group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUpcList {
    #[serde(rename = "UPCListElement", default)]
    elements: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawEanList {
    #[serde(rename = "EANListElement", default)]
    elements: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawBrowseNodeResponse {
    #[serde(rename = "BrowseNodes")]
    nodes: Option<RawBrowseNodes>,
}

#[derive(Debug, Deserialize)]
struct RawBrowseNodes {
    #[serde(rename = "Request")]
    request: Option<RawRequest>,
    #[serde(rename = "BrowseNode", default)]
    node: Vec<RawBrowseNode>,
}

#[derive(Debug, Deserialize)]
struct RawBrowseNode {
    #[serde(rename = "BrowseNodeId", default)]
    id: String,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Children")]
    children: Option<RawBrowseNodeList>,
    #[serde(rename = "Ancestors")]
    ancestors: Option<RawBrowseNodeList>,
    #[serde(rename = "TopSellers")]
    top_sellers: Option<RawTopSellers>,
}

#[derive(Debug, Deserialize)]
struct RawBrowseNodeList {
    #[serde(rename = "BrowseNode", default)]
    node: Vec<RawBrowseNode>,
}

#[derive(Debug, Deserialize)]
struct RawTopSellers {
    #[serde(rename = "TopSeller", default)]
    seller: Vec<RawTopSeller>,
}

#[derive(Debug, Deserialize)]
struct RawTopSeller {
    #[serde(rename = "ASIN", default)]
    asin: String,
    #[serde(rename = "Title")]
    title: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl RawImage {
    fn into_image(self, size: &str) -> Option<Image> {
        let url = self.url.trim().to_string();
        if url.is_empty() {
            return None;
        }
        Some(Image {
            size: size.to_string(),
            url,
            height: self.height.map(|d| d.value).unwrap_or_default(),
            width: self.width.map(|d| d.value).unwrap_or_default(),
        })
    }
}

impl From<RawImageSet> for ImageSet {
    fn from(raw: RawImageSet) -> Self {
        let sizes = [
            ("SwatchImage", raw.swatch),
            ("SmallImage", raw.small),
            ("ThumbnailImage", raw.thumbnail),
            ("TinyImage", raw.tiny),
            ("MediumImage", raw.medium),
            ("LargeImage", raw.large),
            ("HiResImage", raw.hi_res),
        ];
        let images = sizes
            .into_iter()
            .filter_map(|(size, img)| img.and_then(|i| i.into_image(size)))
            .collect();
        ImageSet {
            category: raw.category,
            images,
        }
    }
}

impl From<RawItem> for ItemRecord {
    fn from(raw: RawItem) -> Self {
        let mut record = ItemRecord {
            asin: raw.asin.trim().to_string(),
            detail_page_url: non_blank(raw.detail_page_url),
            image_sets: raw
                .image_sets
                .map(|s| s.sets.into_iter().map(ImageSet::from).collect())
                .unwrap_or_default(),
            ..Default::default()
        };
        if let Some(attrs) = raw.attributes {
            record.title = non_blank(attrs.title);
            record.upc = non_blank(attrs.upc);
            record.upc_list = attrs.upc_list.map(|l| l.elements).unwrap_or_default();
            record.ean = non_blank(attrs.ean);
            record.ean_list = attrs.ean_list.map(|l| l.elements).unwrap_or_default();
            record.isbn = non_blank(attrs.isbn);
            record.brand = non_blank(attrs.brand);
            record.manufacturer = non_blank(attrs.manufacturer);
            record.product_group = non_blank(attrs.product_group);
        }
        record
    }
}

impl From<RawBrowseNode> for BrowseNode {
    fn from(raw: RawBrowseNode) -> Self {
        let convert = |list: Option<RawBrowseNodeList>| -> Vec<BrowseNode> {
            list.map(|l| l.node.into_iter().map(BrowseNode::from).collect())
                .unwrap_or_default()
        };
        BrowseNode {
            id: raw.id.trim().to_string(),
            name: non_blank(raw.name),
            children: convert(raw.children),
            ancestors: convert(raw.ancestors),
            top_sellers: raw
                .top_sellers
                .map(|t| {
                    t.seller
                        .into_iter()
                        .map(|s| TopSeller {
                            asin: s.asin.trim().to_string(),
                            title: non_blank(s.title),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Turn request-level errors into a result. With no results, a "no match"
/// code is an empty answer and anything else is an API failure.
fn check_request_errors(request: Option<RawRequest>, have_results: bool) -> Result<(), AmazonError> {
    let errors = request
        .and_then(|r| r.errors)
        .map(|e| e.error)
        .unwrap_or_default();
    if errors.is_empty() {
        return Ok(());
    }
    if have_results {
        for e in &errors {
            warn!(code = %e.code, message = %e.message, "catalog reported partial errors");
        }
        return Ok(());
    }
    match errors
        .into_iter()
        .find(|e| !NO_MATCH_CODES.contains(&e.code.as_str()))
    {
        Some(e) => Err(RemoteError::Api {
            code: e.code,
            message: e.message,
        }
        .into()),
        None => Ok(()),
    }
}

/// Decode an `ItemLookupResponse` or `SimilarityLookupResponse`.
pub fn parse_items(xml: &str) -> Result<Vec<ItemRecord>, AmazonError> {
    let raw: RawItemsResponse = quick_xml::de::from_str(xml).map_err(RemoteError::Parse)?;
    let Some(items) = raw.items else {
        return Ok(Vec::new());
    };
    check_request_errors(items.request, !items.item.is_empty())?;
    Ok(items
        .item
        .into_iter()
        .map(ItemRecord::from)
        .filter(|r| !r.asin.is_empty())
        .collect())
}

/// Decode a `BrowseNodeLookupResponse`; returns the first node.
pub fn parse_browse_node(xml: &str) -> Result<Option<BrowseNode>, AmazonError> {
    let raw: RawBrowseNodeResponse = quick_xml::de::from_str(xml).map_err(RemoteError::Parse)?;
    let Some(nodes) = raw.nodes else {
        return Ok(None);
    };
    check_request_errors(nodes.request, !nodes.node.is_empty())?;
    Ok(nodes.node.into_iter().next().map(BrowseNode::from))
}

/// Extract `(code, message)` from an `...ErrorResponse` body.
pub fn parse_error(xml: &str) -> Option<(String, String)> {
    let raw: RawErrorResponse = quick_xml::de::from_str(xml).ok()?;
    raw.error
        .filter(|e| !e.code.trim().is_empty())
        .map(|e| (e.code, e.message))
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn parses_items_with_images_and_upcs() {
        let xml = items_response(
            "ItemLookupResponse",
            &[item_xml("B0001", &["111", "222"]), item_xml("B0002", &["333"])],
        );
        let items = parse_items(&xml).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.asin, "B0001");
        assert_eq!(first.title.as_deref(), Some("Widget B0001 & Friends"));
        assert_eq!(first.upc.as_deref(), Some("111"));
        assert_eq!(first.upc_list, vec!["111".to_string(), "222".to_string()]);
        assert_eq!(first.brand.as_deref(), Some("Acme"));
        assert_eq!(first.image_sets.len(), 2);

        let primary: Vec<_> = first.primary_images().collect();
        assert_eq!(primary.len(), 2);
        assert_eq!(primary[0].size, "SwatchImage");
        assert_eq!(primary[0].height, 30);
        assert_eq!(primary[0].width, 24);
        assert_eq!(primary[1].size, "LargeImage");
        assert_eq!(primary[1].url, "https://images.example/B0001-l.jpg");
    }

    #[test]
    fn no_match_errors_yield_empty_result() {
        let xml = request_error_response("AWS.ECommerceService.NoExactMatches");
        assert!(parse_items(&xml).unwrap().is_empty());

        let xml = request_error_response("AWS.InvalidParameterValue");
        assert!(parse_items(&xml).unwrap().is_empty());
    }

    #[test]
    fn item_without_similarities_is_empty() {
        let xml = request_error_response("AWS.ECommerceService.NoSimilarities");
        assert!(parse_items(&xml).unwrap().is_empty());
    }

    #[test]
    fn other_request_errors_are_api_failures() {
        let xml = request_error_response("AWS.RequestThrottled");
        let err = parse_items(&xml).unwrap_err();
        assert!(matches!(
            err,
            AmazonError::Remote(RemoteError::Api { ref code, .. }) if code == "AWS.RequestThrottled"
        ));
    }

    #[test]
    fn malformed_xml_is_parse_error() {
        let err = parse_items("<ItemLookupResponse><Items><Item>").unwrap_err();
        assert!(matches!(err, AmazonError::Remote(RemoteError::Parse(_))));
    }

    #[test]
    fn parses_error_envelope() {
        let (code, message) = parse_error(SIGNATURE_ERROR).unwrap();
        assert_eq!(code, "SignatureDoesNotMatch");
        assert!(message.contains("does not match"));
        assert!(parse_error("not xml at all <").is_none());
    }

    #[test]
    fn parses_browse_node_tree() {
        let node = parse_browse_node(BROWSE_NODE).unwrap().unwrap();
        assert_eq!(node.id, "165793011");
        assert_eq!(node.name.as_deref(), Some("Toys & Games"));
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[1].name.as_deref(), Some("Puzzles"));
        assert_eq!(node.ancestors[0].id, "165795011");
        assert_eq!(node.top_sellers.len(), 2);
        assert_eq!(node.top_sellers[0].asin, "B00000IZJB");
    }
}
