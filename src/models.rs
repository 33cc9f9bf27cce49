use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AmazonError;

/// Kind of identifier handed to an item lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdType {
    #[default]
    Asin,
    Upc,
    Ean,
    Isbn,
    Sku,
}

impl IdType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdType::Asin => "ASIN",
            IdType::Upc => "UPC",
            IdType::Ean => "EAN",
            IdType::Isbn => "ISBN",
            IdType::Sku => "SKU",
        }
    }

    /// Search index the catalog requires alongside a non-ASIN `IdType`.
    pub fn search_index(self) -> Option<&'static str> {
        match self {
            IdType::Asin => None,
            IdType::Isbn => Some("Books"),
            _ => Some("All"),
        }
    }
}

impl FromStr for IdType {
    type Err = AmazonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASIN" => Ok(IdType::Asin),
            "UPC" => Ok(IdType::Upc),
            "EAN" => Ok(IdType::Ean),
            "ISBN" => Ok(IdType::Isbn),
            "SKU" => Ok(IdType::Sku),
            other => Err(AmazonError::Validation(format!("unknown id type {other:?}"))),
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image rendition (e.g. `SmallImage`) of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub size: String,
    pub url: String,
    pub height: u32,
    pub width: u32,
}

/// Group of renditions; the catalog marks the main picture set as `primary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    pub category: String,
    pub images: Vec<Image>,
}

impl ImageSet {
    pub fn is_primary(&self) -> bool {
        self.category.eq_ignore_ascii_case("primary")
    }
}

/// Normalized catalog item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub asin: String,
    pub detail_page_url: Option<String>,
    pub title: Option<String>,
    pub upc: Option<String>,
    pub upc_list: Vec<String>,
    pub ean: Option<String>,
    pub ean_list: Vec<String>,
    pub isbn: Option<String>,
    pub brand: Option<String>,
    pub manufacturer: Option<String>,
    pub product_group: Option<String>,
    pub image_sets: Vec<ImageSet>,
}

impl ItemRecord {
    pub fn primary_images(&self) -> impl Iterator<Item = &Image> {
        self.image_sets
            .iter()
            .filter(|set| set.is_primary())
            .flat_map(|set| set.images.iter())
    }

    /// Primary UPC followed by the UPC list, without repeats.
    pub fn all_upcs(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for upc in self.upc.iter().chain(self.upc_list.iter()) {
            let upc = upc.trim();
            if !upc.is_empty() && !out.iter().any(|u| u == upc) {
                out.push(upc.to_string());
            }
        }
        out
    }
}

/// Persisted UPC -> ASIN mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub upc: String,
    pub asin: String,
}

/// Persisted image row, unique per (asin, size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImageMetadata {
    pub asin: String,
    pub size: String,
    pub height: i64,
    pub width: i64,
    pub url: String,
}

impl ImageMetadata {
    pub fn from_image(asin: &str, image: &Image) -> Self {
        Self {
            asin: asin.to_string(),
            size: image.size.clone(),
            height: i64::from(image.height),
            width: i64::from(image.width),
            url: image.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSeller {
    pub asin: String,
    pub title: Option<String>,
}

/// Category metadata returned by a browse-node lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseNode {
    pub id: String,
    pub name: Option<String>,
    pub children: Vec<BrowseNode>,
    pub ancestors: Vec<BrowseNode>,
    pub top_sellers: Vec<TopSeller>,
}
