use crate::types::{
    Mission, RegionOfInterest, SceneCollection, SceneRecord, ShoalError, ShoalResult, TimeWindow,
};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

/// Copernicus Data Space OData product endpoint
pub const DEFAULT_CATALOG_URL: &str = "https://catalogue.dataspace.copernicus.eu/odata/v1/Products";

/// Results per query; no further pages are requested
pub const PAGE_SIZE: usize = 50;

pub const DEFAULT_CLOUD_COVER_CEILING: f64 = 20.0;

/// Cloud cover assigned to scenes whose catalog entry has no `cloudCover` attribute
pub const UNKNOWN_CLOUD_COVER: f64 = 100.0;

const ISO_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Filter predicate for one catalog query
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogFilter {
    pub collection: String,
    pub product_type: String,
    pub window: TimeWindow,
    pub cloud_cover_ceiling: f64,
    pub region: RegionOfInterest,
}

impl CatalogFilter {
    /// OData `$filter` expression
    pub fn expression(&self) -> String {
        format!(
            "Collection/Name eq '{}' and \
             Attributes/OData.CSC.StringAttribute/any(att:att/Name eq 'productType' and att/OData.CSC.StringAttribute/Value eq '{}') and \
             ContentDate/Start ge {} and \
             ContentDate/Start le {} and \
             Attributes/OData.CSC.DoubleAttribute/any(att:att/Name eq 'cloudCover' and att/OData.CSC.DoubleAttribute/Value le {}) and \
             OData.CSC.Intersects(area=geography'SRID=4326;{}')",
            self.collection,
            self.product_type,
            self.window.start_instant().format(ISO_MILLIS),
            self.window.end_instant().format(ISO_MILLIS),
            self.cloud_cover_ceiling,
            self.region.to_wkt(),
        )
    }

    /// Full query URL against `endpoint`
    pub fn query_url(&self, endpoint: &str) -> ShoalResult<Url> {
        let raw = format!(
            "{}?$filter={}&$expand=Assets&$expand=Attributes&$orderby=ContentDate/Start desc&$top={}",
            endpoint.trim_end_matches('/'),
            self.expression(),
            PAGE_SIZE
        );
        Url::parse(&raw)
            .map_err(|e| ShoalError::Config(format!("Invalid catalog endpoint {}: {}", endpoint, e)))
    }
}

/// Builds yearly catalog filters for one mission and region
#[derive(Debug, Clone)]
pub struct CatalogQueryBuilder {
    mission: Mission,
    region: RegionOfInterest,
}

impl CatalogQueryBuilder {
    pub fn new(mission: Mission, region: RegionOfInterest) -> Self {
        Self { mission, region }
    }

    /// Filter covering Jan 1 - Dec 31 of `year` with cloud cover at most `cloud_cover_ceiling`
    pub fn build_query(&self, year: i32, cloud_cover_ceiling: f64) -> ShoalResult<CatalogFilter> {
        if !(0.0..=100.0).contains(&cloud_cover_ceiling) {
            return Err(ShoalError::InvalidInput(format!(
                "Cloud cover ceiling must be within 0-100, got {}",
                cloud_cover_ceiling
            )));
        }

        Ok(CatalogFilter {
            collection: self.mission.collection().to_string(),
            product_type: self.mission.product_type().to_string(),
            window: TimeWindow::calendar_year(year)?,
            cloud_cover_ceiling,
            region: self.region.clone(),
        })
    }
}

/// What a failed query turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryErrorPolicy {
    /// Log the failure and report no scenes
    #[default]
    EmptyResult,
    /// Hand the error to the caller
    Propagate,
}

impl QueryErrorPolicy {
    fn recover(&self, year: i32, error: ShoalError) -> ShoalResult<CatalogResponse> {
        match self {
            QueryErrorPolicy::EmptyResult => {
                log::error!("{}: catalog query failed, treating as no scenes: {}", year, error);
                Ok(CatalogResponse {
                    scenes: Vec::new(),
                    recovered: Some(error.to_string()),
                })
            }
            QueryErrorPolicy::Propagate => Err(error),
        }
    }
}

/// Policies applied while querying and parsing catalog responses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogPolicies {
    pub unknown_cloud_cover: f64,
    pub on_error: QueryErrorPolicy,
}

impl Default for CatalogPolicies {
    fn default() -> Self {
        Self {
            unknown_cloud_cover: UNKNOWN_CLOUD_COVER,
            on_error: QueryErrorPolicy::EmptyResult,
        }
    }
}

/// Scenes returned by one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogResponse {
    pub scenes: SceneCollection,
    /// Failure the error policy turned into this empty result
    pub recovered: Option<String>,
}

/// Source of scene candidates
pub trait Catalog: Send + Sync {
    /// Run one query; the filter is consumed
    fn execute(&self, filter: CatalogFilter) -> ShoalResult<SceneCollection>;

    /// Like `execute`, but keeps the reason when a failure was recovered as no scenes
    fn query(&self, filter: CatalogFilter) -> ShoalResult<CatalogResponse> {
        Ok(CatalogResponse {
            scenes: self.execute(filter)?,
            recovered: None,
        })
    }
}

/// OData catalog reached over HTTP
pub struct ODataCatalog {
    endpoint: String,
    client: reqwest::blocking::Client,
    policies: CatalogPolicies,
}

impl ODataCatalog {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> ShoalResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShoalError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
            policies: CatalogPolicies::default(),
        })
    }

    pub fn with_policies(mut self, policies: CatalogPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Single blocking round trip returning the response body
    fn fetch(&self, filter: &CatalogFilter) -> ShoalResult<String> {
        let url = filter.query_url(&self.endpoint)?;
        log::info!(
            "Querying {} {} scenes for {} (cloud cover <= {}%)",
            filter.collection,
            filter.product_type,
            filter.window.year(),
            filter.cloud_cover_ceiling
        );
        log::debug!("Catalog URL: {}", url);

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let excerpt: String = body.chars().take(300).collect();
            return Err(ShoalError::Transport(format!(
                "HTTP {} from catalog: {}",
                status, excerpt
            )));
        }

        Ok(response.text()?)
    }
}

impl Catalog for ODataCatalog {
    fn execute(&self, filter: CatalogFilter) -> ShoalResult<SceneCollection> {
        self.query(filter).map(|response| response.scenes)
    }

    fn query(&self, filter: CatalogFilter) -> ShoalResult<CatalogResponse> {
        let year = filter.window.year();
        let outcome = self
            .fetch(&filter)
            .and_then(|body| parse_products(&body, self.policies.unknown_cloud_cover));

        match outcome {
            Ok(scenes) => {
                log::info!("{}: catalog returned {} scene(s)", year, scenes.len());
                Ok(CatalogResponse {
                    scenes,
                    recovered: None,
                })
            }
            Err(e) => self.policies.on_error.recover(year, e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProductPage {
    #[serde(default)]
    value: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(rename = "Id", default)]
    id: Option<String>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "ContentDate", default)]
    content_date: Option<ContentDate>,
    #[serde(rename = "Assets", default)]
    assets: Vec<Asset>,
    #[serde(rename = "Attributes", default)]
    attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
struct ContentDate {
    #[serde(rename = "Start", default)]
    start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    #[serde(rename = "DownloadLink", default)]
    download_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attribute {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: serde_json::Value,
}

/// Parse an OData product page into scene records, keeping response order
pub fn parse_products(body: &str, unknown_cloud_cover: f64) -> ShoalResult<SceneCollection> {
    let page: ProductPage = serde_json::from_str(body)?;
    let mut scenes = Vec::with_capacity(page.value.len());

    for product in page.value {
        let name = match product.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                log::warn!("Skipping catalog item without a name (id {:?})", product.id);
                continue;
            }
        };

        let cloud_cover = product
            .attributes
            .iter()
            .find(|att| att.name == "cloudCover")
            .and_then(|att| attribute_as_f64(&att.value))
            .unwrap_or(unknown_cloud_cover);

        let acquired = product
            .content_date
            .and_then(|cd| cd.start)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        scenes.push(SceneRecord {
            id: product.id.unwrap_or_default(),
            name,
            cloud_cover,
            download_link: product.assets.first().and_then(|a| a.download_link.clone()),
            acquired,
        });
    }

    Ok(scenes)
}

fn attribute_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
