use crate::types::{ShoalError, ShoalResult};
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Product metadata file names at the root of a Sentinel-2 SAFE directory
const MANIFEST_NAMES: [&str; 2] = ["MTD_MSIL1C.xml", "MTD_MSIL2A.xml"];

/// Subset of the Sentinel-2 user product metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductManifest {
    pub product_type: Option<String>,
    pub spacecraft: Option<String>,
    pub sensing_start: Option<String>,
    pub cloud_coverage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UserProduct {
    #[serde(rename = "General_Info", alias = "n1:General_Info", default)]
    general_info: Option<GeneralInfo>,
    #[serde(
        rename = "Quality_Indicators_Info",
        alias = "n1:Quality_Indicators_Info",
        default
    )]
    quality_indicators: Option<QualityIndicators>,
}

#[derive(Debug, Deserialize)]
struct GeneralInfo {
    #[serde(rename = "Product_Info", alias = "L2A_Product_Info", default)]
    product_info: Option<ProductInfo>,
}

#[derive(Debug, Deserialize)]
struct ProductInfo {
    #[serde(rename = "PRODUCT_START_TIME", default)]
    start_time: Option<String>,
    #[serde(rename = "PRODUCT_TYPE", default)]
    product_type: Option<String>,
    #[serde(rename = "Datatake", default)]
    datatake: Option<Datatake>,
}

#[derive(Debug, Deserialize)]
struct Datatake {
    #[serde(rename = "SPACECRAFT_NAME", default)]
    spacecraft_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QualityIndicators {
    #[serde(rename = "Cloud_Coverage_Assessment", default)]
    cloud_coverage_assessment: Option<f64>,
}

/// Sentinel-2 product metadata reader
pub struct ManifestReader;

impl ManifestReader {
    /// Read the product metadata at the root of `archive_root`, `None` if the archive has none
    pub fn read<P: AsRef<Path>>(archive_root: P) -> ShoalResult<Option<ProductManifest>> {
        let root = archive_root.as_ref();
        for name in MANIFEST_NAMES {
            let path = root.join(name);
            if path.is_file() {
                log::debug!("Reading product metadata: {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                return Self::parse(&content).map(Some);
            }
        }
        Ok(None)
    }

    pub fn parse(xml_content: &str) -> ShoalResult<ProductManifest> {
        let product: UserProduct = from_str(xml_content)
            .map_err(|e| ShoalError::InvalidFormat(format!("Failed to parse product metadata: {}", e)))?;

        let info = product.general_info.and_then(|g| g.product_info);
        let (product_type, sensing_start, spacecraft) = match info {
            Some(info) => (
                info.product_type,
                info.start_time,
                info.datatake.and_then(|d| d.spacecraft_name),
            ),
            None => (None, None, None),
        };

        Ok(ProductManifest {
            product_type,
            spacecraft,
            sensing_start,
            cloud_coverage: product
                .quality_indicators
                .and_then(|q| q.cloud_coverage_assessment),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const L1C_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-1C_User_Product xmlns:n1="https://psd-14.sentinel2.eo.esa.int/PSD/User_Product_Level-1C.xsd">
  <n1:General_Info>
    <Product_Info>
      <PRODUCT_START_TIME>2019-01-05T03:21:19.024Z</PRODUCT_START_TIME>
      <PRODUCT_TYPE>S2MSI1C</PRODUCT_TYPE>
      <Datatake datatakeIdentifier="GS2B_20190105T032119_009524_N02.07">
        <SPACECRAFT_NAME>Sentinel-2B</SPACECRAFT_NAME>
      </Datatake>
    </Product_Info>
  </n1:General_Info>
  <n1:Quality_Indicators_Info>
    <Cloud_Coverage_Assessment>3.1415</Cloud_Coverage_Assessment>
  </n1:Quality_Indicators_Info>
</n1:Level-1C_User_Product>"#;

    #[test]
    fn test_parse_l1c_manifest() {
        let manifest = ManifestReader::parse(L1C_SAMPLE).unwrap();
        assert_eq!(manifest.product_type.as_deref(), Some("S2MSI1C"));
        assert_eq!(manifest.spacecraft.as_deref(), Some("Sentinel-2B"));
        assert_eq!(manifest.sensing_start.as_deref(), Some("2019-01-05T03:21:19.024Z"));
        assert_eq!(manifest.cloud_coverage, Some(3.1415));
    }

    #[test]
    fn test_read_from_archive_root() {
        let dir = TempDir::new().unwrap();
        assert!(ManifestReader::read(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join("MTD_MSIL1C.xml"), L1C_SAMPLE).unwrap();
        let manifest = ManifestReader::read(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.product_type.as_deref(), Some("S2MSI1C"));
    }

    #[test]
    fn test_malformed_manifest_is_an_error() {
        assert!(ManifestReader::parse("<unclosed").is_err());
    }
}
