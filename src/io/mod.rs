//! I/O modules for catalog queries, archives and rasters

pub mod catalog;
pub mod acquisition;
pub mod archive;
pub mod manifest;
pub mod raster;

pub use catalog::{
    Catalog, CatalogFilter, CatalogPolicies, CatalogQueryBuilder, CatalogResponse, ODataCatalog,
    QueryErrorPolicy,
};
pub use acquisition::{ArchiveAcquirer, LocalArchive};
pub use archive::{ArchiveLocator, BandPatterns, BandPaths};
pub use manifest::{ManifestReader, ProductManifest};
pub use raster::RasterIo;
