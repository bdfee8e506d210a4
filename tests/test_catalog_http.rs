use shoal::core::{GeometryProvider, PipelineSettings, PipelineStage, YearStatus, YearlyPipeline};
use shoal::io::{
    Catalog, CatalogFilter, CatalogPolicies, CatalogQueryBuilder, ODataCatalog, QueryErrorPolicy,
};
use shoal::{LocalArchive, Mission, ShoalError};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Serves the same canned response to every connection and records request lines
struct CannedServer {
    endpoint: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    fn start(status: &str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/odata/v1/Products", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => break,
                };
                let mut reader = match stream.try_clone() {
                    Ok(s) => BufReader::new(s),
                    Err(_) => continue,
                };
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if header == "\r\n" => break,
                        Ok(_) => {}
                    }
                }
                seen.lock().unwrap().push(request_line.trim_end().to_string());
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self { endpoint, requests }
    }

    fn catalog(&self, on_error: QueryErrorPolicy) -> ODataCatalog {
        let _ = env_logger::builder().is_test(true).try_init();
        ODataCatalog::new(self.endpoint.clone(), Duration::from_secs(5))
            .unwrap()
            .with_policies(CatalogPolicies {
                on_error,
                ..CatalogPolicies::default()
            })
    }
}

fn filter(year: i32) -> CatalogFilter {
    CatalogQueryBuilder::new(Mission::Sentinel2L1C, GeometryProvider::region_of_interest())
        .build_query(year, 20.0)
        .unwrap()
}

#[test]
fn test_service_unavailable_is_empty_by_default() {
    let server = CannedServer::start("503 Service Unavailable", "maintenance window");
    let catalog = server.catalog(QueryErrorPolicy::default());

    let scenes = catalog.execute(filter(2019)).unwrap();
    assert!(scenes.is_empty());

    let response = catalog.query(filter(2019)).unwrap();
    assert!(response.scenes.is_empty());
    let reason = response.recovered.unwrap();
    assert!(reason.contains("503"), "reason was {}", reason);
    assert!(reason.contains("maintenance window"));

    let requests = server.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /odata/v1/Products?"));
}

#[test]
fn test_service_unavailable_propagates_when_asked() {
    let server = CannedServer::start("503 Service Unavailable", "");
    let catalog = server.catalog(QueryErrorPolicy::Propagate);

    match catalog.execute(filter(2019)) {
        Err(ShoalError::Transport(msg)) => assert!(msg.contains("503")),
        other => panic!("expected a transport failure, got {:?}", other),
    }
}

#[test]
fn test_non_json_body_follows_policy() {
    let server = CannedServer::start("200 OK", "<html>login required</html>");

    let response = server.catalog(QueryErrorPolicy::EmptyResult).query(filter(2018)).unwrap();
    assert!(response.scenes.is_empty());
    assert!(response.recovered.unwrap().contains("not valid JSON"));

    let propagated = server.catalog(QueryErrorPolicy::Propagate).execute(filter(2018));
    assert!(matches!(propagated, Err(ShoalError::InvalidFormat(_))));
}

#[test]
fn test_successful_response_is_parsed() {
    let body = r#"{"value": [
        {"Id": "a", "Name": "S2A_MSIL1C_20190105T032119_N0207_R118_T48PVS_20190105T070221.SAFE",
         "ContentDate": {"Start": "2019-01-05T03:21:19.024Z"},
         "Attributes": [{"Name": "cloudCover", "Value": 3.5}]}
    ]}"#;
    let server = CannedServer::start("200 OK", body);

    let response = server.catalog(QueryErrorPolicy::default()).query(filter(2019)).unwrap();
    assert!(response.recovered.is_none());
    assert_eq!(response.scenes.len(), 1);
    assert_eq!(response.scenes[0].cloud_cover, 3.5);
}

#[test]
fn test_unreachable_year_reports_catalog_failure() {
    let server = CannedServer::start("503 Service Unavailable", "try again later");
    let catalog = server.catalog(QueryErrorPolicy::default());
    let acquirer = LocalArchive::new(Mission::Sentinel2L1C);
    let dir = TempDir::new().unwrap();
    let settings = PipelineSettings {
        region: GeometryProvider::region_of_interest(),
        mission: Mission::Sentinel2L1C,
        cloud_cover_ceiling: 20.0,
        output_root: dir.path().to_path_buf(),
        strict: false,
    };

    let pipeline = YearlyPipeline::new(settings, &catalog, &acquirer).unwrap();
    let report = pipeline.run_year(2019).unwrap();

    assert_eq!(report.year, 2019);
    assert_eq!(report.status, YearStatus::Skipped);
    assert_eq!(report.stage, PipelineStage::Querying);
    let reason = report.reason.unwrap();
    assert!(reason.contains("catalog query failed"), "reason was {}", reason);
    assert!(reason.contains("503"));
    assert_ne!(reason, ShoalError::NotFound.to_string());
}
