//! OSRM-backed travel matrix test.
//!
//! Needs Docker and a prepared Nevada extract (`nevada-latest.osrm*`, MLD)
//! in `OSRM_DATA_DIR`. Run with `cargo test -- --ignored`.

mod fixtures;

use std::env;
use std::path::PathBuf;

use testcontainers::core::{IntoContainerPort, Mount};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, GenericImage, ImageExt, ReuseDirective, TestcontainersError};

use fleet_dispatch::network::Network;
use fleet_dispatch::osrm::{OsrmClient, OsrmConfig};
use fleet_dispatch::traits::{MatrixError, TravelMatrixProvider};

use fixtures::las_vegas_locations::DEPOTS;

fn osrm_container() -> Result<(Container<GenericImage>, String), TestcontainersError> {
    let data_dir = PathBuf::from(env::var("OSRM_DATA_DIR").unwrap_or_else(|_| "osrm-data".to_string()));
    let partition = data_dir.join("nevada-latest.osrm.partition");
    let mtime = std::fs::metadata(&partition)
        .map_err(|err| TestcontainersError::other(format!("missing {}: {}", partition.display(), err)))?
        .modified()
        .ok()
        .and_then(|time| time.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs())
        .unwrap_or(0);

    let image = GenericImage::new("osrm/osrm-backend", "latest")
        .with_exposed_port(5000.tcp())
        .with_mount(Mount::bind_mount(data_dir.to_string_lossy().to_string(), "/data"))
        .with_cmd(vec!["osrm-routed", "--algorithm", "mld", "/data/nevada-latest.osrm"])
        .with_container_name(format!("osrm-nevada-mld-{}", mtime))
        .with_startup_timeout(std::time::Duration::from_secs(30))
        .with_reuse(ReuseDirective::Always);

    let container = image.start()?;
    let port = container.get_host_port_ipv4(5000.tcp())?;
    Ok((container, format!("http://127.0.0.1:{}", port)))
}

#[test]
#[ignore = "needs Docker and OSRM_DATA_DIR"]
fn osrm_table_builds_network() {
    let (container, base_url) = osrm_container().expect("start OSRM container");
    let client = OsrmClient::new(OsrmConfig {
        base_url,
        ..OsrmConfig::default()
    })
    .expect("build OSRM client");

    let locations: Vec<(f64, f64)> = DEPOTS.iter().map(|l| l.coords()).collect();

    // osrm-routed needs a moment after the container reports ready.
    let start = std::time::Instant::now();
    let matrix = loop {
        match client.matrix_for(&locations) {
            Ok(matrix) => break matrix,
            Err(MatrixError::Http(err)) if start.elapsed() < std::time::Duration::from_secs(15) => {
                eprintln!("OSRM not ready yet: {}", err);
                std::thread::sleep(std::time::Duration::from_millis(500));
            }
            Err(err) => {
                if let Ok(stderr) = container.stderr_to_vec() {
                    eprintln!("OSRM stderr:\n{}", String::from_utf8_lossy(&stderr));
                }
                panic!("OSRM table failed: {}", err);
            }
        }
    };

    assert_eq!(matrix.len(), locations.len());
    assert!(matrix.durations[0][1] > 0);
    assert!(matrix.distances[0][1] > 0.0);

    let network = Network::complete_from_matrix(&locations, &client).expect("network from OSRM");
    assert_eq!(network.vertices().len(), locations.len());
    assert_eq!(network.arcs().len(), locations.len() * (locations.len() - 1));

    drop(container);
}
