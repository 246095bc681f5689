use assert_fs::prelude::*;
use predicates::prelude::*;
use warp::Filter;

const LISTING: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<EnumerationResults ContainerName=\"simulation-data\"><Blobs>\
<Blob><Name>simulation_2024-02-22_1708600000000.json</Name><Properties>\
<Creation-Time>Thu, 22 Feb 2024 11:00:00 GMT</Creation-Time><Content-Length>512</Content-Length>\
<Content-Type>application/json</Content-Type></Properties></Blob>\
<Blob><Name>simulation_2024-02-23_1708700000000.json</Name><Properties>\
<Creation-Time>Fri, 23 Feb 2024 15:00:00 GMT</Creation-Time><Content-Length>1024</Content-Length>\
<Content-Type>application/json</Content-Type></Properties></Blob>\
</Blobs><NextMarker /></EnumerationResults>";

const DATASET: &str = r#"[{"timestamp":"2024-02-23T15:00:00Z","category":"Exits","zone":"West","personCount":33,"weather":"Cloudy","weekday":"Friday","discountPercent":0}]"#;

#[derive(Debug)]
struct BadSignature;

impl warp::reject::Reject for BadSignature {}

async fn forbidden(rejection: warp::Rejection) -> Result<impl warp::Reply, warp::Rejection> {
    if rejection.find::<BadSignature>().is_some() {
        Ok(warp::reply::with_status(warp::reply(), warp::http::StatusCode::FORBIDDEN))
    } else {
        Err(rejection)
    }
}

/// Accepts the `sig=secret` SAS token or a `SharedKey` header for account `mall`.
fn mock_storage() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let authorized = warp::header::exact("x-ms-version", "2021-08-06")
        .and(warp::query::raw().or(warp::any().map(String::new)).unify())
        .and(warp::header::optional::<String>("authorization"))
        .and_then(|query: String, authorization: Option<String>| async move {
            let shared_key = authorization.is_some_and(|value| value.starts_with("SharedKey mall:"));
            if query.contains("sig=secret") || shared_key {
                Ok(())
            } else {
                Err(warp::reject::custom(BadSignature))
            }
        })
        .untuple_one();

    let container_exists = warp::head()
        .and(warp::path!("mall" / "simulation-data"))
        .and(authorized.clone())
        .map(warp::reply);
    let list = warp::get()
        .and(warp::path!("mall" / "simulation-data"))
        .and(authorized.clone())
        .map(|| warp::reply::with_header(LISTING, "content-type", "application/xml"));
    let blob_exists = warp::head()
        .and(warp::path!("mall" / "simulation-data" / String))
        .and(authorized.clone())
        .map(|_name: String| warp::reply());
    let download = warp::get()
        .and(warp::path!("mall" / "simulation-data" / String))
        .and(authorized)
        .map(|_name: String| warp::reply::with_header(DATASET, "content-type", "application/json"));

    container_exists
        .or(list)
        .or(blob_exists)
        .or(download)
        .recover(forbidden)
}

fn mall_traffic(addr: std::net::SocketAddr, cache: &assert_fs::TempDir) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo_bin_cmd!("mall-traffic");
    cmd.env(
        "AZURE_STORAGE_CONNECTION_STRING",
        format!("BlobEndpoint=http://{addr}/mall;SharedAccessSignature=sig=secret"),
    )
    .env_remove("MALL_TRAFFIC_STORAGE_DIR")
    .env("MALL_TRAFFIC_CACHE", cache.child("last.json").path())
    .env("MALL_TRAFFIC_LOG", "error");
    cmd
}

#[tokio::test(flavor = "multi_thread")]
async fn list_files_reads_azure_listing_newest_first() {
    let (addr, server) = warp::serve(mock_storage()).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    let cache = assert_fs::TempDir::new().unwrap();

    let output = mall_traffic(addr, &cache).arg("list-files").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let rows: Vec<&str> = stdout.lines().skip(2).collect();
    assert_eq!(
        rows,
        vec![
            "simulation_2024-02-23_1708700000000.json | 2024-02-23 15:00:00 | 1024 B",
            "simulation_2024-02-22_1708600000000.json | 2024-02-22 11:00:00 | 512 B",
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn latest_downloads_newest_azure_blob() {
    let (addr, server) = warp::serve(mock_storage()).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    let cache = assert_fs::TempDir::new().unwrap();

    mall_traffic(addr, &cache)
        .arg("latest")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Loaded 1 records from simulation_2024-02-23_1708700000000.json",
        ));
    cache
        .child("last.json")
        .assert(predicate::str::contains("\"zone\": \"West\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn account_key_connection_string_signs_requests() {
    let (addr, server) = warp::serve(mock_storage()).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    let cache = assert_fs::TempDir::new().unwrap();

    let mut cmd = mall_traffic(addr, &cache);
    cmd.env(
        "AZURE_STORAGE_CONNECTION_STRING",
        format!("BlobEndpoint=http://{addr}/mall;AccountName=mall;AccountKey=c2VjcmV0"),
    );
    cmd.arg("latest")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Loaded 1 records from simulation_2024-02-23_1708700000000.json",
        ));
}

#[test]
fn broken_connection_string_only_fails_storage_commands() {
    let cache = assert_fs::TempDir::new().unwrap();
    let mall_traffic = || {
        let mut cmd = assert_cmd::cargo_bin_cmd!("mall-traffic");
        cmd.env("AZURE_STORAGE_CONNECTION_STRING", "AccountName=mall;AccountKey=not base64!")
            .env_remove("MALL_TRAFFIC_STORAGE_DIR")
            .env("MALL_TRAFFIC_CACHE", cache.child("last.json").path())
            .env("MALL_TRAFFIC_LOG", "error");
        cmd
    };

    mall_traffic()
        .args(["generate", "-s", "09:00", "-e", "09:00", "-i", "10", "-d", "2024-02-23", "--no-upload"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 21 records from simulation"));
    mall_traffic()
        .args(["aggregate", "-g", "category"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entrance"));

    mall_traffic()
        .arg("list-files")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to configure storage"))
        .stderr(predicate::str::contains("account key is not base64"));
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_sas_token_is_reported() {
    let (addr, server) = warp::serve(mock_storage()).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    let cache = assert_fs::TempDir::new().unwrap();

    let mut cmd = mall_traffic(addr, &cache);
    cmd.env(
        "AZURE_STORAGE_CONNECTION_STRING",
        format!("BlobEndpoint=http://{addr}/mall;SharedAccessSignature=sig=wrong"),
    );
    cmd.arg("get-file")
        .args(["-n", "simulation_2024-02-23_1708700000000.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to reach storage: unauthorized"));
}
