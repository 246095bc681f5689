use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::domain::bucket::{AggregatedBucket, RecordFilters};
use crate::domain::record::SimulationRecord;
use crate::domain::sensor::{Sensor, SensorStats, SensorStatus};
use crate::services::aggregation::{FilterField, aggregate_by_name, distinct_values};
use crate::services::dataset_service::{DatasetService, GenerateSimulationRequest, ServiceError};
use crate::services::sensor_panel::{NewSensor, SensorError, SensorFleet};

pub type SharedFleet = Arc<Mutex<SensorFleet>>;

const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    success: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FileQuery {
    file_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DeleteDataQuery {
    delete_all: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SensorQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignalRequest {
    signal: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregateRequest {
    records: Vec<SimulationRecord>,
    group_by: String,
    #[serde(default)]
    filters: RecordFilters,
}

/// Values present in the posted records, for populating filter selectors.
#[derive(Debug, Serialize)]
struct FilterOptions {
    categories: Vec<String>,
    weekdays: Vec<String>,
    weathers: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateResponse {
    buckets: Vec<AggregatedBucket>,
    filter_options: FilterOptions,
}

#[derive(Debug, Serialize)]
struct SensorListResponse<'a> {
    sensors: Vec<&'a Sensor>,
    stats: SensorStats,
}

pub fn routes(
    service: Arc<DatasetService>,
    fleet: SharedFleet,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let with_service = warp::any().map(move || service.clone());
    let with_fleet = warp::any().map(move || fleet.clone());

    let generate_route = warp::path!("api" / "generate-simulation")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service.clone())
        .and_then(generate_simulation);
    let upload_route = warp::path!("api" / "upload")
        .and(warp::post())
        .and(warp::query::<FileQuery>())
        .and(warp::body::content_length_limit(MAX_UPLOAD_BYTES))
        .and(warp::body::bytes())
        .and(with_service.clone())
        .and_then(upload_file);
    let list_files_route = warp::path!("api" / "files")
        .and(warp::get())
        .and(with_service.clone())
        .and_then(list_files);
    let get_file_route = warp::path!("api" / "file")
        .and(warp::get())
        .and(warp::query::<FileQuery>())
        .and(with_service.clone())
        .and_then(get_file);
    let delete_file_route = warp::path!("api" / "file")
        .and(warp::delete())
        .and(warp::query::<FileQuery>())
        .and(with_service.clone())
        .and_then(delete_file);
    let delete_data_route = warp::path!("api" / "data")
        .and(warp::delete())
        .and(warp::query::<DeleteDataQuery>())
        .and(with_service)
        .and_then(delete_data);
    let aggregate_route = warp::path!("api" / "aggregate")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(aggregate);

    let list_sensors_route = warp::path!("api" / "sensors")
        .and(warp::get())
        .and(warp::query::<SensorQuery>())
        .and(with_fleet.clone())
        .and_then(list_sensors);
    let add_sensor_route = warp::path!("api" / "sensors")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_fleet.clone())
        .and_then(add_sensor);
    let refresh_sensors_route = warp::path!("api" / "sensors" / "refresh")
        .and(warp::post())
        .and(with_fleet.clone())
        .and_then(refresh_sensors);
    let toggle_sensor_route = warp::path!("api" / "sensors" / String / "toggle")
        .and(warp::post())
        .and(with_fleet.clone())
        .and_then(toggle_sensor);
    let adjust_signal_route = warp::path!("api" / "sensors" / String / "signal")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_fleet.clone())
        .and_then(adjust_signal);
    let remove_sensor_route = warp::path!("api" / "sensors" / String)
        .and(warp::delete())
        .and(with_fleet)
        .and_then(remove_sensor);

    generate_route
        .or(upload_route)
        .or(list_files_route)
        .or(get_file_route)
        .or(delete_file_route)
        .or(delete_data_route)
        .or(aggregate_route)
        .or(refresh_sensors_route)
        .or(toggle_sensor_route)
        .or(adjust_signal_route)
        .or(list_sensors_route)
        .or(add_sensor_route)
        .or(remove_sensor_route)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

/// Serves the API on `addr` until ctrl-c.
pub async fn serve(addr: SocketAddr, service: Arc<DatasetService>, fleet: SharedFleet) -> Result<(), warp::Error> {
    let (bound, server) = warp::serve(routes(service, fleet)).try_bind_with_graceful_shutdown(addr, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for shutdown signal");
        }
    })?;
    tracing::info!(address = %bound, "dashboard api listening");
    server.await;
    tracing::info!("dashboard api stopped");
    Ok(())
}

fn json_reply<T: Serialize>(result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => warp::reply::json(&body).into_response(),
        Err(err) => error_reply(err.status_code(), &err.to_string()),
    }
}

fn error_reply(status: u16, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorBody {
        message,
        success: false,
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn sensor_error_reply(err: SensorError) -> Response {
    let status = match err {
        SensorError::NotFound(_) => 404,
        SensorError::MissingField | SensorError::InvalidSignal(_) => 400,
        SensorError::Full(_) => 409,
    };
    error_reply(status, &err.to_string())
}

async fn generate_simulation(
    request: GenerateSimulationRequest,
    service: Arc<DatasetService>,
) -> Result<Response, Infallible> {
    Ok(json_reply(service.generate_simulation(request).await))
}

async fn upload_file(query: FileQuery, body: Bytes, service: Arc<DatasetService>) -> Result<Response, Infallible> {
    Ok(json_reply(service.upload_file(&query.file_name, body.to_vec()).await))
}

async fn list_files(service: Arc<DatasetService>) -> Result<Response, Infallible> {
    Ok(json_reply(service.list_files().await))
}

async fn get_file(query: FileQuery, service: Arc<DatasetService>) -> Result<Response, Infallible> {
    Ok(json_reply(service.get_file(&query.file_name).await))
}

async fn delete_file(query: FileQuery, service: Arc<DatasetService>) -> Result<Response, Infallible> {
    Ok(json_reply(service.delete_file(&query.file_name).await))
}

async fn delete_data(query: DeleteDataQuery, service: Arc<DatasetService>) -> Result<Response, Infallible> {
    let delete_all = query.delete_all.as_deref() == Some("true");
    Ok(json_reply(service.delete_data(delete_all).await))
}

async fn aggregate(request: AggregateRequest) -> Result<Response, Infallible> {
    let records = &request.records;
    let body = AggregateResponse {
        buckets: aggregate_by_name(records, &request.group_by, &request.filters),
        filter_options: FilterOptions {
            categories: distinct_values(records, FilterField::Category),
            weekdays: distinct_values(records, FilterField::Weekday),
            weathers: distinct_values(records, FilterField::Weather),
        },
    };
    Ok(warp::reply::json(&body).into_response())
}

async fn list_sensors(query: SensorQuery, fleet: SharedFleet) -> Result<Response, Infallible> {
    let status = match query.status.as_deref() {
        None | Some("all") => None,
        Some(value) => match value.parse::<SensorStatus>() {
            Ok(status) => Some(status),
            Err(_) => return Ok(error_reply(400, &format!("unknown sensor status: {value}"))),
        },
    };
    let fleet = fleet.lock().await;
    let body = SensorListResponse {
        sensors: fleet.filter(status),
        stats: fleet.stats(),
    };
    Ok(warp::reply::json(&body).into_response())
}

async fn add_sensor(new_sensor: NewSensor, fleet: SharedFleet) -> Result<Response, Infallible> {
    let mut fleet = fleet.lock().await;
    let mut rng = StdRng::from_entropy();
    Ok(match fleet.add(new_sensor, &mut rng, Utc::now()) {
        Ok(sensor) => warp::reply::with_status(warp::reply::json(sensor), StatusCode::CREATED).into_response(),
        Err(err) => sensor_error_reply(err),
    })
}

async fn refresh_sensors(fleet: SharedFleet) -> Result<Response, Infallible> {
    let mut fleet = fleet.lock().await;
    let mut rng = StdRng::from_entropy();
    fleet.refresh(&mut rng, Utc::now());
    let body = SensorListResponse {
        sensors: fleet.sensors().iter().collect(),
        stats: fleet.stats(),
    };
    Ok(warp::reply::json(&body).into_response())
}

async fn toggle_sensor(id: String, fleet: SharedFleet) -> Result<Response, Infallible> {
    let mut fleet = fleet.lock().await;
    Ok(match fleet.toggle(&id, Utc::now()) {
        Ok(sensor) => warp::reply::json(sensor).into_response(),
        Err(err) => sensor_error_reply(err),
    })
}

async fn adjust_signal(id: String, request: SignalRequest, fleet: SharedFleet) -> Result<Response, Infallible> {
    let mut fleet = fleet.lock().await;
    Ok(match fleet.adjust_signal(&id, request.signal, Utc::now()) {
        Ok(sensor) => warp::reply::json(sensor).into_response(),
        Err(err) => sensor_error_reply(err),
    })
}

async fn remove_sensor(id: String, fleet: SharedFleet) -> Result<Response, Infallible> {
    let mut fleet = fleet.lock().await;
    Ok(match fleet.remove(&id) {
        Ok(sensor) => warp::reply::json(&sensor).into_response(),
        Err(err) => sensor_error_reply(err),
    })
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (404, "route not found".to_string())
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (400, format!("invalid request body: {err}"))
    } else if let Some(err) = rejection.find::<warp::reject::InvalidQuery>() {
        (400, err.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (413, "payload too large".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (405, "method not allowed".to_string())
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        (500, "internal error".to_string())
    };
    Ok(error_reply(status, &message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use serde_json::{Value, json};

    fn api(service: DatasetService) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        let fleet = Arc::new(Mutex::new(SensorFleet::with_defaults(at("2024-02-23T12:00:00Z"))));
        routes(Arc::new(service), fleet)
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn generate_simulation_returns_records() {
        let api = api(DatasetService::new(None));

        let response = warp::test::request()
            .method("POST")
            .path("/api/generate-simulation")
            .json(&json!({
                "startTime": "09:00",
                "endTime": "09:00",
                "timeInterval": "10",
                "simulationDate": "2024-02-23",
                "useCustomFactors": false
            }))
            .reply(&api)
            .await;

        assert_eq!(response.status(), 200);
        let body = body_json(response.body());
        assert_eq!(body["recordCount"], 21);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["category"], "Entrance");
        assert!(body["data"][0]["timestamp"].as_str().unwrap().starts_with("2024-02-23T09:00:00"));
    }

    #[tokio::test]
    async fn generate_simulation_rejects_missing_parameters() {
        let api = api(DatasetService::new(None));

        let response = warp::test::request()
            .method("POST")
            .path("/api/generate-simulation")
            .json(&json!({ "startTime": "09:00" }))
            .reply(&api)
            .await;

        assert_eq!(response.status(), 400);
        let body = body_json(response.body());
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "missing required parameters");
    }

    #[tokio::test]
    async fn file_routes_map_service_errors() {
        let api = api(DatasetService::new(None));

        let response = warp::test::request().path("/api/files").reply(&api).await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response.body()), json!({ "files": [] }));

        let response = warp::test::request().path("/api/file").reply(&api).await;
        assert_eq!(response.status(), 400);

        let response = warp::test::request()
            .path("/api/file?fileName=day.json")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 404);

        let response = warp::test::request()
            .method("DELETE")
            .path("/api/data")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 400);

        let response = warp::test::request()
            .method("POST")
            .path("/api/upload?fileName=day.json")
            .body("[]")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn upload_then_fetch_through_local_storage() {
        let root = assert_fs::TempDir::new().unwrap();
        let store = crate::services::local_blob::LocalBlobStore::new(root.path(), "simulation-data");
        let api = api(DatasetService::new(Some(Arc::new(store))));
        let records = json!([{
            "timestamp": "2024-02-23T09:00:00Z",
            "category": "Stores",
            "zone": "StoreA",
            "personCount": 12,
            "weather": "Sunny",
            "weekday": "Friday",
            "discountPercent": 0
        }]);

        let response = warp::test::request()
            .method("POST")
            .path("/api/upload?fileName=day.json")
            .body(records.to_string())
            .reply(&api)
            .await;
        assert_eq!(response.status(), 200);
        let blob_name = body_json(response.body())["blobName"].as_str().unwrap().to_string();

        let response = warp::test::request()
            .path(&format!("/api/file?fileName={blob_name}"))
            .reply(&api)
            .await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response.body())[0]["zone"], "StoreA");

        let response = warp::test::request()
            .method("DELETE")
            .path("/api/data?deleteAll=true")
            .reply(&api)
            .await;
        assert_eq!(body_json(response.body())["deletedCount"], 1);
    }

    #[tokio::test]
    async fn aggregate_groups_posted_records() {
        let api = api(DatasetService::new(None));
        let record = |category: &str, zone: &str, count: u32| {
            json!({
                "timestamp": "2024-02-23T13:00:00Z",
                "category": category,
                "zone": zone,
                "personCount": count,
                "weather": "Sunny",
                "weekday": "Friday",
                "discountPercent": 0
            })
        };

        let response = warp::test::request()
            .method("POST")
            .path("/api/aggregate")
            .json(&json!({
                "records": [record("Cinema", "CinemaChainA", 10), record("Cinema", "CinemaChainB", 5), record("Stores", "StoreA", 7)],
                "groupBy": "category",
                "filters": { "category": "Cinema" }
            }))
            .reply(&api)
            .await;

        assert_eq!(response.status(), 200);
        let body = body_json(response.body());
        assert_eq!(body["buckets"], json!([{ "label": "Cinema", "total": 15 }]));
        assert_eq!(body["filterOptions"]["categories"], json!(["Cinema", "Stores"]));
        assert_eq!(body["filterOptions"]["weathers"], json!(["Sunny"]));
    }

    #[tokio::test]
    async fn sensor_routes_filter_and_refresh() {
        let api = api(DatasetService::new(None));

        let response = warp::test::request()
            .path("/api/sensors?status=offline")
            .reply(&api)
            .await;
        let body = body_json(response.body());
        assert_eq!(body["sensors"].as_array().unwrap().len(), 1);
        assert_eq!(body["stats"]["total"], 4);

        let response = warp::test::request()
            .path("/api/sensors?status=broken")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 400);

        let response = warp::test::request()
            .method("POST")
            .path("/api/sensors/refresh")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 200);
        let body = body_json(response.body());
        assert_eq!(body["sensors"].as_array().unwrap().len(), 4);
        assert_eq!(body["stats"]["offline"], 1);
    }

    #[tokio::test]
    async fn sensor_routes_edit_the_fleet() {
        let api = api(DatasetService::new(None));

        let response = warp::test::request()
            .method("POST")
            .path("/api/sensors")
            .json(&json!({ "name": "Atrium", "location": "Level 2" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), 201);

        let response = warp::test::request()
            .method("POST")
            .path("/api/sensors")
            .json(&json!({ "name": "Atrium" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), 400);

        let response = warp::test::request()
            .method("POST")
            .path("/api/sensors/sensor-004/toggle")
            .reply(&api)
            .await;
        assert_eq!(body_json(response.body())["status"], "online");

        let response = warp::test::request()
            .method("PUT")
            .path("/api/sensors/sensor-001/signal")
            .json(&json!({ "signal": 0 }))
            .reply(&api)
            .await;
        assert_eq!(body_json(response.body())["status"], "offline");

        let response = warp::test::request()
            .method("DELETE")
            .path("/api/sensors/sensor-002")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 200);

        let response = warp::test::request()
            .method("DELETE")
            .path("/api/sensors/sensor-002")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn adding_to_a_full_fleet_is_a_conflict() {
        let template = SensorFleet::with_defaults(at("2024-02-23T12:00:00Z")).sensors()[0].clone();
        let sensors = (0..1000)
            .map(|number| Sensor {
                id: format!("sensor-{number:03}"),
                ..template.clone()
            })
            .collect();
        let fleet = Arc::new(Mutex::new(SensorFleet::new(sensors)));
        let api = routes(Arc::new(DatasetService::new(None)), fleet);

        let response = warp::test::request()
            .method("POST")
            .path("/api/sensors")
            .json(&json!({ "name": "Atrium", "location": "Level 2" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), 409);
        assert_eq!(body_json(response.body())["message"], "all 1000 sensor ids are in use");

        let response = warp::test::request().path("/api/sensors").reply(&api).await;
        assert_eq!(body_json(response.body())["stats"]["total"], 1000);
    }
}
