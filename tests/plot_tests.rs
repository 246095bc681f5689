use assert_fs::prelude::*;
use predicates::prelude::*;
use std::fs;

const DATASET: &str = "timestamp,category,zone,personCount,weather,weekday,discountPercent\n\
2024-02-23T09:00:00Z,Entrance,North,40,Sunny,Friday,0\n\
2024-02-23T13:00:00Z,Restaurants,RestaurantA,75,Rainy,Friday,0\n\
2024-02-23T18:00:00Z,Cinema,CinemaChainB,62,Rainy,Sunday,20\n";

#[tokio::test]
async fn plot_creates_png_from_input_file() {
    let input_file = assert_fs::NamedTempFile::new("day.csv").unwrap();
    input_file.write_str(DATASET).unwrap();
    let output_file = assert_fs::NamedTempFile::new("hours.png").unwrap();

    let input_arg = input_file.path().to_str().unwrap().to_string();
    let output_arg = output_file.path().to_str().unwrap().to_string();

    let mut cmd = assert_cmd::cargo_bin_cmd!("mall-traffic");
    cmd.env("MALL_TRAFFIC_LOG", "error")
        .args(["plot", "-i", &input_arg, "-g", "hour", "-o", &output_arg]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Chart written to"));

    let metadata = fs::metadata(output_arg).unwrap();
    assert!(metadata.len() > 0);
}

#[tokio::test]
async fn plot_fails_when_filters_leave_nothing() {
    let input_file = assert_fs::NamedTempFile::new("day.csv").unwrap();
    input_file.write_str(DATASET).unwrap();
    let output_file = assert_fs::NamedTempFile::new("empty.png").unwrap();

    let mut cmd = assert_cmd::cargo_bin_cmd!("mall-traffic");
    cmd.env("MALL_TRAFFIC_LOG", "error").args([
        "plot",
        "-i",
        input_file.path().to_str().unwrap(),
        "-g",
        "zone",
        "--weather",
        "Cloudy",
        "-o",
        output_file.path().to_str().unwrap(),
    ]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no data to chart"));
    output_file.assert(predicate::path::missing());
}

#[test]
fn aggregate_reads_input_file_by_weekday() {
    let input_file = assert_fs::NamedTempFile::new("day.csv").unwrap();
    input_file.write_str(DATASET).unwrap();

    let mut cmd = assert_cmd::cargo_bin_cmd!("mall-traffic");
    cmd.env("MALL_TRAFFIC_LOG", "error").args([
        "aggregate",
        "-i",
        input_file.path().to_str().unwrap(),
        "-g",
        "weekday",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Friday  | 115"))
        .stdout(predicate::str::contains("Sunday  | 62"))
        .stdout(predicate::str::contains("Total   | 177"));
}
