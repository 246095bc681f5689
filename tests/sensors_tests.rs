use predicates::prelude::*;

#[test]
fn sensors_lists_default_fleet() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("mall-traffic");
    cmd.arg("sensors");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Sensors: 4 total, 2 online, 1 warning, 1 offline"))
        .stdout(predicate::str::contains("sensor-001 | North Entrance"));
}

#[test]
fn sensors_filters_by_status() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("mall-traffic");
    cmd.args(["sensors", "--status", "offline", "--rounds", "3", "--seed", "9"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sensor-004 | South Exit | offline"))
        .stdout(predicate::str::contains("sensor-001").not());
}

#[test]
fn sensors_rejects_unknown_status() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("mall-traffic");
    cmd.args(["sensors", "--status", "broken"]);

    cmd.assert().failure();
}
