use std::process::ExitCode;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::commands::base_commands::Commands;
use crate::commands::report_format::format_sensor_table;
use crate::services::sensor_panel::SensorFleet;

pub fn sensors_command(cmd: Commands) -> ExitCode {
    let Commands::Sensors { rounds, seed, status } = cmd else {
        return ExitCode::FAILURE;
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let now = Utc::now();
    let mut fleet = SensorFleet::with_defaults(now);
    for _ in 0..rounds {
        fleet.refresh(&mut rng, now);
    }

    println!("{}", format_sensor_table(&fleet.filter(status), &fleet.stats()));
    ExitCode::SUCCESS
}
