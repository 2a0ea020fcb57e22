//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `duty_roster_core` linkage.
//! - Given a database path, print this week's schedule per duty type.
//!
//! Usage: `duty_roster_cli [db_path [config_path]]`

use chrono::Local;
use duty_roster_core::{
    load_config, open_db, DutyType, RosterConfig, RosterService, SqliteDutyRepository,
    SqliteMemberRepository,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("duty_roster_core ping={}", duty_roster_core::ping());
    println!("duty_roster_core version={}", duty_roster_core::core_version());

    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next() else {
        return ExitCode::SUCCESS;
    };
    let config_path = args.next();

    match print_week(&db_path, config_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_week module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_week(db_path: &str, config_path: Option<&str>) -> Result<(), Box<dyn Error>> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => RosterConfig::default(),
    };
    let conn = open_db(db_path)?;
    let roster = RosterService::new(
        &config,
        SqliteMemberRepository::new(&conn),
        SqliteDutyRepository::new(&conn),
    );

    let today = Local::now().date_naive();
    for kind in DutyType::ALL {
        let week = roster.week_schedule(kind, today)?;
        let due = roster.members_due(kind)?;
        println!("[{kind}] duties={} members_due={}", week.duty_count(), due.len());
        for day in &week.days {
            for duty in &day.duties {
                println!(
                    "  {} {} ({})",
                    day.date.format("%a %m-%d"),
                    duty.name,
                    duty.assigned.join(", ")
                );
            }
        }
    }
    Ok(())
}
