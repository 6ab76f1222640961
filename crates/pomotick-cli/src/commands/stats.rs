use chrono::Local;
use clap::Subcommand;
use pomotick_core::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Focus sessions finished today
    Today,
    /// Focus sessions over the last N local days, today included
    Range {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::Today => {
            let summary = db.today_summary(Local::now())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        StatsAction::Range { days } => {
            let summary = db.range_summary(days, Local::now())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
