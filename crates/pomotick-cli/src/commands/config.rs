use clap::Subcommand;
use pomotick_core::SettingsStore;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "timer.focusMinutes", "tick_interval_ms")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = SettingsStore::open_default()?;

    match action {
        ConfigAction::Get { key } => match store.config().get(&key) {
            Some(value) => println!("{value}"),
            None => return Err(format!("unknown key: {key}").into()),
        },
        ConfigAction::Set { key, value } => {
            store.set(&key, &value)?;
            println!("ok");
        }
        ConfigAction::List => {
            let json = serde_json::to_string_pretty(store.config())?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            store.reset()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
