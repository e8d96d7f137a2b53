#![warn(clippy::pedantic)]

pub mod cli;
pub mod settings;

use anyhow::Result as AnyResult;
use settings::Settings;

fn main() -> AnyResult<()> {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .init();
    } else {
        let _ = simple_logging::log_to_file("log.out", log::LevelFilter::Debug);
    }

    let command = cli::Command::parse(std::env::args_os().skip(1))?;

    let loaded = Settings::get();
    if loaded.missing {
        // Leave a commented template for the user to find.
        if let Err(e) = loaded.settings.save() {
            log::warn!("Failed to save default settings:\n{e:?}");
        }
    }
    let settings = loaded.settings;

    // Only ever one document in flight, nothing to gain from more threads.
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    runtime.block_on(async {
        match command {
            cli::Command::Inspect(paths) => cli::inspect(&paths).await,
            cli::Command::Convert {
                input,
                output,
                target,
            } => {
                let target = cli::resolve_target(target, &output, settings.version);
                cli::convert(&input, &output, target, &settings.encode_settings()).await
            }
        }
    })
}
