use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::command::{Cli, Commands, LogFormat};
use cli::decode::cmd_decode;
use cli::index::cmd_index;
use cli::info::cmd_info;

mod cli;
mod input;
pub(crate) mod timestamp;

/// Installs the logger. With `--progress` log lines are routed through
/// `multi` so they print above the bars.
fn init_logging(cli: &Cli, multi: &MultiProgress) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(cli.loglevel.to_level_filter());

    match cli.log_format {
        LogFormat::Plain => {
            builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            builder.format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "{{\"ts\":{},\"lvl\":\"{}\",\"target\":\"{}\",\"msg\":{:?}}}",
                    buf.timestamp(),
                    record.level(),
                    record.target(),
                    record.args().to_string()
                )
            });
        }
    }

    if cli.progress {
        LogWrapper::new(multi.clone(), builder.build()).try_init()?;
    } else {
        builder.try_init()?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let multi = MultiProgress::new();
    init_logging(&cli, &multi)?;

    log::debug!(
        "{} {} (psxstr {}, {}), built {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("PSXSTR_VERSION"),
        option_env!("VERGEN_GIT_DESCRIBE").unwrap_or("unknown revision"),
        env!("BUILD_TIMESTAMP")
    );

    let pb = cli.progress.then_some(&multi);
    match cli.command {
        Commands::Index(ref args) => cmd_index(args, &cli, pb)?,
        Commands::Info(ref args) => cmd_info(args, &cli)?,
        Commands::Decode(ref args) => cmd_decode(args, &cli, pb)?,
    }

    Ok(())
}
