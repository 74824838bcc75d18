use anyhow::Result;
use psxstr::log_or_err;
use psxstr::process::index::Indexer;
use psxstr::structs::sector::Sector;
use psxstr::utils::errors::SectorError;

use super::command::Cli;

/// Classifies raw sectors and feeds them to an [`Indexer`].
///
/// Sectors that cannot be classified are still fed as `Other` so stream
/// sweeps see the gap.
pub struct Scanner {
    pub indexer: Indexer,
    fail_level: log::Level,
    unreadable: usize,
}

impl Scanner {
    pub fn new(cli: &Cli) -> Self {
        let mut indexer = Indexer::default();
        indexer.set_fail_level(cli.fail_level());

        Self {
            indexer,
            fail_level: cli.fail_level(),
            unreadable: 0,
        }
    }

    pub fn push_raw(&mut self, number: u32, raw: &[u8]) -> Result<()> {
        let sector = match Sector::from_raw(number, raw) {
            Ok(sector) => sector,
            Err(error) => {
                self.unreadable += 1;
                match error {
                    SectorError::SubheaderMismatch(_) => {
                        log_or_err!(self, log::Level::Warn, error)
                    }
                    // Audio tracks and unformatted areas have no Mode 2 layout.
                    _ => log_or_err!(self, log::Level::Debug, error),
                }
                Sector::other(number, None)
            }
        };

        self.indexer.push_sector(&sector)
    }

    /// Sectors that were fed as `Other` because they could not be classified.
    pub fn unreadable(&self) -> usize {
        self.unreadable
    }
}
