use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::Result;
use psxstr::structs::sector::SECTOR_SIZE;

/// Sector reader over a raw disc image, from a file or a pipe.
pub struct DiscReader {
    reader: Box<dyn Read>,
    is_pipe: bool,
}

impl DiscReader {
    /// Create a new DiscReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path_str = input_path.as_ref().to_string_lossy();
        let is_pipe = path_str == "-";

        let reader: Box<dyn Read> = if is_pipe {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(input_path)?;
            let len = file.metadata()?.len();
            if len % SECTOR_SIZE as u64 != 0 {
                log::warn!(
                    "Image size {len} is not a multiple of {SECTOR_SIZE}, the trailing {} bytes are ignored",
                    len % SECTOR_SIZE as u64
                );
            }
            Box::new(BufReader::new(file))
        };

        Ok(Self { reader, is_pipe })
    }

    /// Whole sectors in the image at `input_path`, unknown for pipes.
    pub fn image_sectors<P: AsRef<Path>>(input_path: P) -> Option<u64> {
        let path = input_path.as_ref();
        if path.to_string_lossy() == "-" {
            return None;
        }
        std::fs::metadata(path)
            .ok()
            .map(|meta| meta.len() / SECTOR_SIZE as u64)
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Fills `buffer` with the next sector. Returns false at the end of input;
    /// a partial sector at the end is dropped.
    fn read_sector(&mut self, buffer: &mut [u8; SECTOR_SIZE]) -> Result<bool> {
        let mut filled = 0;
        while filled < SECTOR_SIZE {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled != 0 && filled != SECTOR_SIZE && self.is_pipe {
            log::warn!("Input ended inside a sector, dropping {filled} bytes");
        }
        Ok(filled == SECTOR_SIZE)
    }

    /// Process the image sector by sector using a callback function
    /// The callback receives the sector number and its raw bytes and should
    /// return Ok(true) to continue or Ok(false) to stop
    pub fn process_sectors<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(u32, &[u8]) -> Result<bool>,
    {
        let mut buffer = [0u8; SECTOR_SIZE];
        let mut number = 0u32;

        while self.read_sector(&mut buffer)? {
            if !callback(number, &buffer)? {
                break; // Callback requested stop
            }
            number += 1;
        }

        Ok(())
    }
}
