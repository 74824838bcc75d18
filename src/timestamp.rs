/// Sectors per second of a disc read at single speed.
const SECTORS_PER_SECOND: u32 = 75;

/// Formats a duration as `HH:MM:SS.mmm`.
pub fn time_str(sec: f64) -> String {
    let total_ms = (sec.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = total_ms / 60_000 % 60;
    let seconds = total_ms / 1000 % 60;
    let milliseconds = total_ms % 1000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Disc address `MM:SS:FF` of a sector counted from the start of the image.
pub fn msf_str(sector: u32) -> String {
    let frame = sector % SECTORS_PER_SECOND;
    let seconds = sector / SECTORS_PER_SECOND % 60;
    let minutes = sector / SECTORS_PER_SECOND / 60;

    format!("{minutes:02}:{seconds:02}:{frame:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations_and_addresses() {
        assert_eq!(time_str(0.0), "00:00:00.000");
        assert_eq!(time_str(3723.25), "01:02:03.250");
        assert_eq!(time_str(360_000.0), "100:00:00.000");

        assert_eq!(msf_str(0), "00:00:00");
        assert_eq!(msf_str(75 * 61 + 4), "01:01:04");
    }
}
