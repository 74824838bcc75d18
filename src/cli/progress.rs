use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Bar over the sectors of an image, or a spinner when the size is unknown.
pub fn create_progress_bar(
    multi: &MultiProgress,
    total_sectors: Option<u64>,
    initial_message: &'static str,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_sectors {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} sectors ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);

        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} sectors\n{msg} | elapsed: {elapsed_precise}",
        )?);

        pb
    };
    pb.set_message(initial_message);
    Ok(pb)
}

/// Final style without the ETA, keeping the bar or spinner shape.
pub fn finished_style(total_known: bool) -> ProgressStyle {
    if total_known {
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} sectors ({percent}%)\n{msg} | elapsed: {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
    } else {
        ProgressStyle::with_template("{spinner:.green} {pos} sectors\n{msg} | elapsed: {elapsed_precise}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}
