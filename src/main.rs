use anyhow::{anyhow, Result};
use psdump::{init_tracing_once, RedditDumps, Sources, YearMonth};
use std::path::Path;

const CONFIG_FILE: &str = "local_config.json";

fn parse_ym(s: &str) -> Result<YearMonth> {
    s.parse::<YearMonth>().map_err(|e| anyhow!("{s}: {e}"))
}

fn main() -> Result<()> {
    init_tracing_once();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (sub, since, until) = match args.as_slice() {
        [sub, since] => (sub, parse_ym(since)?, None),
        [sub, since, until] => (sub, parse_ym(since)?, Some(parse_ym(until)?)),
        _ => return Err(anyhow!("usage: psdump <subreddit> <since YYYY-MM> [until YYYY-MM]")),
    };

    let dumps = RedditDumps::from_config_file(Path::new(CONFIG_FILE))?
        .subreddit(sub)
        .sources(Sources::Both)
        .date_range(Some(since), until)
        .progress(true);

    let extracted = dumps.extract_range()?;
    let split = dumps.split_range()?;

    let failed = extracted.failed.len() + split.failed.len();
    println!(
        "{} periods extracted, {} periods split, {} failures",
        extracted.done.len(),
        split.done.len(),
        failed
    );
    Ok(())
}
