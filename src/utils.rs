use chrono::{Local, NaiveDate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Today's date as used in output file names
pub fn run_date() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

/// `{dir}/{shop}_{date}.csv`
pub fn listing_csv_path(dir: &Path, shop: &str, date: &str) -> PathBuf {
    dir.join(format!("{shop}_{date}.csv"))
}

/// `{dir}/log_{shop}_{date}.log`
pub fn listing_log_path(dir: &Path, shop: &str, date: &str) -> PathBuf {
    dir.join(format!("log_{shop}_{date}.log"))
}

/// `{dir}/tech_details_{shop}_{date}.csv`
pub fn tech_details_csv_path(dir: &Path, shop: &str, date: &str) -> PathBuf {
    dir.join(format!("tech_details_{shop}_{date}.csv"))
}

/// `{dir}/log_tech_details_{shop}_{date}.log`
pub fn tech_details_log_path(dir: &Path, shop: &str, date: &str) -> PathBuf {
    dir.join(format!("log_tech_details_{shop}_{date}.log"))
}

/// Date encoded in a listing file name, `None` for any other file
fn listing_date(file_name: &str, shop: &str) -> Option<NaiveDate> {
    let date = file_name
        .strip_prefix(shop)?
        .strip_prefix('_')?
        .strip_suffix(".csv")?;
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

/// Most recent `{shop}_{date}.csv` in `dir`, by the date in its name
pub fn latest_listing_csv(dir: &Path, shop: &str) -> io::Result<Option<PathBuf>> {
    let mut latest: Option<(NaiveDate, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(date) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| listing_date(name, shop))
        else {
            continue;
        };
        if latest.as_ref().is_none_or(|(newest, _)| date > *newest) {
            latest = Some((date, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}
