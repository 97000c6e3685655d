//! Run log: every line goes to stderr and to a per-run log file.

use chrono::Local;
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Writes everything to two writers
struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// Install the global logger, appending to `log_path`.
///
/// Level defaults to `info`; `RUST_LOG` overrides it.
pub fn init(log_path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let tee = Tee {
        first: io::stderr(),
        second: file,
    };

    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                Local::now().format(TIMESTAMP_FORMAT),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(tee)))
        .try_init()
        .map_err(io::Error::other)
}
