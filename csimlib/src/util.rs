use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use regex::Regex;
use crate::config::{CacheConfig, RawCacheConfig};

/// Where the bundled traces and their expected results live
pub const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");

pub struct TestCasePaths {
    pub config: CacheConfig,
    pub trace: PathBuf,
    pub output: PathBuf,
}

/// Finds every `expected-<trace>-s<s>E<E>b<b>.json` file in `directory`, pairing it with
/// `<trace>.trace` and the configuration encoded in its name. Sorted by file name
pub fn get_cases_in(directory: &Path) -> Result<Vec<TestCasePaths>, Box<dyn Error>> {
    let output_pattern = Regex::new(r"^expected-(?P<trace>[0-9a-zA-Z_]+)-s(?P<s>\d+)E(?P<e>\d+)b(?P<b>\d+)\.json$")?;
    let mut file_names = fs::read_dir(directory)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(|name| name.into_string().ok())
        .filter(|name| output_pattern.is_match(name))
        .collect::<Vec<_>>();
    file_names.sort();
    let mut out = Vec::new();
    for file_name in file_names {
        let tokens = output_pattern.captures(&file_name).ok_or("Couldn't parse the file name")?;
        let number = |group: &str| -> Result<i64, Box<dyn Error>> {
            Ok(tokens.name(group).ok_or(format!("No {group} in {file_name}"))?.as_str().parse()?)
        };
        let config = CacheConfig::try_from(RawCacheConfig::new(number("s")?, number("e")?, number("b")?))?;
        let trace = &tokens["trace"];
        out.push(TestCasePaths {
            config,
            trace: directory.join(format!("{trace}.trace")),
            output: directory.join(&file_name),
        })
    }
    Ok(out)
}

/// [`get_cases_in`] for the bundled fixtures
pub fn get_cases() -> Result<Vec<TestCasePaths>, Box<dyn Error>> {
    get_cases_in(Path::new(FIXTURES_PATH))
}
