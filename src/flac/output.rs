use std::sync::LazyLock;

use regex::Regex;

static LEADING_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+)").expect("leading token regex must compile"));

const TEST_OK_MARKER: &str = "ok";
const REENCODE_OK_MARKER: &str = "Verify OK";

/// True when `flac --test` output reports at least one line ending in `ok`.
///
/// Progress updates are separated by carriage returns, so only the tail of
/// each line is inspected.
pub fn test_passed(output: &str) -> bool {
    !output.trim().is_empty()
        && output
            .lines()
            .any(|line| line.trim_end().ends_with(TEST_OK_MARKER))
}

/// True when a verified re-encode reported success.
pub fn reencode_verified(output: &str) -> bool {
    output.contains(REENCODE_OK_MARKER)
}

/// Leading token of the first output line, as printed by `metaflac --show-md5sum`.
pub fn parse_md5(output: &str) -> Option<String> {
    let first = output.lines().find(|line| !line.trim().is_empty())?;
    LEADING_TOKEN
        .captures(first)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().to_string())
}
