// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading and rewriting replay data.
//!
//! A replay data file is line-oriented. Compilations are recorded on lines of the form:
//!
//! ```text
//! compile <class> <method> <signature> <entry-bci> <comp-level> [inline <count> ...]
//! ```
//!
//! Tokens are positional and anything after the compile level is optional.

use crate::{artifacts::REPLAY_FILE_NAME, errors::HarnessError};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

const COMPILE_RECORD_PREFIX: &str = "compile ";
const COMP_LEVEL_INDEX: usize = 5;
const INLINE_FLAG_INDEX: usize = 6;

/// A single `compile` line of a replay data file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompileRecord {
    line: String,
}

impl CompileRecord {
    /// Parses a line, returning `None` if it isn't a `compile` record.
    pub fn parse(line: &str) -> Option<Self> {
        line.starts_with(COMPILE_RECORD_PREFIX).then(|| Self {
            line: line.to_owned(),
        })
    }

    /// The line as it appears in the file.
    pub fn line(&self) -> &str {
        &self.line
    }

    fn token(&self, index: usize) -> Option<&str> {
        self.line.split_whitespace().nth(index)
    }

    /// The internal name of the compiled class, e.g. `compiler/ciReplay/CiReplayWorkload`.
    pub fn class(&self) -> Option<&str> {
        self.token(1)
    }

    /// The compiled method name.
    pub fn method(&self) -> Option<&str> {
        self.token(2)
    }

    /// The method's signature.
    pub fn signature(&self) -> Option<&str> {
        self.token(3)
    }

    /// The entry BCI: -1 for normal compilations, otherwise an OSR entry.
    pub fn entry_bci(&self) -> Option<&str> {
        self.token(4)
    }

    /// The compile level, unparsed.
    pub fn level_token(&self) -> Option<&str> {
        self.token(COMP_LEVEL_INDEX)
    }

    /// The token after the compile level, `inline` when inlining decisions were recorded.
    pub fn inline_flag(&self) -> Option<&str> {
        self.token(INLINE_FLAG_INDEX)
    }

    /// Tokens after the inline flag: inlining decisions, if any.
    pub fn trailing_tokens(&self) -> impl Iterator<Item = &str> {
        self.line.split_whitespace().skip(INLINE_FLAG_INDEX + 1)
    }

    /// The compile level.
    pub fn comp_level(&self) -> Result<i32, HarnessError> {
        let token = self
            .level_token()
            .ok_or_else(|| HarnessError::MissingCompLevel {
                line: self.line.clone(),
            })?;
        token.parse().map_err(|err| HarnessError::InvalidCompLevel {
            line: self.line.clone(),
            token: token.to_owned(),
            err,
        })
    }
}

/// Inspects the replay data file in a working directory.
#[derive(Clone, Debug)]
pub struct ReplayAnalyzer {
    replay_file: Utf8PathBuf,
}

impl ReplayAnalyzer {
    /// Creates a new analyzer for the replay data in `work_dir`.
    pub fn new(work_dir: &Utf8Path) -> Self {
        Self {
            replay_file: work_dir.join(REPLAY_FILE_NAME),
        }
    }

    /// The replay data file.
    pub fn replay_file(&self) -> &Utf8Path {
        &self.replay_file
    }

    fn read(&self) -> Result<String, HarnessError> {
        std::fs::read_to_string(&self.replay_file).map_err(|err| HarnessError::ReadReplay {
            path: self.replay_file.clone(),
            err,
        })
    }

    /// Returns every `compile` record, in file order.
    pub fn compile_records(&self) -> Result<Vec<CompileRecord>, HarnessError> {
        Ok(self.read()?.lines().filter_map(CompileRecord::parse).collect())
    }

    /// Returns the first `compile` record.
    pub fn first_compile_record(&self) -> Result<CompileRecord, HarnessError> {
        self.read()?
            .lines()
            .find_map(CompileRecord::parse)
            .ok_or_else(|| HarnessError::NoCompileRecord {
                path: self.replay_file.clone(),
            })
    }

    /// Returns the compile level of the first `compile` record.
    pub fn comp_level_from_replay(&self) -> Result<i32, HarnessError> {
        let level = self.first_compile_record()?.comp_level()?;
        debug!("replay data has compile level {level}");
        Ok(level)
    }

    /// Rewrites the replay data file, dropping the last token of every `compile` record.
    ///
    /// This is how replay data written by older JVMs, which didn't record compile levels, is
    /// simulated. Other lines are kept as-is.
    pub fn strip_last_token_of_compile_records(&self) -> Result<(), HarnessError> {
        let mut stripped = 0;
        let mut contents: String = self
            .read()?
            .lines()
            .map(|line| {
                if !line.starts_with(COMPILE_RECORD_PREFIX) {
                    return line;
                }
                stripped += 1;
                match line.rfind(' ') {
                    Some(index) => &line[..index],
                    None => line,
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        contents.push('\n');

        std::fs::write(&self.replay_file, contents).map_err(|err| HarnessError::WriteReplay {
            path: self.replay_file.clone(),
            err,
        })?;
        debug!("stripped the last token of {stripped} compile records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::{Utf8TempDir, tempdir};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn write_replay(contents: &str) -> (Utf8TempDir, ReplayAnalyzer) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(REPLAY_FILE_NAME), contents).unwrap();
        let analyzer = ReplayAnalyzer::new(dir.path());
        (dir, analyzer)
    }

    const REPLAY: &str = indoc! {"
        JvmtiExport can_access_local_variables 0
        ciMethod compiler/ciReplay/InliningWorkload test ()V 4069 2003 8 0 0
        compile compiler/ciReplay/InliningWorkload test ()V -1 4 inline 3 0 -1 compiler/ciReplay/InliningWorkload test ()V
        compile compiler/ciReplay/InliningWorkload m1 ()V -1 3
    "};

    #[test]
    fn records() {
        let (_dir, analyzer) = write_replay(REPLAY);
        let records = analyzer.compile_records().unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.class(), Some("compiler/ciReplay/InliningWorkload"));
        assert_eq!(first.method(), Some("test"));
        assert_eq!(first.signature(), Some("()V"));
        assert_eq!(first.entry_bci(), Some("-1"));
        assert_eq!(first.level_token(), Some("4"));
        assert_eq!(first.inline_flag(), Some("inline"));
        assert_eq!(first.trailing_tokens().count(), 6);

        assert_eq!(records[1].inline_flag(), None);
        assert_eq!(records[1].comp_level().unwrap(), 3);
        assert_eq!(analyzer.first_compile_record().unwrap(), *first);
    }

    #[test_case("compile A m ()V -1 4\n", 4 ; "no trailing tokens")]
    #[test_case("compile A m ()V -1 1 inline 0\n", 1 ; "trailing tokens")]
    #[test_case("ciMethod A m ()V 1 1 1 0 0\ncompile A m ()V -1 2\ncompile A m ()V -1 3\n", 2 ; "first record wins")]
    fn comp_level(contents: &str, expected: i32) {
        let (_dir, analyzer) = write_replay(contents);
        assert_eq!(analyzer.comp_level_from_replay().unwrap(), expected);
    }

    #[test]
    fn comp_level_errors() {
        let (_dir, analyzer) = write_replay("ciMethod A m ()V 1 1 1 0 0\n");
        assert!(matches!(
            analyzer.comp_level_from_replay(),
            Err(HarnessError::NoCompileRecord { .. })
        ));

        let (_dir, analyzer) = write_replay("compile A m ()V -1\n");
        assert!(matches!(
            analyzer.comp_level_from_replay(),
            Err(HarnessError::MissingCompLevel { .. })
        ));

        let (_dir, analyzer) = write_replay("compile A m ()V -1 four\n");
        match analyzer.comp_level_from_replay() {
            Err(HarnessError::InvalidCompLevel { token, .. }) => assert_eq!(token, "four"),
            other => panic!("unexpected result: {other:?}"),
        }

        let dir = tempdir().unwrap();
        assert!(matches!(
            ReplayAnalyzer::new(dir.path()).comp_level_from_replay(),
            Err(HarnessError::ReadReplay { .. })
        ));
    }

    #[test]
    fn strip_last_token() {
        let (dir, analyzer) = write_replay(indoc! {"
            ciMethod A m ()V 1 1 1 0 0
            compile A m ()V -1 4
            compile B n ()V -1 1 inline 0
        "});
        analyzer.strip_last_token_of_compile_records().unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join(REPLAY_FILE_NAME)).unwrap(),
            indoc! {"
                ciMethod A m ()V 1 1 1 0 0
                compile A m ()V -1
                compile B n ()V -1 1 inline
            "}
        );
        // The first record no longer has a compile level.
        assert!(matches!(
            analyzer.comp_level_from_replay(),
            Err(HarnessError::MissingCompLevel { .. })
        ));
    }
}
