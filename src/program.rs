//! Program discovery and the file formats surrounding the bytecode: the
//! per-function bytecode files, the wire-to-sharing map and the test
//! inputs.
use std::convert::TryFrom;
use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::{builder::Sharing, definitions::program, ProgramError};

/// Hands out the bytecode text of a function on demand; `CALL` resolution
/// goes through here during interpretation.
pub trait ProgramSource {
    fn function(&self, name: &str) -> Result<String, ProgramError>;
}

/// In-memory programs, keyed by function name. Used by the test suite and
/// the benches.
impl ProgramSource for HashMap<String, String> {
    fn function(&self, name: &str) -> Result<String, ProgramError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ProgramError::UnknownFunction(name.to_string()))
    }
}

/// A compiled program on disk.
///
/// For a directory `P` with basename `B`, the layout is
/// `P/B_<fn>_bytecode.txt` per function, `P/B_share_map.txt`, and an
/// optional `P/B_const.txt` preamble.
pub struct ProgramDir {
    dir: PathBuf,
    base: String,
}

impl ProgramDir {
    /// Opens a program directory. The `main` bytecode file must exist.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, ProgramError> {
        let dir = dir.as_ref().to_path_buf();
        let base = dir
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.to_string())
            .ok_or_else(|| ProgramError::BadRoot(dir.clone()))?;

        let program = ProgramDir { dir, base };
        let entry = program.bytecode_path(program::ENTRY);
        if !entry.is_file() {
            return Err(ProgramError::MissingBytecode {
                function: program::ENTRY.to_string(),
                path: entry,
            });
        }
        Ok(program)
    }

    fn prefixed(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.base, suffix))
    }

    fn bytecode_path(&self, function: &str) -> PathBuf {
        self.prefixed(&format!("_{}{}", function, program::BYTECODE_SUFFIX))
    }

    /// Parses the share map file into wire-name → sharing bindings.
    pub fn share_map(&self) -> Result<HashMap<String, Sharing>, ProgramError> {
        let path = self.prefixed(program::SHARE_MAP_SUFFIX);
        if !path.is_file() {
            return Err(ProgramError::MissingShareMap(path));
        }
        parse_share_map(&fs::read_to_string(path)?)
    }

    /// Reads the constants preamble, if the program ships one.
    pub fn constants(&self) -> Result<Option<String>, ProgramError> {
        let path = self.prefixed(program::CONST_SUFFIX);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }
}

impl ProgramSource for ProgramDir {
    fn function(&self, name: &str) -> Result<String, ProgramError> {
        let path = self.bytecode_path(name);
        if !path.is_file() {
            return Err(ProgramError::MissingBytecode {
                function: name.to_string(),
                path,
            });
        }
        Ok(fs::read_to_string(path)?)
    }
}

/// Parses share-map text: `<wire-name> <a|b|y>` per line. Lines with any
/// other token count carry no binding and are ignored.
pub fn parse_share_map(text: &str) -> Result<HashMap<String, Sharing>, ProgramError> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 2 {
            continue;
        }
        map.insert(tokens[0].to_string(), Sharing::try_from(tokens[1])?);
    }
    log::debug!("share map carries {} wires", map.len());
    Ok(map)
}

/// Parses test-input text into parameter values.
///
/// `<name> <value>` binds a scalar; `<name> <v0> <v1> …` flattens an array
/// into `<name>_0 …`. Lines led by the `res` marker are expected-output
/// annotations and are skipped.
pub fn parse_test_inputs(text: &str) -> Result<HashMap<String, u32>, ProgramError> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() || tokens[0] == program::RESULT_TOKEN {
            continue;
        }
        if tokens.len() == 2 {
            map.insert(tokens[0].to_string(), parse_value(tokens[1])?);
        } else if tokens.len() > 2 {
            for (index, token) in tokens[1..].iter().enumerate() {
                map.insert(format!("{}_{}", tokens[0], index), parse_value(token)?);
            }
        }
    }
    Ok(map)
}

/// Loads and parses a test-input file.
pub fn load_test_inputs<P: AsRef<Path>>(path: P) -> Result<HashMap<String, u32>, ProgramError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ProgramError::MissingTestInputs(path.to_path_buf()));
    }
    parse_test_inputs(&fs::read_to_string(path)?)
}

fn parse_value(token: &str) -> Result<u32, ProgramError> {
    token
        .parse::<i64>()
        .map(|value| value as u32)
        .map_err(|source| ProgramError::BadInt {
            token: token.to_string(),
            source,
        })
}
