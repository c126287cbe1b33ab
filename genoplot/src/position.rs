use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading a `chr<chr>:<pos>` variant identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionParseError {
    #[error("Position '{0}' does not start with 'chr'")]
    MissingPrefix(String),

    #[error("Position '{0}' has no ':' separator between chromosome and offset")]
    MissingSeparator(String),

    #[error("Position '{input}' names unknown chromosome '{token}'")]
    UnknownChromosome { input: String, token: String },

    #[error("Position '{input}' has an invalid base-pair offset '{offset}'")]
    InvalidOffset { input: String, offset: String },
}

/// Chromosome token as written after the `chr` prefix: 1-22, X, Y or M.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Chromosome(String);

impl Chromosome {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accepts the bare token or a `chr`-prefixed name (gene tables use both).
    pub fn from_name(name: &str) -> Option<Self> {
        let token = name.trim();
        let token = token.strip_prefix("chr").unwrap_or(token);
        Self::from_token(token)
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "X" | "Y" | "M" => Some(Chromosome(token.to_string())),
            _ => {
                // autosomes only, no leading zeros
                if token.starts_with('0') {
                    return None;
                }
                match token.parse::<u8>() {
                    Ok(n) if (1..=22).contains(&n) => Some(Chromosome(token.to_string())),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed chromosome + base-pair coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locus {
    pub chr: Chromosome,
    pub pos: u64,
}

impl FromStr for Locus {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_position(s)
    }
}

/// Parse `chr7:123456` into chromosome `7` and offset `123456`.
pub fn parse_position(input: &str) -> Result<Locus, PositionParseError> {
    let trimmed = input.trim();
    let rest = trimmed
        .strip_prefix("chr")
        .ok_or_else(|| PositionParseError::MissingPrefix(input.to_string()))?;

    let (token, offset) = rest
        .split_once(':')
        .ok_or_else(|| PositionParseError::MissingSeparator(input.to_string()))?;

    let chr = Chromosome::from_token(token).ok_or_else(|| PositionParseError::UnknownChromosome {
        input: input.to_string(),
        token: token.to_string(),
    })?;

    let invalid_offset = || PositionParseError::InvalidOffset {
        input: input.to_string(),
        offset: offset.to_string(),
    };
    if offset.is_empty() || !offset.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_offset());
    }
    let pos = offset.parse::<u64>().map_err(|_| invalid_offset())?;

    Ok(Locus { chr, pos })
}
