//! GD3 track metadata.
//!
//! The engine hands metadata over as JSON (`SynthEngine::seq_gd3`). The raw
//! binary block found at the end of VGM/XGM files can be parsed directly
//! with [`Gd3::parse`].

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};

const GD3_TAG: &[u8; 4] = b"Gd3 ";

/// Track, game and author names, with Japanese variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gd3 {
    pub track_name: String,
    pub track_name_j: String,
    pub game_name: String,
    pub game_name_j: String,
    pub system_name: String,
    pub system_name_j: String,
    pub track_author: String,
    pub track_author_j: String,
    pub date: String,
    pub converted: String,
}

impl Gd3 {
    /// Decode the engine's serialized metadata.
    pub fn from_json(json: &str) -> RelayResult<Self> {
        serde_json::from_str(json).map_err(|e| RelayError::Gd3(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a binary GD3 block.
    pub fn parse(bytes: &[u8]) -> RelayResult<Self> {
        let rest = bytes
            .strip_prefix(GD3_TAG)
            .ok_or_else(|| RelayError::Gd3("missing \"Gd3 \" tag".into()))?;
        // version (4) + length (4)
        let mut rest = rest
            .get(8..)
            .ok_or_else(|| RelayError::Gd3("truncated header".into()))?;

        let mut fields: [String; 10] = Default::default();
        for field in fields.iter_mut() {
            let (value, tail) = read_utf16_until_null(rest)?;
            *field = value;
            rest = tail;
        }

        let [
            track_name,
            track_name_j,
            game_name,
            game_name_j,
            system_name,
            system_name_j,
            track_author,
            track_author_j,
            date,
            converted,
        ] = fields;

        Ok(Self {
            track_name,
            track_name_j,
            game_name,
            game_name_j,
            system_name,
            system_name_j,
            track_author,
            track_author_j,
            date,
            converted,
        })
    }

    /// "Game | Track"
    pub fn game_track_name(&self) -> String {
        join_non_empty(&[self.game_name.as_str(), self.track_name.as_str()], " | ")
    }

    /// "Game (J) / Track (J)"
    pub fn game_track_name_j(&self) -> String {
        join_non_empty(&[self.game_name_j.as_str(), self.track_name_j.as_str()], " / ")
    }

    /// "Author - Author (J)"
    pub fn track_author_full(&self) -> String {
        join_non_empty(&[self.track_author.as_str(), self.track_author_j.as_str()], " - ")
    }
}

fn join_non_empty(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(separator)
}

/// Read one UTF-16LE string terminated by `\0\0`.
///
/// Invalid UTF-16 decodes to an empty string; a missing terminator is an error.
fn read_utf16_until_null(bytes: &[u8]) -> RelayResult<(String, &[u8])> {
    let mut units = Vec::new();
    let mut rest = bytes;
    loop {
        let (pair, tail) = rest
            .split_first_chunk::<2>()
            .ok_or_else(|| RelayError::Gd3("unterminated string".into()))?;
        rest = tail;
        if pair == b"\0\0" {
            break;
        }
        units.push(u16::from_le_bytes(*pair));
    }
    Ok((String::from_utf16(&units).unwrap_or_default(), rest))
}
