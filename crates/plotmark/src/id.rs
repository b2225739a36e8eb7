//! Plot identifier encoding.
//!
//! Every data square is painted with red plus an optional green and blue
//! component, so each square carries two bits: bit 0 is green, bit 1 is blue.
//! Squares are packed with the first data square least significant.

use crate::PlotError;
use plotmark_chessboard::SampleColor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data squares that fit the packed `u64`.
pub const MAX_DATA_SQUARES: usize = 32;

/// Data squares per 16-bit word.
pub const SQUARES_PER_WORD: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlotIdentifier {
    codes: Vec<u8>,
}

/// Two-bit code of one data square, or `None` if its paint lacks red.
pub fn square_code(color: SampleColor) -> Option<u8> {
    let [r, g, b] = color.rgb();
    r.then_some(((b as u8) << 1) | g as u8)
}

/// Paint of a data square carrying `code`. Code 3 would be white, which has no
/// hue and cannot be read back.
pub fn square_color(code: u8) -> Option<SampleColor> {
    match code {
        0 => Some(SampleColor::Red),
        1 => Some(SampleColor::Yellow),
        2 => Some(SampleColor::Magenta),
        _ => None,
    }
}

fn pack(codes: &[u8]) -> u64 {
    codes
        .iter()
        .rev()
        .fold(0u64, |acc, &c| (acc << 2) | c as u64)
}

impl PlotIdentifier {
    /// Validate and encode the association vector of a chessboard.
    pub fn from_association(association: &[SampleColor]) -> Result<Self, PlotError> {
        let codes = association
            .iter()
            .enumerate()
            .map(|(index, &color)| {
                square_code(color).ok_or(PlotError::InvalidSquareColor { index, color })
            })
            .collect::<Result<Vec<u8>, PlotError>>()?;
        if codes.len() > MAX_DATA_SQUARES {
            return Err(PlotError::IdentifierTooWide {
                squares: codes.len(),
            });
        }
        Ok(Self { codes })
    }

    /// Split `value` over `squares` data squares, first square least significant.
    pub fn from_value(value: u64, squares: usize) -> Result<Self, PlotError> {
        if squares > MAX_DATA_SQUARES {
            return Err(PlotError::IdentifierTooWide { squares });
        }
        if squares < MAX_DATA_SQUARES && value >> (2 * squares) != 0 {
            return Err(PlotError::IdentifierDoesNotFit { value, squares });
        }
        let codes: Vec<u8> = (0..squares)
            .map(|k| ((value >> (2 * k)) & 0b11) as u8)
            .collect();
        if let Some(index) = codes.iter().position(|&c| square_color(c).is_none()) {
            return Err(PlotError::WhiteDataSquare { value, index });
        }
        Ok(Self { codes })
    }

    /// Data-square paints in image order.
    pub fn colors(&self) -> Vec<SampleColor> {
        self.codes.iter().filter_map(|&c| square_color(c)).collect()
    }

    /// Per-square codes in image order.
    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    pub fn value(&self) -> u64 {
        pack(&self.codes)
    }

    /// The codes in groups of eight squares, image order, each group packed
    /// like [`value`](Self::value). Word `k` equals bits `16k..16k+16` of the value.
    pub fn words(&self) -> Vec<u16> {
        self.codes
            .chunks(SQUARES_PER_WORD)
            .map(|chunk| pack(chunk) as u16)
            .collect()
    }

    /// Decimal words concatenated, used as the sort directory of a plot.
    pub fn dir_name(&self) -> String {
        self.words().iter().map(u16::to_string).collect()
    }
}

impl fmt::Display for PlotIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}
