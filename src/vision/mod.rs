//! Vision Layer
//!
//! Turns camera frames into recognized text and, from there, into an amount:
//! - `codec`: planar frame to JPEG / bitmap
//! - `ocr`: recognition service contract and its HTTP backend
//! - `region`: the focus band and line containment
//! - `extract`: digit extraction and parsing

pub mod codec;
pub mod extract;
pub mod ocr;
pub mod region;

use serde::{Deserialize, Serialize};

pub use extract::NumericAmount;
pub use ocr::{HttpRecognizer, RecognizerInput, Rotation, TextRecognizer};
pub use region::Rect;

/// A recognized line of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Line content as recognized
    pub text: String,
    /// Bounding box in source frame pixels, when the recognizer reports one
    #[serde(default)]
    pub bounding_box: Option<Rect>,
}

/// A block of lines, as grouped by the recognizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub lines: Vec<TextLine>,
}

/// Full recognition output for one frame, in recognizer enumeration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
}

impl RecognizedText {
    /// Iterate over every line of every block, in order
    pub fn lines(&self) -> impl Iterator<Item = &TextLine> {
        self.blocks.iter().flat_map(|block| block.lines.iter())
    }
}
