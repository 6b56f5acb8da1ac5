use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A source location: file ID + byte offset range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_the_byte_interval() {
        let source = "@a = nope();";
        let span = Span::new(0, 5, 11);
        assert_eq!(&source[span.range()], "nope()");
    }
}
