/// A byte offset range inside the text a diagnostic refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Span covering line `index` (0-based) of `text`, without its newline.
    pub fn of_line(text: &str, index: usize) -> Self {
        let mut offset = 0usize;
        for (i, line) in text.split('\n').enumerate() {
            if i == index {
                let end = offset + line.trim_end_matches('\r').len();
                return Self::new(offset as u32, end as u32);
            }
            offset += line.len() + 1;
        }
        Self::new(text.len() as u32, text.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_of_line() {
        let text = "first\nsecond\r\nthird";
        assert_eq!(Span::of_line(text, 0), Span::new(0, 5));
        assert_eq!(Span::of_line(text, 1), Span::new(6, 12));
        assert_eq!(Span::of_line(text, 2), Span::new(14, 19));
        assert_eq!(Span::of_line(text, 9), Span::new(19, 19));
    }
}
