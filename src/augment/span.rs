/// Half-open token range `[start, end)` inside a tokenized sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Where a target sits in a tokenized sentence.
///
/// `duplicate` is a second, disjoint occurrence of the same text that must be
/// kept in step with the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedTarget {
    pub primary: Span,
    pub duplicate: Option<Span>,
}

impl LocatedTarget {
    pub fn in_duplicate(&self, index: usize) -> bool {
        self.duplicate.is_some_and(|d| d.contains(index))
    }
}
