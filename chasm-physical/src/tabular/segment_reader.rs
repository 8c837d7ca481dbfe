//! This module defines [SegmentReader].

use streaming_iterator::StreamingIterator;

use crate::datatypes::{NodeId, Term};

use super::segment::Segment;

/// Streaming reader over the rows of a [Segment].
///
/// The current row is assembled in an internal buffer,
/// so iterating does not allocate per row.
#[derive(Debug)]
pub struct SegmentReader<'a> {
    segment: &'a Segment,
    /// Index of the next row to be read
    next: usize,
    /// Values of the current row
    buffer: Vec<Term>,
    /// Whether the buffer holds a valid row
    valid: bool,
}

impl<'a> SegmentReader<'a> {
    /// Create a new [SegmentReader].
    pub fn new(segment: &'a Segment) -> Self {
        Self {
            segment,
            next: 0,
            buffer: Vec::with_capacity(segment.arity()),
            valid: false,
        }
    }

    /// Return the index of the current row.
    pub fn position(&self) -> Option<usize> {
        self.valid.then(|| self.next - 1)
    }

    /// Return the provenance entries of the current row.
    pub fn provenance(&self) -> Option<Vec<NodeId>> {
        self.position()
            .map(|position| self.segment.row_provenance(position))
    }
}

impl StreamingIterator for SegmentReader<'_> {
    type Item = [Term];

    fn advance(&mut self) {
        self.valid = self.next < self.segment.len();
        if !self.valid {
            return;
        }

        self.buffer.clear();
        self.buffer.extend(
            self.segment
                .columns()
                .iter()
                .map(|column| column[self.next]),
        );
        self.next += 1;
    }

    fn get(&self) -> Option<&Self::Item> {
        self.valid.then_some(self.buffer.as_slice())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.segment.len() - self.next;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod test {
    use streaming_iterator::StreamingIterator;
    use test_log::test;

    use crate::{columnar::Column, datatypes::Term, tabular::segment::Segment};

    #[test]
    fn read_all_rows() {
        let segment = Segment::from_rows(
            2,
            vec![
                vec![Term::constant(1), Term::constant(2)],
                vec![Term::constant(3), Term::constant(4)],
            ],
        )
        .unwrap()
        .with_provenance(vec![Column::new(vec![7, 8])])
        .unwrap();

        let mut reader = segment.reader();
        let mut rows = Vec::new();
        while let Some(row) = reader.next() {
            rows.push(row.to_vec());
        }

        assert_eq!(rows, segment.rows().collect::<Vec<_>>());
        assert_eq!(reader.position(), None);

        let mut reader = segment.reader();
        reader.advance();
        assert_eq!(reader.provenance(), Some(vec![7]));
    }
}
