//! This module implements the anti-join that removes already known rows.

use std::cmp::Ordering;

use bitvec::vec::BitVec;

use crate::{error::Error, tabular::segment::Segment};

/// Remove from `candidate` every row that also occurs in `existing`.
///
/// Both segments must be lexicographically sorted and free of duplicates.
/// The surviving rows keep their relative order and their provenance.
pub fn anti_join(candidate: &Segment, existing: &Segment) -> Result<Segment, Error> {
    if candidate.arity() != existing.arity() {
        return Err(Error::ArityMismatch {
            expected: candidate.arity(),
            found: existing.arity(),
        });
    }

    debug_assert!(candidate.is_sorted_and_unique());
    debug_assert!(existing.is_sorted_and_unique());

    if candidate.is_empty() || existing.is_empty() {
        return Ok(candidate.clone());
    }

    let mut known = BitVec::repeat(false, candidate.len());
    let mut removed = 0usize;

    let mut candidate_index = 0;
    let mut existing_index = 0;
    while candidate_index < candidate.len() && existing_index < existing.len() {
        match candidate.compare_with(candidate_index, existing, existing_index) {
            Ordering::Less => candidate_index += 1,
            Ordering::Greater => existing_index += 1,
            Ordering::Equal => {
                known.set(candidate_index, true);
                removed += 1;
                candidate_index += 1;
                existing_index += 1;
            }
        }
    }

    if removed == 0 {
        return Ok(candidate.clone());
    }

    Ok(candidate.filter(&known, false))
}
