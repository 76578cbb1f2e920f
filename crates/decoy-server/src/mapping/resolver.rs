//! Winner selection among matching mappings.

use super::types::Mapping;

/// Pick the mapping with the highest priority.
///
/// Ties go to the mapping that comes first in ascending name order, so the
/// outcome never depends on the order the candidates are supplied in.
/// Returns `None` for an empty candidate set.
pub fn resolve<'a, I>(candidates: I) -> Option<&'a Mapping>
where
    I: IntoIterator<Item = &'a Mapping>,
{
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if !outranks(candidate, current) => Some(current),
        _ => Some(candidate),
    })
}

fn outranks(candidate: &Mapping, current: &Mapping) -> bool {
    candidate.priority() > current.priority()
        || (candidate.priority() == current.priority() && candidate.name() < current.name())
}
