use crate::foundation::core::{Priority, ReprKind};

/// A representation that could serve as a conversion source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceCandidate {
    /// Candidate kind.
    pub kind: ReprKind,
    /// Its reported priority.
    pub priority: Priority,
    /// Whether it is the owner's last-written kind.
    pub last_written: bool,
}

/// Order candidates best first.
///
/// Highest priority wins. Equal priorities prefer the last-written kind, then kind order so the
/// ranking never depends on hash-map iteration.
pub fn rank_sources(candidates: impl IntoIterator<Item = SourceCandidate>) -> Vec<ReprKind> {
    let mut ranked: Vec<SourceCandidate> = candidates.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.last_written.cmp(&a.last_written))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    ranked.into_iter().map(|c| c.kind).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/data/select.rs"]
mod tests;
