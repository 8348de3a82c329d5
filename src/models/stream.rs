//! `Stream`: bound to a host URL, typed by which host-extractor owns it.

use serde::Serialize;

/// A resolved candidate stream. `working = !links.is_empty()`; only
/// `external && working` streams may be redirected to clients (§3
/// invariants, and REDESIGN FLAGS' strict-`external` resolution in §9).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stream {
    pub extractor_id: String,
    pub links: Vec<String>,
    pub poster: Option<String>,
    pub external: bool,
    pub priority: i32,
}

impl Stream {
    pub fn working(&self) -> bool {
        !self.links.is_empty()
    }

    /// `self` iff `external && working`, else `None` — the predicate the
    /// episode resolver races across a priority group.
    pub fn working_external_self(&self) -> Option<&Self> {
        if self.external && self.working() {
            Some(self)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(external: bool, links: Vec<&str>) -> Stream {
        Stream {
            extractor_id: "test".into(),
            links: links.into_iter().map(str::to_string).collect(),
            poster: None,
            external,
            priority: 0,
        }
    }

    #[test]
    fn working_requires_nonempty_links() {
        assert!(!stream(true, vec![]).working());
        assert!(stream(true, vec!["https://x/video.mp4"]).working());
    }

    #[test]
    fn working_external_self_requires_both() {
        assert!(stream(false, vec!["x"]).working_external_self().is_none());
        assert!(stream(true, vec![]).working_external_self().is_none());
        assert!(stream(true, vec!["x"]).working_external_self().is_some());
    }
}
