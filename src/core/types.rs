/// Term identifier exposed by a dictionary. Dense, starts at 1.
/// 0 stands for "unbound" in triple patterns and is never a valid term id.
pub type TermId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriplePosition {
    Subject,
    Predicate,
    Object,
}

impl TriplePosition {
    pub const ALL: [TriplePosition; 3] = [
        TriplePosition::Subject,
        TriplePosition::Predicate,
        TriplePosition::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriplePosition::Subject => "subject",
            TriplePosition::Predicate => "predicate",
            TriplePosition::Object => "object",
        }
    }
}

/// The five persisted sort orders. OPS is omitted: no pattern routes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripleOrder {
    Spo,
    Sop,
    Pso,
    Pos,
    Osp,
}

impl TripleOrder {
    pub const ALL: [TripleOrder; 5] = [
        TripleOrder::Spo,
        TripleOrder::Sop,
        TripleOrder::Pso,
        TripleOrder::Pos,
        TripleOrder::Osp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TripleOrder::Spo => "SPO",
            TripleOrder::Sop => "SOP",
            TripleOrder::Pso => "PSO",
            TripleOrder::Pos => "POS",
            TripleOrder::Osp => "OSP",
        }
    }

    /// Positions from most to least significant under this order.
    pub fn positions(&self) -> [TriplePosition; 3] {
        use TriplePosition::{Object, Predicate, Subject};
        match self {
            TripleOrder::Spo => [Subject, Predicate, Object],
            TripleOrder::Sop => [Subject, Object, Predicate],
            TripleOrder::Pso => [Predicate, Subject, Object],
            TripleOrder::Pos => [Predicate, Object, Subject],
            TripleOrder::Osp => [Object, Subject, Predicate],
        }
    }

    pub fn primary_position(&self) -> TriplePosition {
        self.positions()[0]
    }

    /// SOP reuses SPO's primary-ids file, POS reuses PSO's.
    pub fn writes_primary_ids(&self) -> bool {
        !matches!(self, TripleOrder::Sop | TripleOrder::Pos)
    }

    /// Routing table from bound positions to the order that places the
    /// bound positions first.
    pub fn for_pattern(pattern: &TriplePattern) -> TripleOrder {
        let s = pattern.subject != 0;
        let p = pattern.predicate != 0;
        let o = pattern.object != 0;
        match (s, p, o) {
            (false, false, false) => TripleOrder::Spo,
            (false, false, true) => TripleOrder::Osp,
            (false, true, false) => TripleOrder::Pso,
            (false, true, true) => TripleOrder::Pos,
            (true, false, false) => TripleOrder::Spo,
            (true, false, true) => TripleOrder::Sop,
            (true, true, false) => TripleOrder::Spo,
            (true, true, true) => TripleOrder::Spo,
        }
    }
}

/// Triple pattern; 0 in a position means unbound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: TermId,
    pub predicate: TermId,
    pub object: TermId,
}

impl TriplePattern {
    pub fn new(subject: TermId, predicate: TermId, object: TermId) -> Self {
        TriplePattern { subject, predicate, object }
    }

    pub fn term(&self, position: TriplePosition) -> TermId {
        match position {
            TriplePosition::Subject => self.subject,
            TriplePosition::Predicate => self.predicate,
            TriplePosition::Object => self.object,
        }
    }

    pub fn bound_count(&self) -> usize {
        [self.subject, self.predicate, self.object]
            .iter()
            .filter(|&&t| t != 0)
            .count()
    }

    pub fn matches(&self, triple: &QuantifiedTriple) -> bool {
        (self.subject == 0 || self.subject == triple.subject)
            && (self.predicate == 0 || self.predicate == triple.predicate)
            && (self.object == 0 || self.object == triple.object)
    }
}

/// A triple with a transient multiplicity. The quantity is never persisted;
/// it only carries weight through a compose merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantifiedTriple {
    pub subject: TermId,
    pub predicate: TermId,
    pub object: TermId,
    pub quantity: u64,
}

impl QuantifiedTriple {
    pub fn new(subject: TermId, predicate: TermId, object: TermId, quantity: u64) -> Self {
        QuantifiedTriple { subject, predicate, object, quantity }
    }

    pub fn term(&self, position: TriplePosition) -> TermId {
        match position {
            TriplePosition::Subject => self.subject,
            TriplePosition::Predicate => self.predicate,
            TriplePosition::Object => self.object,
        }
    }

    pub fn set_term(&mut self, position: TriplePosition, id: TermId) {
        match position {
            TriplePosition::Subject => self.subject = id,
            TriplePosition::Predicate => self.predicate = id,
            TriplePosition::Object => self.object = id,
        }
    }

    /// Rebuild a triple from (primary, secondary, tertiary) values laid out
    /// under `order`.
    pub fn from_ordered(order: TripleOrder, primary: TermId, secondary: TermId, tertiary: TermId, quantity: u64) -> Self {
        let [p0, p1, p2] = order.positions();
        let mut t = QuantifiedTriple::new(0, 0, 0, quantity);
        t.set_term(p0, primary);
        t.set_term(p1, secondary);
        t.set_term(p2, tertiary);
        t
    }

    /// Term ids from most to least significant under `order`.
    pub fn ordered_terms(&self, order: TripleOrder) -> [TermId; 3] {
        let [p0, p1, p2] = order.positions();
        [self.term(p0), self.term(p1), self.term(p2)]
    }

    pub fn same_terms(&self, other: &QuantifiedTriple) -> bool {
        self.subject == other.subject
            && self.predicate == other.predicate
            && self.object == other.object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_routing_places_bound_positions_first() {
        for s in [0u64, 1] {
            for p in [0u64, 1] {
                for o in [0u64, 1] {
                    let pattern = TriplePattern::new(s, p, o);
                    let order = TripleOrder::for_pattern(&pattern);
                    let positions = order.positions();
                    let bound = pattern.bound_count();
                    for (i, pos) in positions.iter().enumerate() {
                        if i < bound {
                            assert_ne!(pattern.term(*pos), 0, "{:?} {:?}", pattern, order);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn ordered_round_trip() {
        let t = QuantifiedTriple::new(7, 8, 9, 2);
        for order in TripleOrder::ALL {
            let [a, b, c] = t.ordered_terms(order);
            let back = QuantifiedTriple::from_ordered(order, a, b, c, t.quantity);
            assert!(back.same_terms(&t));
        }
    }
}
