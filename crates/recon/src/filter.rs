use std::collections::BTreeSet;

use crate::model::CycleFact;

/// Narrowing criteria for the report tables. An empty set means no
/// restriction on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub cycles: BTreeSet<String>,
    pub sectors: BTreeSet<String>,
    /// A client passes when it bought at least one of these brands.
    pub brands: BTreeSet<String>,
    pub only_multibrand: bool,
}

impl ReportFilter {
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
            && self.sectors.is_empty()
            && self.brands.is_empty()
            && !self.only_multibrand
    }

    pub fn accepts_cycle(&self, cycle: &str) -> bool {
        self.cycles.is_empty() || self.cycles.contains(cycle)
    }

    pub fn accepts_sector(&self, sector: &str) -> bool {
        self.sectors.is_empty() || self.sectors.contains(sector)
    }

    /// Full filter over a client fact.
    pub fn accepts_fact(&self, fact: &CycleFact) -> bool {
        if !self.accepts_cycle(&fact.cycle) {
            return false;
        }
        if !self.sectors.is_empty() && fact.sectors.is_disjoint(&self.sectors) {
            return false;
        }
        if !self.brands.is_empty() && fact.brands.is_disjoint(&self.brands) {
            return false;
        }
        !self.only_multibrand || fact.is_multibrand()
    }
}
