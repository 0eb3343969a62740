//! Records accumulated during one query run.

use std::collections::{HashMap, HashSet};

use crate::{
    packet::{question::Question, records::ResourceRecord, Class, Type},
    DomainName,
};

use super::instance::Instance;

/// Received resource records, indexed by owner name and type.
///
/// Equal records (same name, class and data) are only stored once.
#[derive(Debug, Default)]
pub(crate) struct RecordSet {
    index: HashMap<DomainName, HashMap<Type, Vec<ResourceRecord>>>,
}

impl RecordSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `records`, returning how many of them were not already present.
    pub(crate) fn merge(&mut self, records: impl IntoIterator<Item = ResourceRecord>) -> usize {
        let mut added = 0;
        for rr in records {
            let by_type = self.index.entry(rr.name().clone()).or_default();
            let entries = by_type.entry(rr.record_type()).or_default();
            if !entries.contains(&rr) {
                log::debug!("new record: {}", rr);
                entries.push(rr);
                added += 1;
            }
        }
        added
    }

    /// Returns all records owned by `name` with type `ty`.
    pub(crate) fn get(&self, name: &DomainName, ty: Type) -> &[ResourceRecord] {
        self.index
            .get(name)
            .and_then(|by_type| by_type.get(&ty))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn contains(&self, name: &DomainName, ty: Type) -> bool {
        !self.get(name, ty).is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.index.values().flat_map(HashMap::values).map(Vec::len).sum()
    }

    /// Returns the questions whose answers are needed to complete the chains of the stored
    /// records:
    ///
    /// - SRV and TXT of every instance a PTR record points to,
    /// - A and AAAA of every SRV target that has neither.
    pub(crate) fn missing_questions(&self) -> HashSet<Question> {
        let mut missing = HashSet::new();
        for by_type in self.index.values() {
            let ptrs = by_type.get(&Type::PTR).into_iter().flatten();
            for ptr in ptrs.filter_map(|rr| rr.record().as_ptr()) {
                let instance = ptr.ptrdname();
                for ty in [Type::SRV, Type::TXT] {
                    if !self.contains(instance, ty) {
                        missing.insert(Question::new(instance.clone(), ty, Class::IN));
                    }
                }
            }

            let srvs = by_type.get(&Type::SRV).into_iter().flatten();
            for srv in srvs.filter_map(|rr| rr.record().as_srv()) {
                let host = srv.target();
                if !self.contains(host, Type::A) && !self.contains(host, Type::AAAA) {
                    missing.insert(Question::new(host.clone(), Type::A, Class::IN));
                    missing.insert(Question::new(host.clone(), Type::AAAA, Class::IN));
                }
            }
        }
        missing
    }

    /// Assembles an [`Instance`] for every complete chain starting at a PTR record that
    /// answers `browse`.
    pub(crate) fn instances(&self, browse: &Question) -> HashSet<Instance> {
        self.get(browse.name(), Type::PTR)
            .iter()
            .filter(|rr| browse.answered_by(rr))
            .filter_map(|rr| rr.record().as_ptr())
            .filter_map(|ptr| Instance::assemble(ptr, self))
            .collect()
    }
}
