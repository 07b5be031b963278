use std::collections::HashMap;
use std::rc::Rc;

use super::descriptor::BeanType;
use super::property::{BeanPropertyReader, BeanPropertyWriter, BeanStateReader, BeanStateWriter};
use super::relevant_fields::{relevant_fields_of, IgnoredFields, RelevantField};

struct CachedState {
    fields: Rc<[RelevantField]>,
    writer: Rc<dyn BeanStateWriter>,
    reader: Rc<dyn BeanStateReader>,
}

/// Per-type writers and readers, computed on first use.
pub struct BeanStateCache {
    ignored: IgnoredFields,
    states: HashMap<usize, CachedState>,
}

impl BeanStateCache {
    pub fn new(ignored: IgnoredFields) -> Self {
        Self {
            ignored,
            states: HashMap::new(),
        }
    }

    pub fn ignored(&self) -> &IgnoredFields {
        &self.ignored
    }

    fn state(&mut self, ty: &'static BeanType) -> &CachedState {
        let ignored = &self.ignored;
        self.states.entry(ty as *const BeanType as usize).or_insert_with(|| {
            let fields: Rc<[RelevantField]> = relevant_fields_of(ty, ignored).into();
            CachedState {
                writer: Rc::new(BeanPropertyWriter::new(ty, Rc::clone(&fields))),
                reader: Rc::new(BeanPropertyReader::new(ty, Rc::clone(&fields))),
                fields,
            }
        })
    }

    pub fn fields_of(&mut self, ty: &'static BeanType) -> Rc<[RelevantField]> {
        Rc::clone(&self.state(ty).fields)
    }

    pub fn writer_for(&mut self, ty: &'static BeanType) -> Rc<dyn BeanStateWriter> {
        Rc::clone(&self.state(ty).writer)
    }

    pub fn reader_for(&mut self, ty: &'static BeanType) -> Rc<dyn BeanStateReader> {
        Rc::clone(&self.state(ty).reader)
    }

    /// Number of types seen so far.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for BeanStateCache {
    fn default() -> Self {
        Self::new(IgnoredFields::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::framework::{ABSTRACT_TASK, DEFAULT_TASK};

    #[test]
    fn test_state_is_computed_once_per_type() {
        let mut cache = BeanStateCache::default();
        let first = cache.fields_of(&ABSTRACT_TASK);
        let second = cache.fields_of(&ABSTRACT_TASK);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.writer_for(&DEFAULT_TASK);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_ignored_fields_apply_to_cached_state() {
        let ignored = IgnoredFields::new(&["AbstractTask.group"]).unwrap();
        let mut cache = BeanStateCache::new(ignored);
        let fields = cache.fields_of(&ABSTRACT_TASK);
        assert!(fields.iter().all(|field| field.name() != "group"));
        assert_eq!(cache.ignored().patterns(), ["AbstractTask.group".to_string()]);
    }
}
