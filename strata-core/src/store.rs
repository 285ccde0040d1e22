//! Copy-on-write view over a target's sections.
//!
//! A [`SectionStore`] borrows a [`Target`] together with its bundle's default
//! sections. Reads resolve `Inherited` layouts against the default; the first
//! mutating call forks the default into a private `Overridden` copy, so the
//! default itself is never written through a target.

use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{Component, Layout, Section, Target, TargetId};

/// Delta of the section the reconciler writes into.
pub const PRIMARY_DELTA: u32 = 0;

pub struct SectionStore<'a> {
    target: &'a mut Target,
    default: &'a [Section],
    forked: bool,
}

impl<'a> SectionStore<'a> {
    /// Open a view over `target`. Targets without a layout attribute yield
    /// [`StoreError::NotApplicable`].
    pub fn open(target: &'a mut Target, default: &'a [Section]) -> Result<Self, StoreError> {
        if matches!(target.layout, Layout::Absent) {
            return Err(StoreError::NotApplicable { id: target.id });
        }
        Ok(Self {
            target,
            default,
            forked: false,
        })
    }

    pub fn target_id(&self) -> TargetId {
        self.target.id
    }

    /// True once this view has forked the bundle default into a private copy.
    pub fn forked(&self) -> bool {
        self.forked
    }

    pub fn sections(&self) -> &[Section] {
        self.target.layout.resolve(self.default)
    }

    pub fn section(&self, delta: u32) -> Option<&Section> {
        self.sections().iter().find(|s| s.delta == delta)
    }

    fn sections_mut(&mut self) -> &mut Vec<Section> {
        if matches!(self.target.layout, Layout::Inherited) {
            debug!("forking default layout for target {}", self.target.id);
            self.target.layout = Layout::Overridden(self.default.to_vec());
            self.forked = true;
        }
        match &mut self.target.layout {
            Layout::Overridden(sections) => sections,
            // `open` rejects Absent; Inherited was forked above.
            Layout::Absent | Layout::Inherited => unreachable!("layout is always overridden here"),
        }
    }

    pub fn section_mut(&mut self, delta: u32) -> Result<&mut Section, StoreError> {
        let id = self.target.id;
        self.sections_mut()
            .iter_mut()
            .find(|s| s.delta == delta)
            .ok_or(StoreError::SectionNotFound { id, delta })
    }

    /// The delta-0 section, created at the front if the target has none.
    pub fn primary_section_mut(&mut self) -> &mut Section {
        let sections = self.sections_mut();
        let index = match sections.iter().position(|s| s.delta == PRIMARY_DELTA) {
            Some(index) => index,
            None => {
                sections.insert(0, Section::new(PRIMARY_DELTA));
                0
            }
        };
        &mut sections[index]
    }

    /// Append `component` at the end of the section, assigning it the next
    /// weight. Returns the assigned weight.
    pub fn append_component(
        &mut self,
        delta: u32,
        mut component: Component,
    ) -> Result<i64, StoreError> {
        let id = self.target_id();
        let section = self.section_mut(delta)?;
        component.weight = section
            .next_weight()
            .ok_or(StoreError::WeightOverflow { id, delta })?;
        let weight = component.weight;
        section.components.push(component);
        Ok(weight)
    }

    /// Remove a component by identity. Returns `None` if it was not present.
    pub fn remove_component(
        &mut self,
        delta: u32,
        uuid: Uuid,
    ) -> Result<Option<Component>, StoreError> {
        let section = self.section_mut(delta)?;
        Ok(section
            .position(uuid)
            .map(|index| section.components.remove(index)))
    }

    /// Put `replacement` at the ordinal index of `old`. Returns the displaced component.
    pub fn replace_at_position(
        &mut self,
        delta: u32,
        old: Uuid,
        replacement: Component,
    ) -> Result<Component, StoreError> {
        let section = self.section_mut(delta)?;
        section
            .replace_at(old, replacement)
            .ok_or(StoreError::ComponentNotFound { delta, uuid: old })
    }

    /// Assign weights `0..n-1` in current render order.
    pub fn renumber_weights(&mut self, delta: u32) -> Result<(), StoreError> {
        self.section_mut(delta)?.renumber();
        Ok(())
    }

    /// Overwrite the whole section list.
    pub fn replace_sections(&mut self, sections: Vec<Section>) {
        *self.sections_mut() = sections;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Configuration, PluginId};

    fn component(plugin: &str) -> Component {
        Component::new(PluginId::from(plugin), "content", Configuration::default())
    }

    fn default_sections() -> Vec<Section> {
        let mut section = Section::new(0);
        let mut hero = component("hero");
        hero.weight = 0;
        section.components.push(hero);
        vec![section]
    }

    #[test]
    fn absent_layout_is_not_applicable() {
        let mut target = Target::new(TargetId(3), "tag", "Tag");
        target.layout = Layout::Absent;
        let err = SectionStore::open(&mut target, &[]).err().expect("error");
        assert!(matches!(err, StoreError::NotApplicable { id } if id == TargetId(3)));
    }

    #[test]
    fn reads_do_not_fork() {
        let defaults = default_sections();
        let mut target = Target::new(TargetId(1), "page", "Home");
        {
            let store = SectionStore::open(&mut target, &defaults).expect("open");
            assert_eq!(store.sections().len(), 1);
            assert!(!store.forked());
        }
        assert_eq!(target.layout, Layout::Inherited);
    }

    #[test]
    fn first_write_forks_and_leaves_default_untouched() {
        let defaults = default_sections();
        let mut target = Target::new(TargetId(1), "page", "Home");
        {
            let mut store = SectionStore::open(&mut target, &defaults).expect("open");
            let weight = store.append_component(0, component("text")).expect("append");
            assert_eq!(weight, 1);
            assert!(store.forked());
        }
        match &target.layout {
            Layout::Overridden(sections) => assert_eq!(sections[0].components.len(), 2),
            other => panic!("expected overridden, got {other:?}"),
        }
        assert_eq!(defaults[0].components.len(), 1);
    }

    #[test]
    fn append_after_maximum_weight_is_an_error() {
        let mut section = Section::new(0);
        let mut heavy = component("hero");
        heavy.weight = i64::MAX;
        section.components.push(heavy);
        let mut target = Target::new(TargetId(8), "page", "Heavy");
        target.layout = Layout::Overridden(vec![section]);

        let mut store = SectionStore::open(&mut target, &[]).expect("open");
        let err = store.append_component(0, component("text")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::WeightOverflow { id, delta: 0 } if id == TargetId(8)
        ));
        assert_eq!(store.section(0).map(|s| s.components.len()), Some(1));
    }

    #[test]
    fn primary_section_is_created_when_missing() {
        let mut target = Target::new(TargetId(1), "page", "Home");
        target.layout = Layout::Overridden(vec![Section::new(2)]);
        let mut store = SectionStore::open(&mut target, &[]).expect("open");
        store.primary_section_mut();
        let deltas: Vec<_> = store.sections().iter().map(|s| s.delta).collect();
        assert_eq!(deltas, vec![0, 2]);
    }

    #[test]
    fn replace_at_position_keeps_index() {
        let mut target = Target::new(TargetId(1), "page", "Home");
        target.layout = Layout::Overridden(vec![Section::new(0)]);
        let mut store = SectionStore::open(&mut target, &[]).expect("open");
        let mut uuids = Vec::new();
        for name in ["a", "b", "c"] {
            let c = component(name);
            uuids.push(c.uuid);
            store.append_component(0, c).expect("append");
        }
        let mut replacement = component("b2");
        replacement.weight = 1;
        let new_uuid = replacement.uuid;
        let old = store
            .replace_at_position(0, uuids[1], replacement)
            .expect("replace");
        assert_eq!(old.plugin, PluginId::from("b"));
        let section = store.section(0).expect("section");
        assert_eq!(section.position(new_uuid), Some(1));
        assert_eq!(section.position(uuids[1]), None);
    }

    #[test]
    fn replace_missing_component_errors() {
        let mut target = Target::new(TargetId(1), "page", "Home");
        target.layout = Layout::Overridden(vec![Section::new(0)]);
        let mut store = SectionStore::open(&mut target, &[]).expect("open");
        let err = store
            .replace_at_position(0, Uuid::new_v4(), component("x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::ComponentNotFound { delta: 0, .. }));
    }

    #[test]
    fn remove_then_renumber() {
        let mut target = Target::new(TargetId(1), "page", "Home");
        target.layout = Layout::Overridden(vec![Section::new(0)]);
        let mut store = SectionStore::open(&mut target, &[]).expect("open");
        let mut uuids = Vec::new();
        for name in ["a", "b", "c"] {
            let c = component(name);
            uuids.push(c.uuid);
            store.append_component(0, c).expect("append");
        }
        let removed = store.remove_component(0, uuids[0]).expect("remove");
        assert!(removed.is_some());
        assert!(store.remove_component(0, uuids[0]).expect("remove").is_none());
        store.renumber_weights(0).expect("renumber");
        let weights: Vec<_> = store.sections()[0].components.iter().map(|c| c.weight).collect();
        assert_eq!(weights, vec![0, 1]);
    }

    #[test]
    fn missing_section_errors() {
        let mut target = Target::new(TargetId(9), "page", "Home");
        let mut store = SectionStore::open(&mut target, &[]).expect("open");
        let err = store.renumber_weights(4).unwrap_err();
        assert!(matches!(err, StoreError::SectionNotFound { delta: 4, .. }));
    }
}
