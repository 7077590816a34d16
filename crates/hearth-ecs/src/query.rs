//! Component filters and transition (enter/exit) queries.
//!
//! A [`Filter`] is a required-component mask built from a tuple of component
//! types. [`EntityStore::query`](crate::store::EntityStore::query) returns the
//! live entities whose mask contains it. A [`TransitionQuery`] remembers what
//! it matched last time and reports the difference on each evaluation.

use std::collections::BTreeSet;

use crate::component::{Component, ComponentMask, ComponentRegistry};
use crate::entity::EntityId;
use crate::store::EntityStore;

// ---------------------------------------------------------------------------
// ComponentSet
// ---------------------------------------------------------------------------

/// A tuple of component types, `(A,)` up to `(A, B, C, D)`.
pub trait ComponentSet {
    /// The combined mask, or `None` if any member type is unregistered.
    fn mask(registry: &ComponentRegistry) -> Option<ComponentMask>;
}

macro_rules! impl_component_set {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentSet for ($($t,)+) {
            fn mask(registry: &ComponentRegistry) -> Option<ComponentMask> {
                let mut mask = ComponentMask::EMPTY;
                $( mask = mask.with(registry.lookup::<$t>()?); )+
                Some(mask)
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Required-component predicate.
///
/// Filters resolve component ids at construction time, so build them after
/// registering the component types. A filter naming an unregistered type
/// matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    required: Option<ComponentMask>,
}

impl Filter {
    /// Filter requiring every component type in `S`.
    pub fn of<S: ComponentSet>(store: &EntityStore) -> Self {
        Self {
            required: S::mask(store.registry()),
        }
    }

    #[inline]
    pub fn matches(&self, mask: ComponentMask) -> bool {
        self.required.is_some_and(|required| mask.contains(required))
    }
}

// ---------------------------------------------------------------------------
// TransitionQuery
// ---------------------------------------------------------------------------

/// Entities that started or stopped matching between two evaluations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transitions {
    pub entered: Vec<EntityId>,
    pub exited: Vec<EntityId>,
}

impl Transitions {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// Tracks membership of a [`Filter`] across evaluations.
///
/// Each call to [`evaluate`](Self::evaluate) compares the current match set
/// against the set recorded at the previous call, so every transition is
/// reported exactly once. Only the net change is visible: an entity created
/// and destroyed between two evaluations is reported in neither list.
/// Because ids are generational, a destroyed entity whose index was recycled
/// shows up as one exit (old id) plus one entry (new id).
#[derive(Debug, Clone)]
pub struct TransitionQuery {
    filter: Filter,
    previous: BTreeSet<EntityId>,
}

impl TransitionQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            previous: BTreeSet::new(),
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Entities matched at the last evaluation.
    pub fn tracked(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.previous.iter().copied()
    }

    pub fn evaluate(&mut self, store: &EntityStore) -> Transitions {
        let current: BTreeSet<EntityId> = store.query(&self.filter).into_iter().collect();
        let entered = current.difference(&self.previous).copied().collect();
        let exited = self.previous.difference(&current).copied().collect();
        self.previous = current;
        Transitions { entered, exited }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position(f32);

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity(f32);

    struct Unregistered;

    fn setup_store() -> EntityStore {
        let mut store = EntityStore::new();
        store.register_component::<Position>("position").unwrap();
        store.register_component::<Velocity>("velocity").unwrap();
        store
    }

    fn moving(store: &mut EntityStore) -> EntityId {
        let e = store.create();
        store.insert(e, Position(0.0)).unwrap();
        store.insert(e, Velocity(0.0)).unwrap();
        e
    }

    #[test]
    fn filter_with_unregistered_type_matches_nothing() {
        let mut store = setup_store();
        moving(&mut store);
        let filter = Filter::of::<(Position, Unregistered)>(&store);
        assert!(store.query(&filter).is_empty());
    }

    #[test]
    fn first_evaluation_reports_all_current_as_entered() {
        let mut store = setup_store();
        let a = moving(&mut store);
        let b = moving(&mut store);
        let mut q = TransitionQuery::new(Filter::of::<(Position, Velocity)>(&store));

        let t = q.evaluate(&store);
        assert_eq!(t.entered, vec![a, b]);
        assert!(t.exited.is_empty());
    }

    #[test]
    fn transitions_fire_exactly_once() {
        let mut store = setup_store();
        let mut q = TransitionQuery::new(Filter::of::<(Position, Velocity)>(&store));
        let a = moving(&mut store);

        assert_eq!(q.evaluate(&store).entered, vec![a]);
        assert!(q.evaluate(&store).is_empty(), "no repeat while still matching");

        store.destroy(a).unwrap();
        assert_eq!(q.evaluate(&store).exited, vec![a]);
        assert!(q.evaluate(&store).is_empty(), "no repeat after exit");
    }

    #[test]
    fn losing_a_required_component_is_an_exit() {
        let mut store = setup_store();
        let mut q = TransitionQuery::new(Filter::of::<(Position, Velocity)>(&store));
        let a = moving(&mut store);
        q.evaluate(&store);

        store.remove::<Velocity>(a);
        let t = q.evaluate(&store);
        assert_eq!(t.exited, vec![a]);
        assert!(store.is_alive(a));

        store.insert(a, Velocity(1.0)).unwrap();
        assert_eq!(q.evaluate(&store).entered, vec![a]);
    }

    #[test]
    fn create_and_destroy_between_evaluations_reports_nothing() {
        let mut store = setup_store();
        let mut q = TransitionQuery::new(Filter::of::<(Position, Velocity)>(&store));
        q.evaluate(&store);

        let ghost = moving(&mut store);
        store.destroy(ghost).unwrap();

        let t = q.evaluate(&store);
        assert!(t.entered.is_empty());
        assert!(t.exited.is_empty());
    }

    #[test]
    fn recycled_index_is_exit_plus_enter() {
        let mut store = setup_store();
        let mut q = TransitionQuery::new(Filter::of::<(Position, Velocity)>(&store));
        let old = moving(&mut store);
        q.evaluate(&store);

        store.destroy(old).unwrap();
        let new = moving(&mut store);
        assert_eq!(new.index(), old.index());

        let t = q.evaluate(&store);
        assert_eq!(t.exited, vec![old]);
        assert_eq!(t.entered, vec![new]);
    }
}
