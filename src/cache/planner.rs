//! Consumption plan generation.
//!
//! Translates events into the ordered cache actions each mutation requires.
//! Actions of one event stay contiguous and in table order; events keep their
//! FIFO order.
//!
//! Read-through populations are checked against an [`InvalidationFence`]: a
//! value loaded before a key was invalidated is never written back after it.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tracing::debug;

use super::events::{CacheEvent, Epoch, EventKind};
use super::keys::CacheKey;

const FENCE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    InvalidateExact(CacheKey),
    /// Drop the key and everything nested under it.
    InvalidatePrefix(CacheKey),
    InvalidateAggregate,
    Set { key: CacheKey, value: Bytes },
}

#[derive(Debug, Default)]
pub struct ConsumptionPlan {
    pub actions: Vec<CacheAction>,
    /// Populations refused by the fence.
    pub stale_populates: usize,
}

/// Epoch of the latest invalidation per rendered key and per prefix.
///
/// Bounded: when an entry is pushed out, its epoch raises `floor`, and any
/// population observed at or before the floor is refused. Refusing only
/// costs a later miss.
pub struct InvalidationFence {
    exact: LruCache<String, Epoch>,
    prefixes: LruCache<String, Epoch>,
    floor: Option<Epoch>,
}

impl Default for InvalidationFence {
    fn default() -> Self {
        Self::with_capacity(FENCE_CAPACITY)
    }
}

impl InvalidationFence {
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            exact: LruCache::new(capacity),
            prefixes: LruCache::new(capacity),
            floor: None,
        }
    }

    /// Whether a value read at `observed` may still be stored under `key`.
    pub fn admits(&self, key: &CacheKey, observed: Epoch) -> bool {
        if self.floor.is_some_and(|floor| observed <= floor) {
            return false;
        }

        let rendered = key.render();
        let newer = |epoch: &Epoch| *epoch >= observed;
        if self.exact.peek(&rendered).is_some_and(newer) {
            return false;
        }
        !self
            .prefixes
            .iter()
            .any(|(prefix, epoch)| rendered.starts_with(prefix.as_str()) && newer(epoch))
    }

    fn record(&mut self, action: &CacheAction, epoch: Epoch) {
        match action {
            CacheAction::InvalidateExact(key) => {
                let evicted = remember(&mut self.exact, key.render(), epoch);
                self.raise_floor(evicted);
            }
            CacheAction::InvalidatePrefix(key) => {
                let evicted = remember(&mut self.prefixes, key.render(), epoch);
                self.raise_floor(evicted);
            }
            CacheAction::InvalidateAggregate => {
                let evicted = remember(&mut self.exact, CacheKey::FullTree.render(), epoch);
                self.raise_floor(evicted);
            }
            CacheAction::Set { .. } => {}
        }
    }

    fn raise_floor(&mut self, evicted: Option<Epoch>) {
        if let Some(epoch) = evicted {
            self.floor = Some(self.floor.map_or(epoch, |floor| floor.max(epoch)));
        }
    }
}

/// Store `epoch` for `key`, returning the epoch of an entry pushed out to
/// make room.
fn remember(entries: &mut LruCache<String, Epoch>, key: String, epoch: Epoch) -> Option<Epoch> {
    if let Some(existing) = entries.get_mut(&key) {
        *existing = (*existing).max(epoch);
        return None;
    }
    entries.push(key, epoch).map(|(_, evicted)| evicted)
}

impl fmt::Display for ConsumptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut exact = 0;
        let mut prefix = 0;
        let mut aggregate = 0;
        let mut set = 0;
        for action in &self.actions {
            match action {
                CacheAction::InvalidateExact(_) => exact += 1,
                CacheAction::InvalidatePrefix(_) => prefix += 1,
                CacheAction::InvalidateAggregate => aggregate += 1,
                CacheAction::Set { .. } => set += 1,
            }
        }
        write!(
            f,
            "ConsumptionPlan {{ exact: {exact}, prefix: {prefix}, aggregate: {aggregate}, set: {set} }}"
        )
    }
}

impl ConsumptionPlan {
    /// Build the plan for a single batch with a fresh fence.
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        Self::fenced(events, &mut InvalidationFence::default())
    }

    /// Build the plan for a batch, dropping events already seen by id and
    /// populations the fence refuses. Invalidations are recorded in the fence
    /// as they are planned.
    pub fn fenced(events: Vec<CacheEvent>, fence: &mut InvalidationFence) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events {
            if !seen_ids.insert(event.id) {
                continue;
            }
            if let EventKind::Populate { key, observed, .. } = &event.kind
                && !fence.admits(key, *observed)
            {
                debug!(
                    key = %key,
                    observed = *observed,
                    event_epoch = event.epoch,
                    "Dropping population read before a newer invalidation"
                );
                plan.stale_populates += 1;
                continue;
            }

            let actions = actions_for(event.kind);
            for action in &actions {
                fence.record(action, event.epoch);
            }
            plan.actions.extend(actions);
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

fn actions_for(kind: EventKind) -> Vec<CacheAction> {
    use CacheAction::*;

    match kind {
        EventKind::DishCreated {
            menu_id,
            submenu_id,
            ..
        } => vec![
            InvalidateExact(CacheKey::DishList {
                menu_id,
                submenu_id,
            }),
            InvalidateAggregate,
            InvalidateExact(CacheKey::Submenu {
                menu_id,
                submenu_id,
            }),
            InvalidateExact(CacheKey::SubmenuList { menu_id }),
            InvalidateExact(CacheKey::Menu { menu_id }),
            InvalidateExact(CacheKey::MenuList),
        ],
        EventKind::DishUpdated {
            menu_id,
            submenu_id,
            dish_id,
            snapshot,
        } => {
            let own = CacheKey::Dish {
                menu_id,
                submenu_id,
                dish_id,
            };
            let mut actions = vec![
                InvalidateExact(own.clone()),
                InvalidateExact(CacheKey::DishList {
                    menu_id,
                    submenu_id,
                }),
                InvalidateAggregate,
            ];
            repopulate(&mut actions, own, snapshot);
            actions
        }
        EventKind::DishDeleted {
            menu_id,
            submenu_id,
            dish_id,
        } => vec![
            InvalidateExact(CacheKey::Dish {
                menu_id,
                submenu_id,
                dish_id,
            }),
            InvalidateExact(CacheKey::DishList {
                menu_id,
                submenu_id,
            }),
            InvalidateAggregate,
            InvalidateExact(CacheKey::Submenu {
                menu_id,
                submenu_id,
            }),
            InvalidateExact(CacheKey::SubmenuList { menu_id }),
            InvalidateExact(CacheKey::Menu { menu_id }),
            InvalidateExact(CacheKey::MenuList),
        ],
        EventKind::SubmenuCreated { menu_id, .. } => vec![
            InvalidateExact(CacheKey::SubmenuList { menu_id }),
            InvalidateAggregate,
            InvalidateExact(CacheKey::Menu { menu_id }),
            InvalidateExact(CacheKey::MenuList),
        ],
        EventKind::SubmenuUpdated {
            menu_id,
            submenu_id,
            snapshot,
        } => {
            let own = CacheKey::Submenu {
                menu_id,
                submenu_id,
            };
            let mut actions = vec![
                InvalidateExact(own.clone()),
                InvalidateExact(CacheKey::SubmenuList { menu_id }),
                InvalidateAggregate,
            ];
            repopulate(&mut actions, own, snapshot);
            actions
        }
        EventKind::SubmenuDeleted {
            menu_id,
            submenu_id,
        } => vec![
            InvalidatePrefix(CacheKey::Submenu {
                menu_id,
                submenu_id,
            }),
            InvalidateExact(CacheKey::SubmenuList { menu_id }),
            InvalidateExact(CacheKey::Menu { menu_id }),
            InvalidateAggregate,
            InvalidateExact(CacheKey::MenuList),
        ],
        EventKind::MenuCreated { .. } => {
            vec![InvalidateExact(CacheKey::MenuList), InvalidateAggregate]
        }
        EventKind::MenuUpdated { menu_id, snapshot } => {
            let own = CacheKey::Menu { menu_id };
            let mut actions = vec![
                InvalidateExact(own.clone()),
                InvalidateExact(CacheKey::MenuList),
                InvalidateAggregate,
            ];
            repopulate(&mut actions, own, snapshot);
            actions
        }
        EventKind::MenuDeleted { menu_id } => vec![
            InvalidatePrefix(CacheKey::Menu { menu_id }),
            InvalidateExact(CacheKey::MenuList),
            InvalidateAggregate,
        ],
        EventKind::Populate { key, value, .. } => vec![Set { key, value }],
    }
}

fn repopulate(actions: &mut Vec<CacheAction>, key: CacheKey, snapshot: Option<Bytes>) {
    if let Some(value) = snapshot {
        actions.push(CacheAction::Set { key, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn plan_for(kind: EventKind) -> ConsumptionPlan {
        ConsumptionPlan::from_events(vec![CacheEvent::new(kind, 0)])
    }

    fn ids() -> (Uuid, Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn dish_created_refreshes_every_count_bearing_ancestor() {
        let (m, s, d) = ids();
        let plan = plan_for(EventKind::DishCreated {
            menu_id: m,
            submenu_id: s,
            dish_id: d,
        });

        assert_eq!(
            plan.actions,
            vec![
                CacheAction::InvalidateExact(CacheKey::DishList {
                    menu_id: m,
                    submenu_id: s
                }),
                CacheAction::InvalidateAggregate,
                CacheAction::InvalidateExact(CacheKey::Submenu {
                    menu_id: m,
                    submenu_id: s
                }),
                CacheAction::InvalidateExact(CacheKey::SubmenuList { menu_id: m }),
                CacheAction::InvalidateExact(CacheKey::Menu { menu_id: m }),
                CacheAction::InvalidateExact(CacheKey::MenuList),
            ]
        );
    }

    #[test]
    fn dish_updated_repopulates_own_key_last() {
        let (m, s, d) = ids();
        let snapshot = Bytes::from_static(b"{\"title\":\"Soup\"}");
        let plan = plan_for(EventKind::DishUpdated {
            menu_id: m,
            submenu_id: s,
            dish_id: d,
            snapshot: Some(snapshot.clone()),
        });

        let own = CacheKey::Dish {
            menu_id: m,
            submenu_id: s,
            dish_id: d,
        };
        assert_eq!(plan.actions[0], CacheAction::InvalidateExact(own.clone()));
        assert_eq!(
            plan.actions.last(),
            Some(&CacheAction::Set {
                key: own,
                value: snapshot
            })
        );
        assert!(plan.actions.contains(&CacheAction::InvalidateAggregate));
    }

    #[test]
    fn update_without_snapshot_only_invalidates() {
        let (m, _, _) = ids();
        let plan = plan_for(EventKind::MenuUpdated {
            menu_id: m,
            snapshot: None,
        });

        assert_eq!(plan.len(), 3);
        assert!(
            !plan
                .actions
                .iter()
                .any(|action| matches!(action, CacheAction::Set { .. }))
        );
    }

    #[test]
    fn submenu_deleted_drops_its_subtree_by_prefix() {
        let (m, s, _) = ids();
        let plan = plan_for(EventKind::SubmenuDeleted {
            menu_id: m,
            submenu_id: s,
        });

        assert_eq!(
            plan.actions[0],
            CacheAction::InvalidatePrefix(CacheKey::Submenu {
                menu_id: m,
                submenu_id: s
            })
        );
        assert!(
            plan.actions
                .contains(&CacheAction::InvalidateExact(CacheKey::Menu { menu_id: m }))
        );
        assert!(
            plan.actions
                .contains(&CacheAction::InvalidateExact(CacheKey::MenuList))
        );
    }

    #[test]
    fn menu_deleted_drops_its_subtree_by_prefix() {
        let (m, _, _) = ids();
        let plan = plan_for(EventKind::MenuDeleted { menu_id: m });

        assert_eq!(
            plan.actions,
            vec![
                CacheAction::InvalidatePrefix(CacheKey::Menu { menu_id: m }),
                CacheAction::InvalidateExact(CacheKey::MenuList),
                CacheAction::InvalidateAggregate,
            ]
        );
    }

    #[test]
    fn menu_created_touches_list_and_aggregate_only() {
        let (m, _, _) = ids();
        assert_eq!(
            plan_for(EventKind::MenuCreated { menu_id: m }).actions,
            vec![
                CacheAction::InvalidateExact(CacheKey::MenuList),
                CacheAction::InvalidateAggregate,
            ]
        );
    }

    #[test]
    fn every_mutation_invalidates_the_aggregate() {
        let (m, s, d) = ids();
        let mutations = [
            EventKind::MenuCreated { menu_id: m },
            EventKind::MenuUpdated {
                menu_id: m,
                snapshot: None,
            },
            EventKind::MenuDeleted { menu_id: m },
            EventKind::SubmenuCreated {
                menu_id: m,
                submenu_id: s,
            },
            EventKind::SubmenuUpdated {
                menu_id: m,
                submenu_id: s,
                snapshot: None,
            },
            EventKind::SubmenuDeleted {
                menu_id: m,
                submenu_id: s,
            },
            EventKind::DishCreated {
                menu_id: m,
                submenu_id: s,
                dish_id: d,
            },
            EventKind::DishUpdated {
                menu_id: m,
                submenu_id: s,
                dish_id: d,
                snapshot: None,
            },
            EventKind::DishDeleted {
                menu_id: m,
                submenu_id: s,
                dish_id: d,
            },
        ];

        for kind in mutations {
            let label = kind.label();
            assert!(
                plan_for(kind)
                    .actions
                    .contains(&CacheAction::InvalidateAggregate),
                "{label} must invalidate the aggregate"
            );
        }
    }

    #[test]
    fn populate_becomes_a_single_set() {
        let plan = plan_for(EventKind::Populate {
            key: CacheKey::MenuList,
            value: Bytes::from_static(b"[]"),
            observed: 0,
        });
        assert_eq!(
            plan.actions,
            vec![CacheAction::Set {
                key: CacheKey::MenuList,
                value: Bytes::from_static(b"[]"),
            }]
        );
    }

    #[test]
    fn dedupe_by_event_id_keeps_order() {
        let (m, _, _) = ids();
        let created = CacheEvent::new(EventKind::MenuCreated { menu_id: m }, 0);
        let deleted = CacheEvent::new(EventKind::MenuDeleted { menu_id: m }, 1);

        let plan =
            ConsumptionPlan::from_events(vec![created.clone(), created, deleted]);

        assert_eq!(plan.len(), 5);
        assert_eq!(
            plan.actions[0],
            CacheAction::InvalidateExact(CacheKey::MenuList)
        );
        assert_eq!(
            plan.actions[2],
            CacheAction::InvalidatePrefix(CacheKey::Menu { menu_id: m })
        );
    }

    #[test]
    fn display_format() {
        let (m, _, _) = ids();
        let plan = plan_for(EventKind::MenuDeleted { menu_id: m });
        let display = format!("{plan}");
        assert!(display.contains("ConsumptionPlan"));
        assert!(display.contains("prefix: 1"));
        assert!(ConsumptionPlan::default().is_empty());
    }

    fn populate(key: CacheKey, observed: Epoch) -> EventKind {
        EventKind::Populate {
            key,
            value: Bytes::from_static(b"[]"),
            observed,
        }
    }

    #[test]
    fn population_read_before_invalidation_is_dropped() {
        let (m, _, _) = ids();
        let mut fence = InvalidationFence::default();

        // Read observed epoch 3; a create landed at epoch 3 before the
        // population arrived.
        let created = CacheEvent::new(EventKind::MenuCreated { menu_id: m }, 3);
        let stale = CacheEvent::new(populate(CacheKey::MenuList, 3), 4);
        let plan = ConsumptionPlan::fenced(vec![created, stale], &mut fence);

        assert_eq!(plan.stale_populates, 1);
        assert!(
            !plan
                .actions
                .iter()
                .any(|action| matches!(action, CacheAction::Set { .. }))
        );
    }

    #[test]
    fn fence_spans_batches() {
        let (m, _, _) = ids();
        let mut fence = InvalidationFence::default();

        ConsumptionPlan::fenced(
            vec![CacheEvent::new(EventKind::MenuCreated { menu_id: m }, 5)],
            &mut fence,
        );
        let late = ConsumptionPlan::fenced(
            vec![CacheEvent::new(populate(CacheKey::FullTree, 2), 6)],
            &mut fence,
        );
        assert!(late.is_empty());

        let fresh = ConsumptionPlan::fenced(
            vec![CacheEvent::new(populate(CacheKey::FullTree, 6), 7)],
            &mut fence,
        );
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn prefix_invalidation_fences_nested_keys() {
        let (m, s, d) = ids();
        let mut fence = InvalidationFence::default();
        ConsumptionPlan::fenced(
            vec![CacheEvent::new(EventKind::MenuDeleted { menu_id: m }, 10)],
            &mut fence,
        );

        let nested = CacheKey::Dish {
            menu_id: m,
            submenu_id: s,
            dish_id: d,
        };
        assert!(!fence.admits(&nested, 9));
        assert!(fence.admits(&nested, 11));
        assert!(fence.admits(&CacheKey::Menu { menu_id: d }, 9));
    }

    #[test]
    fn unrelated_keys_are_admitted() {
        let (m, s, _) = ids();
        let mut fence = InvalidationFence::default();
        ConsumptionPlan::fenced(
            vec![CacheEvent::new(
                EventKind::DishCreated {
                    menu_id: m,
                    submenu_id: s,
                    dish_id: Uuid::nil(),
                },
                4,
            )],
            &mut fence,
        );

        assert!(fence.admits(&CacheKey::Menu { menu_id: s }, 0));
        assert!(!fence.admits(&CacheKey::Menu { menu_id: m }, 0));
    }

    #[test]
    fn evicted_entries_raise_the_floor() {
        let mut fence = InvalidationFence::with_capacity(NonZeroUsize::MIN);
        let (a, b, c) = ids();

        fence.record(&CacheAction::InvalidateExact(CacheKey::Menu { menu_id: a }), 1);
        fence.record(&CacheAction::InvalidateExact(CacheKey::Menu { menu_id: b }), 2);

        // `a` was pushed out; anything read at or before its epoch is refused.
        assert!(!fence.admits(&CacheKey::Menu { menu_id: c }, 1));
        assert!(fence.admits(&CacheKey::Menu { menu_id: c }, 2));
        assert!(!fence.admits(&CacheKey::Menu { menu_id: b }, 2));
    }
}
