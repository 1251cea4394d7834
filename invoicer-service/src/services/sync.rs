//! Reconciliation planning for an invoice's nested collections.
//!
//! Both the item list and the tax list follow the same rules: a submitted
//! record whose id matches an existing member overwrites it, a record without
//! an id (or with an unknown one) becomes a new member, and existing members
//! no submitted record referenced are deleted. The plan preserves submitted
//! order because line items drive stock bookkeeping one at a time.

use uuid::Uuid;

/// One step of a nested-collection sync, in submitted order.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction<T> {
    /// Overwrite the existing member with this id.
    Update { id: Uuid, record: T },
    /// Create a new member owned by the same invoice.
    Create { record: T },
}

/// Full reconciliation plan: actions in submitted order, then deletions of
/// every existing member the submission did not reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan<T> {
    pub actions: Vec<SyncAction<T>>,
    pub delete_ids: Vec<Uuid>,
}

/// Plan the reconciliation of `submitted` against `existing_ids`.
///
/// A submitted id that does not match any existing member falls back to a
/// create rather than failing, matching how the collection treats records
/// without an id at all.
pub fn plan<T>(
    existing_ids: &[Uuid],
    submitted: Vec<T>,
    id_of: impl Fn(&T) -> Option<Uuid>,
) -> SyncPlan<T> {
    let mut referenced: Vec<Uuid> = Vec::new();
    let mut actions = Vec::with_capacity(submitted.len());

    for record in submitted {
        match id_of(&record).filter(|id| existing_ids.contains(id)) {
            Some(id) => {
                referenced.push(id);
                actions.push(SyncAction::Update { id, record });
            }
            None => actions.push(SyncAction::Create { record }),
        }
    }

    let delete_ids = existing_ids
        .iter()
        .filter(|id| !referenced.contains(id))
        .copied()
        .collect();

    SyncPlan {
        actions,
        delete_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Submitted {
        id: Option<Uuid>,
        quantity: i32,
    }

    fn submitted(id: Option<Uuid>, quantity: i32) -> Submitted {
        Submitted { id, quantity }
    }

    #[test]
    fn matching_id_updates_unknown_creates_missing_deletes() {
        let kept = Uuid::new_v4();
        let dropped = Uuid::new_v4();

        let plan = plan(
            &[kept, dropped],
            vec![submitted(Some(kept), 3), submitted(None, 2)],
            |s| s.id,
        );

        assert_eq!(plan.actions.len(), 2);
        assert_eq!(
            plan.actions[0],
            SyncAction::Update {
                id: kept,
                record: submitted(Some(kept), 3)
            }
        );
        assert_eq!(
            plan.actions[1],
            SyncAction::Create {
                record: submitted(None, 2)
            }
        );
        assert_eq!(plan.delete_ids, vec![dropped]);
    }

    #[test]
    fn unknown_id_falls_back_to_create() {
        let existing = Uuid::new_v4();
        let plan = plan(&[existing], vec![submitted(Some(Uuid::new_v4()), 1)], |s| {
            s.id
        });

        assert!(matches!(plan.actions[0], SyncAction::Create { .. }));
        assert_eq!(plan.delete_ids, vec![existing]);
    }

    #[test]
    fn empty_submission_deletes_everything() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let plan = plan(&[a, b], Vec::<Submitted>::new(), |s| s.id);

        assert!(plan.actions.is_empty());
        assert_eq!(plan.delete_ids, vec![a, b]);
    }

    #[test]
    fn submitted_order_does_not_change_the_final_set() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let forward = vec![submitted(Some(a), 1), submitted(Some(b), 2)];
        let mut reversed = forward.clone();
        reversed.reverse();

        let first = plan(&[a, b], forward, |s| s.id);
        let second = plan(&[a, b], reversed, |s| s.id);

        let ids = |p: &SyncPlan<Submitted>| {
            let mut ids: Vec<_> = p
                .actions
                .iter()
                .filter_map(|a| match a {
                    SyncAction::Update { id, .. } => Some(*id),
                    SyncAction::Create { .. } => None,
                })
                .collect();
            ids.sort();
            ids
        };

        assert_eq!(ids(&first), ids(&second));
        assert!(first.delete_ids.is_empty());
        assert!(second.delete_ids.is_empty());
    }
}
