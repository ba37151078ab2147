use jiff::Timestamp;
use uuid::Uuid;

use crate::models::deadline::{Deadline, DeadlineOwner};

/// An entity that owns a current deadline and the history of deadlines behind it.
///
/// Implemented by projects and milestones. The owner reference decides which
/// kind of deadline record gets created on reconciliation.
pub trait Schedulable {
    fn deadline_owner(&self) -> DeadlineOwner;
    fn set_start(&mut self, start: Timestamp);
    fn last_deadline(&self) -> Option<Timestamp>;
    fn set_last_deadline(&mut self, due: Option<Timestamp>);
    fn deadlines(&self) -> &[Deadline];
    fn deadlines_mut(&mut self) -> &mut Vec<Deadline>;
}

/// Which branch a reconciliation took, plus the history delta it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No end supplied: the current deadline was cleared, history kept as is
    Cleared,
    /// End equals the current deadline: history untouched
    Unchanged,
    /// End moved later (or was unset): one record appended
    Extended { added: Uuid },
    /// End moved earlier: later records dropped, one record appended
    PulledIn { added: Uuid, removed: Vec<Deadline> },
}

impl Reconciliation {
    pub fn added(&self) -> Option<Uuid> {
        match self {
            Reconciliation::Extended { added } | Reconciliation::PulledIn { added, .. } => {
                Some(*added)
            }
            Reconciliation::Cleared | Reconciliation::Unchanged => None,
        }
    }

    pub fn removed(&self) -> &[Deadline] {
        match self {
            Reconciliation::PulledIn { removed, .. } => removed,
            _ => &[],
        }
    }
}

/// Moves an entity's time period and recomputes its deadline history.
///
/// The start is always overwritten. The end is compared against the current
/// deadline with strict inequalities, so an equal end leaves history alone.
/// Clearing the end keeps every past record, including ones that now look
/// like future deadlines. No ordering between start and end is enforced.
pub fn reconcile<E: Schedulable + ?Sized>(
    entity: &mut E,
    new_start: Timestamp,
    new_end: Option<Timestamp>,
    reason: &str,
) -> Reconciliation {
    entity.set_start(new_start);

    let Some(new_end) = new_end else {
        entity.set_last_deadline(None);
        return Reconciliation::Cleared;
    };

    match entity.last_deadline() {
        None => Reconciliation::Extended {
            added: push_deadline(entity, new_end, reason),
        },
        Some(current) if new_end > current => Reconciliation::Extended {
            added: push_deadline(entity, new_end, reason),
        },
        Some(current) if new_end < current => {
            let (kept, removed): (Vec<Deadline>, Vec<Deadline>) =
                std::mem::take(entity.deadlines_mut())
                    .into_iter()
                    .partition(|deadline| deadline.due() <= new_end);
            *entity.deadlines_mut() = kept;

            let added = push_deadline(entity, new_end, reason);
            Reconciliation::PulledIn { added, removed }
        }
        Some(_) => Reconciliation::Unchanged,
    }
}

fn push_deadline<E: Schedulable + ?Sized>(entity: &mut E, due: Timestamp, reason: &str) -> Uuid {
    let deadline = Deadline::for_owner(entity.deadline_owner(), due, reason);
    let id = deadline.id();
    entity.set_last_deadline(Some(due));
    entity.deadlines_mut().push(deadline);
    id
}
