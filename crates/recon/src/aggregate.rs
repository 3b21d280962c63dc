use std::collections::BTreeMap;

use splitgrid_core::{split_shared, CategoryMap, ExpenseRecord, OwnerId, Period, SharingMode};

use crate::error::SyncError;
use crate::model::{Aggregates, CategoryTotals};

/// Reduce a snapshot to per-category totals for `owner`'s cycle.
///
/// Only records created inside `period` count. Every mapped category gets
/// an entry, zero when nothing backs it, so stale cells get overwritten.
/// Shared records are halved with the odd cent going to whoever entered
/// the expense.
pub fn aggregate_records(
    records: &[ExpenseRecord],
    categories: &CategoryMap,
    owner: &OwnerId,
    partner: &OwnerId,
    period: Period,
) -> Result<Aggregates, SyncError> {
    let mut totals: BTreeMap<String, CategoryTotals> = categories
        .categories()
        .map(|c| (c.to_string(), CategoryTotals::default()))
        .collect();

    for record in records.iter().filter(|r| period.contains(r.created_at)) {
        let entry = totals
            .get_mut(&record.category)
            .ok_or_else(|| SyncError::UnknownCategory(record.category.clone()))?;

        if record.amount_cents < 0 {
            return Err(SyncError::InvalidAmount {
                record_id: record.id.clone(),
                amount_cents: record.amount_cents,
            });
        }

        let by_owner = &record.owner_id == owner;
        let by_partner = &record.owner_id == partner;
        if !by_owner && !by_partner {
            return Err(SyncError::UnknownOwner(record.owner_id.to_string()));
        }

        let overflow = || SyncError::InvalidAmount {
            record_id: record.id.clone(),
            amount_cents: record.amount_cents,
        };
        match record.sharing_mode {
            SharingMode::Personal if by_owner => {
                add(&mut entry.personal_cents, record.amount_cents).ok_or_else(overflow)?
            }
            SharingMode::Personal => {
                add(&mut entry.partner_personal_cents, record.amount_cents).ok_or_else(overflow)?
            }
            SharingMode::Shared => {
                let (initiator, other) = split_shared(record.amount_cents);
                let (mine, theirs) = if by_owner { (initiator, other) } else { (other, initiator) };
                add(&mut entry.shared_cents, mine).ok_or_else(overflow)?;
                add(&mut entry.partner_shared_cents, theirs).ok_or_else(overflow)?;
            }
        }
        // Cell values are personal + shared; they must fit too.
        if entry.personal_cents.checked_add(entry.shared_cents).is_none()
            || entry.partner_personal_cents.checked_add(entry.partner_shared_cents).is_none()
        {
            return Err(overflow());
        }
    }

    Ok(Aggregates {
        owner: owner.clone(),
        partner: partner.clone(),
        period,
        category_version: categories.version(),
        totals,
    })
}

fn add(total: &mut i64, cents: i64) -> Option<()> {
    *total = total.checked_add(cents)?;
    Some(())
}
