//! Recurring-series fan-out.
//!
//! The remote model groups a repeating sequence as one master plus
//! date-keyed instances; the local store keeps single-instance records.
//! A master found during enumeration suspends incremental filtering and the
//! occurrence window is walked day by day, yielding each instance as it is
//! encountered. Windows can span months, so nothing precomputes the set.

use chrono::{Datelike, Days, NaiveDate};

use grpsync_core::{
    Freq, LocalItem, RecurrenceRule, RemoteId, RemoteItem, SyncAction, SyncState,
};

/// Whether the rule produces an occurrence on `day`.
fn falls_on(rule: &RecurrenceRule, series_start: NaiveDate, day: NaiveDate) -> bool {
    if day < series_start {
        return false;
    }
    if rule.until.is_some_and(|until| day > until) {
        return false;
    }
    let interval = i64::from(rule.interval.max(1));
    match rule.freq {
        Freq::Daily => (day - series_start).num_days() % interval == 0,
        Freq::Weekly => {
            let days = (day - series_start).num_days();
            days % 7 == 0 && (days / 7) % interval == 0
        }
        Freq::Monthly => {
            if day.day() != series_start.day() {
                return false;
            }
            let months = i64::from(day.year() - series_start.year()) * 12
                + i64::from(day.month()) - i64::from(series_start.month());
            months % interval == 0
        }
    }
}

/// Lazy day-by-day walk of a rule's occurrences within `[from, to)`.
pub struct Occurrences {
    rule: RecurrenceRule,
    series_start: NaiveDate,
    cursor: NaiveDate,
    /// Exclusive upper bound.
    end: NaiveDate,
}

impl Occurrences {
    pub fn new(rule: RecurrenceRule, series_start: NaiveDate, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            rule,
            series_start,
            cursor: from.max(series_start),
            end: to,
        }
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while self.cursor < self.end {
            let day = self.cursor;
            self.cursor = self.cursor.checked_add_days(Days::new(1))?;
            if self.rule.until.is_some_and(|until| day > until) {
                return None;
            }
            if falls_on(&self.rule, self.series_start, day) {
                return Some(day);
            }
        }
        None
    }
}

/// Lazy expansion of a series master into per-date instances.
///
/// Each yielded item carries a composite identity (`base@date`), action
/// `Repeat`, and start/end shifted to the occurrence date with the master's
/// time of day preserved.
pub struct SeriesExpansion {
    master: RemoteItem,
    occurrences: Occurrences,
}

impl SeriesExpansion {
    /// `None` when the item is not a recurring master.
    pub fn new(master: RemoteItem, from: NaiveDate, to: NaiveDate) -> Option<Self> {
        if !master.is_recurring_master() {
            return None;
        }
        let appt = master.appointment()?;
        let rule = appt.recurrence.clone()?;
        let series_start = appt.start.map(|dt| dt.date_naive()).unwrap_or(from);
        Some(Self {
            occurrences: Occurrences::new(rule, series_start, from, to),
            master,
        })
    }
}

impl Iterator for SeriesExpansion {
    type Item = RemoteItem;

    fn next(&mut self) -> Option<RemoteItem> {
        let date = self.occurrences.next()?;
        let mut instance = self.master.clone();
        instance.remote_id = RemoteId::instance(self.master.remote_id.id.clone(), date);
        instance.action = SyncAction::Repeat;
        instance.state = self.master.state;
        if let Some(appt) = instance.appointment_mut() {
            appt.is_master = false;
            appt.recurrence = None;
            if let Some(start) = appt.start {
                let shifted = date.and_time(start.time()).and_utc();
                let duration = appt.end.map(|end| end - start);
                appt.start = Some(shifted);
                appt.end = duration.map(|d| shifted + d);
            }
        }
        Some(instance)
    }
}

/// Retire the single-instance representation of an item that became a
/// repeating series.
///
/// Every record of the old aggregate is marked for deletion; the incoming
/// instances recreate the item under composite identities. Records already
/// marked are left alone, so repeated application changes nothing.
pub fn supersede_single_instance(aggregate: &mut LocalItem) {
    for entity in aggregate.entities_mut() {
        if entity.state != SyncState::Deleted {
            entity.state = SyncState::Deleted;
            entity.action = SyncAction::Delete;
        }
    }
}
