//! Timezone-aware week calculator.
//!
//! Everything here works on the viewer's local week: Monday 00:00:00 to
//! Sunday 23:59:59 in the resolved IANA zone.  History records are stored
//! in UTC and converted to the viewer's zone before they are matched to a
//! calendar day, so a late-evening workout lands on the day the user
//! actually lived it.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::Result;
use crate::model::UserProfile;
use crate::storage::SqliteStore;

/// One day of the week strip shown on the home view.
#[derive(Debug, Clone, Serialize)]
pub struct WeekDay {
    /// Short weekday label, `Mon` through `Sun`.
    pub label: String,
    pub date: NaiveDate,
    pub is_today: bool,
    pub is_done: bool,
}

/// The resolved week window plus its seven day descriptors.
#[derive(Debug, Clone, Serialize)]
pub struct WeekSummary {
    /// Canonical name of the zone the week was computed in.
    pub timezone: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: Vec<WeekDay>,
}

/// Resolve the zone to compute a week in: the preferred zone if it parses,
/// then the configured fallback, then UTC.  Never errors; a mistyped zone
/// name degrades to the fallback chain.
pub fn resolve_timezone(preferred: Option<&str>, fallback: &str) -> Tz {
    if let Some(name) = preferred {
        match name.parse::<Tz>() {
            Ok(tz) => return tz,
            Err(_) => {
                tracing::warn!(zone = name, "unknown profile timezone, using fallback");
            }
        }
    }
    fallback.parse::<Tz>().unwrap_or(Tz::UTC)
}

/// The local week window containing `local_now`: Monday 00:00:00 inclusive
/// to `start + 7 days - 1 second`.  The bounds always span exactly
/// 7x24x3600 seconds of absolute time, DST transitions inside the week
/// included.
pub fn week_window(local_now: DateTime<Tz>) -> (DateTime<Tz>, DateTime<Tz>) {
    let offset = i64::from(local_now.weekday().num_days_from_monday());
    let monday = local_now.date_naive() - Duration::days(offset);
    let start = local_midnight(local_now.timezone(), monday);
    let end = start + Duration::days(7) - Duration::seconds(1);
    (start, end)
}

/// Seven day descriptors from the Monday of `local_now`'s week, flagged
/// against the set of calendar dates that have at least one history record.
pub fn week_days(local_now: DateTime<Tz>, done: &BTreeSet<NaiveDate>) -> Vec<WeekDay> {
    let today = local_now.date_naive();
    let offset = i64::from(local_now.weekday().num_days_from_monday());
    let monday = today - Duration::days(offset);

    (0..7)
        .map(|i| {
            let date = monday + Duration::days(i);
            WeekDay {
                label: date.format("%a").to_string(),
                date,
                is_today: date == today,
                is_done: done.contains(&date),
            }
        })
        .collect()
}

/// Assemble the week strip for the home view.
///
/// Anonymous viewers get the configured default zone and an all-clear
/// strip.  Authenticated viewers get their profile zone and done-flags
/// computed from their history within the window.
pub async fn week_summary(
    store: &SqliteStore,
    default_timezone: &str,
    viewer: Option<&UserProfile>,
) -> Result<WeekSummary> {
    week_summary_at(store, default_timezone, viewer, Utc::now()).await
}

/// Like [`week_summary`] with an explicit clock reading.
pub async fn week_summary_at(
    store: &SqliteStore,
    default_timezone: &str,
    viewer: Option<&UserProfile>,
    now: DateTime<Utc>,
) -> Result<WeekSummary> {
    let tz = resolve_timezone(viewer.map(|p| p.timezone.as_str()), default_timezone);
    let local_now = now.with_timezone(&tz);
    let (start, end) = week_window(local_now);

    let mut done = BTreeSet::new();
    if let Some(profile) = viewer {
        let records = store
            .history_between(
                profile.user_id,
                start.with_timezone(&Utc),
                end.with_timezone(&Utc),
            )
            .await?;
        for record in records {
            done.insert(record.performed_at.with_timezone(&tz).date_naive());
        }
    }

    Ok(WeekSummary {
        timezone: tz.name().to_string(),
        start: start.with_timezone(&Utc),
        end: end.with_timezone(&Utc),
        days: week_days(local_now, &done),
    })
}

/// UTC bounds of one local calendar day, inclusive on both ends: local
/// midnight to one second before the next day's midnight.  Used to turn
/// date-only filters into stored-timestamp ranges.
pub fn day_bounds(tz: Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(tz, date);
    let next = local_midnight(tz, date + Duration::days(1));
    (
        start.with_timezone(&Utc),
        (next - Duration::seconds(1)).with_timezone(&Utc),
    )
}

/// Midnight of `date` in `tz`.  Ambiguous midnights (a fall-back hour)
/// resolve to the earlier instant; skipped midnights (a spring-forward
/// jump) probe forward in 30-minute steps to the first instant that
/// exists on that day.
fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    let mut naive = date.and_time(NaiveTime::MIN);
    for _ in 0..8 {
        if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
            return dt;
        }
        naive += Duration::minutes(30);
    }
    tz.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{User, Workout, WorkoutHistory};
    use chrono::{Timelike, Weekday};

    fn madrid() -> Tz {
        "Europe/Madrid".parse().unwrap()
    }

    #[test]
    fn resolve_timezone_prefers_profile_zone() {
        let tz = resolve_timezone(Some("America/New_York"), "Europe/Madrid");
        assert_eq!(tz.name(), "America/New_York");
    }

    #[test]
    fn resolve_timezone_falls_back_on_garbage() {
        let tz = resolve_timezone(Some("Not/AZone"), "Europe/Madrid");
        assert_eq!(tz.name(), "Europe/Madrid");

        let tz = resolve_timezone(None, "Europe/Madrid");
        assert_eq!(tz.name(), "Europe/Madrid");

        let tz = resolve_timezone(Some("Not/AZone"), "also garbage");
        assert_eq!(tz, Tz::UTC);
    }

    #[test]
    fn week_window_starts_on_monday_midnight() {
        // A plain Wednesday afternoon, no DST nearby.
        let now = madrid().with_ymd_and_hms(2024, 1, 10, 15, 30, 0).unwrap();
        let (start, end) = week_window(now);

        assert_eq!(start.weekday(), Weekday::Mon);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!((start.hour(), start.minute(), start.second()), (0, 0, 0));
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
        assert_eq!((end.hour(), end.minute(), end.second()), (23, 59, 59));
        assert!(start <= now && now < end + Duration::seconds(1));
    }

    #[test]
    fn week_window_on_boundary_days() {
        // Monday maps to itself.
        let monday = madrid().with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        let (start, _) = week_window(monday);
        assert_eq!(start, monday);

        // Sunday reaches six days back.
        let sunday = madrid().with_ymd_and_hms(2024, 1, 14, 23, 59, 59).unwrap();
        let (start, end) = week_window(sunday);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(end, sunday);
    }

    #[test]
    fn week_window_spans_exactly_one_week_across_dst() {
        // Madrid springs forward on 2024-03-31, inside this window.
        let now = madrid().with_ymd_and_hms(2024, 4, 3, 12, 0, 0).unwrap();
        let (start, end) = week_window(now);

        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(
            end.signed_duration_since(start),
            Duration::days(7) - Duration::seconds(1)
        );

        // The fall-back week holds the same absolute span.
        let now = madrid().with_ymd_and_hms(2024, 10, 30, 12, 0, 0).unwrap();
        let (start, end) = week_window(now);
        assert_eq!(
            end.signed_duration_since(start),
            Duration::days(7) - Duration::seconds(1)
        );
    }

    #[test]
    fn local_midnight_picks_earlier_of_ambiguous() {
        // Havana falls back at 01:00 on 2024-11-03, so 00:00 happens twice.
        let havana: Tz = "America/Havana".parse().unwrap();
        let midnight = local_midnight(havana, NaiveDate::from_ymd_opt(2024, 11, 3).unwrap());
        // The earlier reading is still on daylight time (UTC-4).
        assert_eq!(
            midnight.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 11, 3, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn local_midnight_probes_past_skipped_hour() {
        // Santiago springs forward at 00:00 on 2024-09-08; midnight does
        // not exist and the day starts at 01:00.
        let santiago: Tz = "America/Santiago".parse().unwrap();
        let midnight = local_midnight(santiago, NaiveDate::from_ymd_opt(2024, 9, 8).unwrap());
        assert_eq!(midnight.hour(), 1);
        assert_eq!(
            midnight.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn day_bounds_covers_the_whole_local_day() {
        let ny: Tz = "America/New_York".parse().unwrap();
        let (start, end) = day_bounds(ny, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());

        // Tuesday in New York runs 05:00 UTC to 04:59:59 UTC next day.
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 9, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 10, 4, 59, 59).unwrap());

        // On a spring-forward day the local day is an hour short.
        let (start, end) = day_bounds(ny, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(
            end.signed_duration_since(start),
            Duration::hours(23) - Duration::seconds(1)
        );
    }

    #[test]
    fn week_days_labels_and_flags() {
        let now = madrid().with_ymd_and_hms(2024, 1, 10, 15, 30, 0).unwrap();
        let mut done = BTreeSet::new();
        done.insert(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        done.insert(NaiveDate::from_ymd_opt(2024, 1, 13).unwrap());

        let days = week_days(now, &done);
        assert_eq!(days.len(), 7);

        let labels: Vec<&str> = days.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);

        let todays: Vec<bool> = days.iter().map(|d| d.is_today).collect();
        assert_eq!(todays, vec![false, false, true, false, false, false, false]);

        let dones: Vec<bool> = days.iter().map(|d| d.is_done).collect();
        assert_eq!(dones, vec![false, true, false, false, false, true, false]);
    }

    #[tokio::test]
    async fn week_summary_converts_history_to_viewer_zone() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = User::new("ana".to_string());
        store.create_user(&user, "hash").await.unwrap();
        store
            .set_profile_timezone(user.id, "America/New_York")
            .await
            .unwrap();
        let profile = store.get_or_create_profile(user.id).await.unwrap();

        let workout = Workout::new("Leg Day".to_string());
        store.insert_workout(&workout).await.unwrap();

        // 02:30 UTC on Wednesday is 21:30 on Tuesday in New York.
        let performed = Utc.with_ymd_and_hms(2024, 1, 10, 2, 30, 0).unwrap();
        store
            .insert_history(&WorkoutHistory::new(user.id, workout.id, performed, 300))
            .await
            .unwrap();

        // Out-of-window record from the previous week stays invisible.
        let last_week = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        store
            .insert_history(&WorkoutHistory::new(user.id, workout.id, last_week, 300))
            .await
            .unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap();
        let summary = week_summary_at(&store, "Europe/Madrid", Some(&profile), now)
            .await
            .unwrap();

        assert_eq!(summary.timezone, "America/New_York");
        assert!(summary.days[1].is_done, "Tuesday should be marked done");
        assert!(!summary.days[2].is_done, "Wednesday has no local record");
        assert!(summary.days[2].is_today);
    }

    #[tokio::test]
    async fn week_summary_for_anonymous_viewer() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap();

        let summary = week_summary_at(&store, "Europe/Madrid", None, now)
            .await
            .unwrap();

        assert_eq!(summary.timezone, "Europe/Madrid");
        assert_eq!(summary.days.len(), 7);
        assert!(summary.days.iter().all(|d| !d.is_done));
        assert_eq!(summary.days.iter().filter(|d| d.is_today).count(), 1);
    }
}
