use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::event::EventId;
use crate::typedid::{TypedId, TypedIdMarker};
use crate::user::UserId;

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type AdvertisementId = TypedId<Advertisement>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Advertisement {
    #[serde(rename = "_id")]
    pub id: AdvertisementId,
    pub title: String,
    pub description: String,
    pub content: AdContent,
    pub targeting: Targeting,
    pub schedule: Schedule,
    pub metrics: Metrics,
    pub status: AdvertisementStatus,
    pub advertiser: UserId,
    pub budget: Budget,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl TypedIdMarker for Advertisement {
    fn kind() -> &'static str {
        "advertisement"
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AdContent {
    pub media_type: MediaType,
    pub url: String,
    pub thumbnail: Option<String>,
    pub call_to_action: Option<CallToAction>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Text,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CallToAction {
    pub label: String,
    pub url: String,
}

/// Who the ad is meant for. An empty list matches everyone on that
/// dimension.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Targeting {
    #[serde(default)]
    pub locations: Vec<String>,
    pub age_range: Option<AgeRange>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub events: Vec<EventId>,
}

impl Targeting {
    pub fn matches(&self, filter: &AdFilter) -> bool {
        let location_matches = match &filter.location {
            Some(location) => contains_ignore_case(&self.locations, location),
            None => true,
        };
        let interest_matches = match &filter.interest {
            Some(interest) => contains_ignore_case(&self.interests, interest),
            None => true,
        };
        let event_matches = match filter.event {
            Some(event) => self.events.is_empty() || self.events.contains(&event),
            None => true,
        };

        location_matches && interest_matches && event_matches
    }
}

fn contains_ignore_case(values: &[String], wanted: &str) -> bool {
    values.is_empty() || values.iter().any(|value| value.eq_ignore_ascii_case(wanted))
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Schedule {
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub time_windows: Vec<TimeWindow>,
}

impl Schedule {
    /// Whether `now` is inside the date range and, if any time windows are
    /// set, inside at least one of them.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        if now < self.start_date || now > self.end_date {
            return false;
        }

        let time = now.time();
        self.time_windows.is_empty() || self.time_windows.iter().any(|w| w.contains(time))
    }
}

/// A daily UTC time-of-day window. A window whose start is after its end
/// runs over midnight.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TimeWindow {
    #[serde(with = "crate::utils::hour_minute")]
    pub start: NaiveTime,
    #[serde(with = "crate::utils::hour_minute")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Metrics {
    pub views: u64,
    pub clicks: u64,
    /// Clicks per hundred views.
    pub engagement: f64,
}

impl Metrics {
    pub fn engagement_for(views: u64, clicks: u64) -> f64 {
        if views == 0 {
            0.0
        } else {
            clicks as f64 * 100.0 / views as f64
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Budget {
    pub total: f64,
    pub spent: f64,
    pub currency: String,
    pub cost_per_click: f64,
}

impl Budget {
    pub fn is_exhausted(&self) -> bool {
        self.spent >= self.total
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvertisementStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl AdvertisementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvertisementStatus::Draft => "draft",
            AdvertisementStatus::Active => "active",
            AdvertisementStatus::Paused => "paused",
            AdvertisementStatus::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AdFilter {
    pub location: Option<String>,
    pub event: Option<EventId>,
    pub interest: Option<String>,
}

impl Advertisement {
    /// Moves the ad to `to`, refusing to go back to draft or to activate an
    /// ad whose budget is spent.
    pub fn set_status(&mut self, to: AdvertisementStatus) -> Result<(), Error> {
        if to == AdvertisementStatus::Draft && self.status != AdvertisementStatus::Draft {
            return Err(Error::InvalidAdvertisementStatusTransition {
                advertisement_id: self.id,
                from: self.status,
                to,
            });
        }
        if to == AdvertisementStatus::Active && self.budget.is_exhausted() {
            return Err(Error::AdvertisementBudgetExhausted {
                advertisement_id: self.id,
            });
        }

        self.status = to;
        Ok(())
    }

    pub fn is_deliverable(&self, now: DateTime<Utc>, filter: &AdFilter) -> bool {
        self.status == AdvertisementStatus::Active
            && self.schedule.contains(now)
            && self.targeting.matches(filter)
    }

    pub fn record_view(&mut self) {
        self.metrics.views += 1;
        self.metrics.engagement = Metrics::engagement_for(self.metrics.views, self.metrics.clicks);
    }

    /// Counts the click and charges it to the budget. Returns true if this
    /// click used up the budget, in which case the ad is now completed.
    pub fn record_click(&mut self) -> bool {
        self.metrics.clicks += 1;
        self.metrics.engagement = Metrics::engagement_for(self.metrics.views, self.metrics.clicks);
        self.budget.spent = (self.budget.spent + self.budget.cost_per_click).min(self.budget.total);

        if self.budget.is_exhausted() {
            self.status = AdvertisementStatus::Completed;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::database::test::sample_advertisement;

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, hour, minute, 0).unwrap()
    }

    fn schedule_around(now: DateTime<Utc>, time_windows: Vec<TimeWindow>) -> Schedule {
        Schedule {
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            time_windows,
        }
    }

    #[test]
    fn time_window_within_a_day() {
        let window = TimeWindow {
            start: hm(9, 0),
            end: hm(17, 0),
        };

        assert!(window.contains(hm(9, 0)));
        assert!(window.contains(hm(12, 30)));
        assert!(window.contains(hm(17, 0)));
        assert!(!window.contains(hm(8, 59)));
        assert!(!window.contains(hm(17, 1)));
    }

    #[test]
    fn time_window_over_midnight() {
        let window = TimeWindow {
            start: hm(22, 0),
            end: hm(2, 0),
        };

        assert!(window.contains(hm(23, 15)));
        assert!(window.contains(hm(0, 0)));
        assert!(window.contains(hm(1, 59)));
        assert!(!window.contains(hm(2, 1)));
        assert!(!window.contains(hm(12, 0)));
    }

    #[test]
    fn schedule_requires_date_range_and_a_matching_window() {
        let now = at(12, 0);
        let lunch = TimeWindow {
            start: hm(11, 0),
            end: hm(14, 0),
        };
        let evening = TimeWindow {
            start: hm(18, 0),
            end: hm(22, 0),
        };

        assert!(schedule_around(now, vec![]).contains(now));
        assert!(schedule_around(now, vec![evening, lunch]).contains(now));
        assert!(!schedule_around(now, vec![evening]).contains(now));

        let expired = Schedule {
            start_date: now - Duration::days(3),
            end_date: now - Duration::days(1),
            time_windows: vec![],
        };
        assert!(!expired.contains(now));

        let upcoming = Schedule {
            start_date: now + Duration::hours(1),
            end_date: now + Duration::days(1),
            time_windows: vec![],
        };
        assert!(!upcoming.contains(now));
    }

    #[test]
    fn empty_targeting_matches_any_filter() {
        let filter = AdFilter {
            location: Some("Berlin".into()),
            event: Some(EventId::new()),
            interest: Some("music".into()),
        };

        assert!(Targeting::default().matches(&filter));
    }

    #[test]
    fn targeting_matches_case_insensitively() {
        let event = EventId::new();
        let targeting = Targeting {
            locations: vec!["Berlin".into(), "Hamburg".into()],
            age_range: None,
            interests: vec!["Food".into()],
            events: vec![event],
        };

        let matching = AdFilter {
            location: Some("berlin".into()),
            event: Some(event),
            interest: Some("food".into()),
        };
        assert!(targeting.matches(&matching));

        let elsewhere = AdFilter {
            location: Some("Munich".into()),
            ..Default::default()
        };
        assert!(!targeting.matches(&elsewhere));

        let other_event = AdFilter {
            event: Some(EventId::new()),
            ..Default::default()
        };
        assert!(!targeting.matches(&other_event));
    }

    #[test]
    fn only_active_ads_are_deliverable() {
        let now = Utc::now();
        let mut ad = sample_advertisement(UserId::new());
        ad.schedule = schedule_around(now, vec![]);

        assert!(ad.is_deliverable(now, &AdFilter::default()));

        ad.status = AdvertisementStatus::Paused;
        assert!(!ad.is_deliverable(now, &AdFilter::default()));
    }

    #[test]
    fn engagement_is_clicks_per_hundred_views() {
        assert_eq!(Metrics::engagement_for(0, 0), 0.0);
        assert_eq!(Metrics::engagement_for(0, 3), 0.0);
        assert_eq!(Metrics::engagement_for(200, 5), 2.5);
    }

    #[test]
    fn click_charges_budget_and_recomputes_engagement() {
        let mut ad = sample_advertisement(UserId::new());
        ad.metrics = Metrics {
            views: 10,
            clicks: 1,
            engagement: 10.0,
        };
        ad.budget.total = 100.0;
        ad.budget.spent = 0.0;
        ad.budget.cost_per_click = 0.5;

        let exhausted = ad.record_click();

        assert!(!exhausted);
        assert_eq!(ad.metrics.clicks, 2);
        assert_eq!(ad.metrics.engagement, 20.0);
        assert_eq!(ad.budget.spent, 0.5);
        assert_eq!(ad.status, AdvertisementStatus::Active);
    }

    #[test]
    fn final_click_caps_spend_and_completes_the_ad() {
        let mut ad = sample_advertisement(UserId::new());
        ad.budget.total = 10.0;
        ad.budget.spent = 9.75;
        ad.budget.cost_per_click = 0.5;

        let exhausted = ad.record_click();

        assert!(exhausted);
        assert_eq!(ad.budget.spent, 10.0);
        assert_eq!(ad.status, AdvertisementStatus::Completed);
    }

    #[test]
    fn exhausted_ads_cannot_be_activated() {
        let mut ad = sample_advertisement(UserId::new());
        ad.status = AdvertisementStatus::Paused;
        ad.budget.spent = ad.budget.total;

        assert_eq!(
            ad.set_status(AdvertisementStatus::Active).unwrap_err(),
            Error::AdvertisementBudgetExhausted {
                advertisement_id: ad.id
            }
        );
    }

    #[test]
    fn ads_cannot_return_to_draft() {
        let mut ad = sample_advertisement(UserId::new());
        ad.status = AdvertisementStatus::Paused;

        assert_eq!(
            ad.set_status(AdvertisementStatus::Draft).unwrap_err(),
            Error::InvalidAdvertisementStatusTransition {
                advertisement_id: ad.id,
                from: AdvertisementStatus::Paused,
                to: AdvertisementStatus::Draft,
            }
        );
        assert!(ad.set_status(AdvertisementStatus::Active).is_ok());
    }
}
