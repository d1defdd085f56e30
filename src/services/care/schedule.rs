// Watering reminder schedule for calendar widgets

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use super::{CareFrequency, PlantCare};

/// Calendar recurrence rule for a watering frequency.
///
/// Reminders fall on Wednesdays; an unknown frequency waters twice a week.
pub fn recurrence_rule(frequency: Option<CareFrequency>) -> &'static str {
    match frequency {
        Some(CareFrequency::Weekly) => "RRULE:FREQ=WEEKLY;INTERVAL=1;WKST=MO;BYDAY=WE",
        Some(CareFrequency::Fortnightly) => "RRULE:FREQ=WEEKLY;INTERVAL=2;WKST=MO;BYDAY=WE",
        Some(CareFrequency::Monthly) => "RRULE:FREQ=MONTHLY;INTERVAL=1;WKST=MO;BYDAY=WE",
        None => "RRULE:FREQ=WEEKLY;INTERVAL=1;WKST=MO;BYDAY=WE,FR",
    }
}

/// First Wednesday strictly after `today`
pub fn next_wednesday(today: NaiveDate) -> NaiveDate {
    let today_idx = today.weekday().num_days_from_monday() as i64;
    let wednesday_idx = Weekday::Wed.num_days_from_monday() as i64;
    let mut days = (wednesday_idx - today_idx).rem_euclid(7);
    if days == 0 {
        days = 7;
    }
    today + Duration::days(days)
}

/// Recurring reminder built from extracted care instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderSchedule {
    pub start_date: NaiveDate,
    pub recurrence: String,
    pub title: String,
    pub description: String,
    pub location: String,
}

impl ReminderSchedule {
    pub fn for_care(care: &PlantCare, label_text: &str, today: NaiveDate) -> Self {
        let description = if care.fertiliser.is_empty() {
            label_text.to_string()
        } else {
            let periods: Vec<String> = care.fertiliser.iter().map(|p| p.to_string()).collect();
            format!(
                "Fertilise your {} plant as per schedule: {}.\n{}",
                care.name,
                periods.join(", "),
                label_text
            )
        };

        Self {
            start_date: next_wednesday(today),
            recurrence: recurrence_rule(care.watering_frequency).to_string(),
            title: format!("[Reminder] Water and Fertilise your {} plant", care.name),
            description,
            location: "Garden".to_string(),
        }
    }
}
