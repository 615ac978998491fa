use crate::slots::Slot;

pub const SUBJECT: &str = "New appointments available!";
const HEADER: &str = "New appointments found:";

/// A rendered message about newly opened slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(subject: &str, body: &str) -> Self {
        Self {
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    /// Plain-text summary with one line per slot followed by a link to
    /// the booking page.
    pub fn for_slots(slots: &[Slot], booking_url: &str) -> Self {
        let mut body = format!("{}\n\n", HEADER);
        for slot in slots {
            body.push_str(&format!("- {}\n", slot));
        }
        body.push_str(&format!("\nBook at: {}\n", booking_url));

        Self::new(SUBJECT, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_body_lists_each_slot() {
        let date = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
        let slots = vec![
            Slot::new(date(15), "10:00 am – 10:30 am", 2),
            Slot::day(date(18), true),
        ];

        let notification = Notification::for_slots(&slots, "https://example.com/book");

        assert_eq!(notification.subject, "New appointments available!");
        assert_eq!(
            notification.body,
            "New appointments found:\n\n\
             - 2024-05-15 at 10:00 am – 10:30 am (2 spaces available)\n\
             - 2024-05-18\n\
             \nBook at: https://example.com/book\n"
        );
    }
}
