//! Progress view
//!
//! Slider values and labels derived from one progress record.

use crate::core::types::ProgressRecord;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressView {
    /// Completed share of all steps, 0-100
    pub steps_percent: u32,

    /// Progress of the current step, 0-100
    pub current_percent: u32,

    /// `NUMBER OF STEPS(c/n)`; `None` leaves the label as it is
    pub steps_label: Option<String>,

    /// `CURRENT STEP(p%)`; `None` leaves the label as it is
    pub percent_label: Option<String>,
}

impl ProgressView {
    /// Compute the view for a record
    ///
    /// Without a known step count both sliders reset to 0 and the labels
    /// stay untouched. Slider values are capped at 100; labels show the
    /// values as received.
    pub fn from_record(record: &ProgressRecord) -> Self {
        let total = record.total_steps();
        if total == 0 {
            return Self::default();
        }

        let current = record.current_step();
        let steps_percent = (u64::from(current) * 100 / u64::from(total)).min(100) as u32;
        Self {
            steps_percent,
            current_percent: record.current_percent().min(100),
            steps_label: Some(format!("NUMBER OF STEPS({}/{})", current, total)),
            percent_label: Some(format!("CURRENT STEP({}%)", record.current_percent())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UpdateStatus;

    #[test]
    fn test_view_with_known_steps() {
        let record = ProgressRecord::new(UpdateStatus::Progress).with_steps(2, 4).with_percent(50);
        let view = ProgressView::from_record(&record);

        assert_eq!(view.steps_percent, 50);
        assert_eq!(view.current_percent, 50);
        assert_eq!(view.steps_label.as_deref(), Some("NUMBER OF STEPS(2/4)"));
        assert_eq!(view.percent_label.as_deref(), Some("CURRENT STEP(50%)"));
    }

    #[test]
    fn test_view_rounds_down() {
        let record = ProgressRecord::new(UpdateStatus::Run).with_steps(1, 3);
        assert_eq!(ProgressView::from_record(&record).steps_percent, 33);
    }

    #[test]
    fn test_view_caps_out_of_range_values() {
        let mut bytes = ProgressRecord::new(UpdateStatus::Progress).to_bytes();
        bytes[8..12].copy_from_slice(&6u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&4u32.to_le_bytes());
        bytes[16..20].copy_from_slice(&180u32.to_le_bytes());
        let record = ProgressRecord::from_bytes(&bytes).unwrap();

        let view = ProgressView::from_record(&record);
        assert_eq!(view.steps_percent, 100);
        assert_eq!(view.current_percent, 100);
        assert_eq!(view.steps_label.as_deref(), Some("NUMBER OF STEPS(6/4)"));
        assert_eq!(view.percent_label.as_deref(), Some("CURRENT STEP(180%)"));
    }

    #[test]
    fn test_view_without_steps_resets_sliders() {
        let record = ProgressRecord::new(UpdateStatus::Download).with_percent(70);
        let view = ProgressView::from_record(&record);

        assert_eq!(view, ProgressView::default());
        assert_eq!(view.current_percent, 0);
        assert!(view.steps_label.is_none());
    }
}
