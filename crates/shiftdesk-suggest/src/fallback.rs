//! Deterministic single-slot pick used when the generator can't answer.

use chrono::NaiveDateTime;

/// Least-recently-scheduled employee; never-scheduled first, ties by id.
pub fn least_recently_scheduled<'a, I>(candidates: I) -> Option<(&'a str, Option<NaiveDateTime>)>
where
    I: IntoIterator<Item = (&'a str, Option<NaiveDateTime>)>,
{
    // `None < Some(_)`, so employees without history sort first
    candidates
        .into_iter()
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
}

pub fn fallback_reason(last_end: Option<NaiveDateTime>) -> String {
    match last_end {
        Some(t) => format!(
            "least recently scheduled (last shift ended {})",
            t.format("%Y-%m-%d %H:%M")
        ),
        None => "least recently scheduled (no previous shifts)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftdesk_core::types::parse_datetime;

    #[test]
    fn test_ordering() {
        let t = |s: &str| Some(parse_datetime(s).unwrap());
        let picked = least_recently_scheduled(vec![
            ("e3", t("2024-06-01T17:00")),
            ("e1", t("2024-06-02T17:00")),
            ("e2", t("2024-06-01T17:00")),
        ]);
        assert_eq!(picked.map(|p| p.0), Some("e2"));

        let fresh = least_recently_scheduled(vec![("e9", None), ("e1", t("2024-05-01T09:00"))]);
        assert_eq!(fresh, Some(("e9", None)));

        assert_eq!(least_recently_scheduled(Vec::new()), None);
    }

    #[test]
    fn test_reason_text() {
        assert!(fallback_reason(None).contains("no previous shifts"));
        let t = parse_datetime("2024-06-01T17:00").unwrap();
        assert!(fallback_reason(Some(t)).contains("2024-06-01 17:00"));
    }
}
