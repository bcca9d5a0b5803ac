use std::collections::BTreeMap;

use serde::Serialize;

use crate::services::db_models::Guest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total: i64,
    pub confirmed: i64,
    pub pending: i64,
    pub need_transport: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub confirmed: i64,
    pub pending: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportStats {
    pub need_transport: i64,
    pub no_transport: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllergyCount {
    pub allergies: String,
    pub count: i64,
}

pub fn overall(guests: &[Guest]) -> OverallStats {
    let mut stats = OverallStats {
        total: 0,
        confirmed: 0,
        pending: 0,
        need_transport: 0,
    };
    for guest in guests {
        stats.total += 1;
        if guest.attending {
            stats.confirmed += 1;
        } else {
            stats.pending += 1;
        }
        if guest.needs_transport {
            stats.need_transport += 1;
        }
    }
    stats
}

pub fn by_attendance(guests: &[Guest]) -> AttendanceStats {
    let confirmed = guests.iter().filter(|g| g.attending).count() as i64;
    AttendanceStats {
        confirmed,
        pending: guests.len() as i64 - confirmed,
    }
}

pub fn by_transport(guests: &[Guest]) -> TransportStats {
    let need = guests.iter().filter(|g| g.needs_transport).count() as i64;
    TransportStats {
        need_transport: need,
        no_transport: guests.len() as i64 - need,
    }
}

/// Groups by the exact allergy text; empty and absent values are excluded
/// and no normalization is applied. Output is ordered by allergy text.
pub fn by_allergy(guests: &[Guest]) -> Vec<AllergyCount> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for guest in guests {
        if let Some(allergy) = guest.allergies.as_deref() {
            if !allergy.is_empty() {
                *counts.entry(allergy).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .map(|(allergies, count)| AllergyCount {
            allergies: allergies.to_owned(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(attending: bool, needs_transport: bool, allergies: Option<&str>) -> Guest {
        let epoch = chrono::DateTime::from_timestamp(0, 0).unwrap().naive_utc();
        Guest {
            id: 0,
            name: "g".to_owned(),
            email: None,
            phone: None,
            attending,
            meal_type: "normal".to_owned(),
            needs_transport,
            allergies: allergies.map(str::to_owned),
            notes: None,
            table_id: None,
            table_name: None,
            created_at: epoch,
            updated_at: epoch,
        }
    }

    #[test]
    fn overall_counts_attendance_and_transport_in_one_pass() {
        let guests = vec![
            guest(true, true, None),
            guest(true, false, None),
            guest(false, false, None),
        ];
        assert_eq!(
            overall(&guests),
            OverallStats {
                total: 3,
                confirmed: 2,
                pending: 1,
                need_transport: 1,
            }
        );
    }

    #[test]
    fn attendance_and_transport_splits_cover_all_guests() {
        let guests = vec![
            guest(true, true, None),
            guest(false, true, None),
            guest(false, false, None),
        ];
        assert_eq!(
            by_attendance(&guests),
            AttendanceStats {
                confirmed: 1,
                pending: 2,
            }
        );
        assert_eq!(
            by_transport(&guests),
            TransportStats {
                need_transport: 2,
                no_transport: 1,
            }
        );
    }

    #[test]
    fn allergy_groups_exclude_absent_and_empty_values() {
        let guests = vec![
            guest(true, false, Some("Gluten")),
            guest(false, false, Some("Gluten")),
            guest(true, false, None),
            guest(true, false, Some("")),
        ];
        assert_eq!(
            by_allergy(&guests),
            vec![AllergyCount {
                allergies: "Gluten".to_owned(),
                count: 2,
            }]
        );
    }

    #[test]
    fn allergy_grouping_is_exact_text_match() {
        let guests = vec![
            guest(true, false, Some("Gluten")),
            guest(true, false, Some("gluten")),
        ];
        let groups = by_allergy(&guests);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn empty_guest_list_aggregates_to_zeroes() {
        assert_eq!(
            overall(&[]),
            OverallStats {
                total: 0,
                confirmed: 0,
                pending: 0,
                need_transport: 0,
            }
        );
        assert!(by_allergy(&[]).is_empty());
    }
}
