use std::collections::BTreeSet;

use broomwagon_core::roster::{Roster, WeekId};
use broomwagon_core::rotation::{allocate, rotation_offset};
use chrono::NaiveDate;

fn roster_of(k: usize) -> Roster {
    Roster::new((0..k).map(|i| format!("driver-{i}"))).unwrap()
}

#[test]
fn plans_cover_all_rows_with_near_equal_shares() {
    for k in 1..=7 {
        let roster = roster_of(k);
        for n in 0..=40 {
            for offset in 0..(2 * k) {
                let plan = allocate(n, &roster, offset);
                let sizes = plan.sizes();
                assert_eq!(sizes.iter().sum::<usize>(), n, "n={n} k={k} r={offset}");
                assert!(
                    sizes.iter().all(|&s| s == n / k || s == n / k + 1),
                    "n={n} k={k} r={offset}: {sizes:?}"
                );

                let mut next = 0;
                for a in &plan.assignments {
                    assert_eq!(a.rows.start, next, "ranges are contiguous");
                    next = a.rows.end;
                }
                assert_eq!(next, n);
            }
        }
    }
}

#[test]
fn distinct_offsets_rotate_the_extra_rows() {
    for k in 2..=6 {
        let roster = roster_of(k);
        for n in 0..=30 {
            if n % k == 0 {
                continue;
            }
            for r1 in 0..k {
                for r2 in (r1 + 1)..k {
                    let alloc_a = allocate(n, &roster, r1);
                    let a: BTreeSet<_> = alloc_a.extra_receivers().into_iter().collect();
                    let alloc_b = allocate(n, &roster, r2);
                    let b: BTreeSet<_> = alloc_b.extra_receivers().into_iter().collect();
                    assert_ne!(a, b, "n={n} k={k} offsets {r1} and {r2}");
                }
            }
        }
    }
}

#[test]
fn allocation_is_deterministic_for_a_week() {
    let roster = roster_of(6);
    let week: WeekId = "2024-W17".parse().unwrap();
    let offset = rotation_offset(week, &roster);
    assert_eq!(offset, 4);
    assert_eq!(allocate(23, &roster, offset), allocate(23, &roster, offset));
}

#[test]
fn concrete_three_driver_scenarios() {
    let roster = Roster::new(["A", "B", "C"]).unwrap();
    assert_eq!(allocate(10, &roster, 0).sizes(), vec![4, 3, 3]);
    assert_eq!(allocate(10, &roster, 1).sizes(), vec![3, 4, 3]);
    for offset in 0..3 {
        assert_eq!(allocate(9, &roster, offset).sizes(), vec![3, 3, 3]);
    }
}

#[test]
fn late_december_can_belong_to_next_iso_year() {
    let date = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
    assert_eq!(WeekId::from_date(date).to_string(), "2025-W01");

    let date = NaiveDate::from_ymd_opt(2021, 1, 3).unwrap();
    assert_eq!(WeekId::from_date(date).to_string(), "2020-W53");

    let date = NaiveDate::from_ymd_opt(2024, 4, 22).unwrap();
    assert_eq!(WeekId::from_date(date).to_string(), "2024-W17");
}
