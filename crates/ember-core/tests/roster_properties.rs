//! Property-based tests for roster computation
//!
//! Invariants under test:
//!
//! 1. **Order independence**: permuting snapshot entry order never changes
//!    the resulting roster
//! 2. **Count**: roster count equals the number of distinct presence keys
//! 3. **Host uniqueness**: at most one participant is marked host
//! 4. **Capacity**: `full` flips exactly at 50 distinct keys

use std::collections::HashMap;

use ember_core::{HostPolicy, PresenceMeta, PresenceSnapshot, ROOM_CAPACITY, Roster};
use proptest::prelude::*;

/// Distinct-keyed presence entries with 0..3 metadata records each.
fn entries_strategy() -> impl Strategy<Value = Vec<(String, Vec<PresenceMeta>)>> {
    proptest::collection::hash_map(
        "[a-z0-9]{1,16}",
        proptest::collection::vec(
            "[A-Za-z]{0,12}".prop_map(|display_name| PresenceMeta { display_name }),
            0..3,
        ),
        0..60,
    )
    .prop_map(|map| map.into_iter().collect())
}

fn host_strategy() -> impl Strategy<Value = HostPolicy> {
    prop_oneof![
        Just(HostPolicy::Unknown),
        "[a-z0-9]{1,16}".prop_map(HostPolicy::Recorded),
        "[a-z0-9]{1,16}".prop_map(HostPolicy::InferredFromHistory),
    ]
}

proptest! {
    #[test]
    fn prop_roster_is_order_independent(
        entries in entries_strategy(),
        rotation in any::<usize>(),
        host in host_strategy(),
    ) {
        let forward: PresenceSnapshot = entries.iter().cloned().collect();

        let mut rotated_entries = entries.clone();
        if !rotated_entries.is_empty() {
            let mid = rotation % rotated_entries.len();
            rotated_entries.rotate_left(mid);
        }
        rotated_entries.reverse();
        let rotated: PresenceSnapshot = rotated_entries.into_iter().collect();

        let a = Roster::from_snapshot(&forward, &host);
        let b = Roster::from_snapshot(&rotated, &host);

        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_count_is_distinct_keys(entries in entries_strategy()) {
        let snapshot: PresenceSnapshot = entries.iter().cloned().collect();
        let roster = Roster::from_snapshot(&snapshot, &HostPolicy::Unknown);

        prop_assert_eq!(roster.count, snapshot.len());
        prop_assert_eq!(roster.participants.len(), snapshot.len());
        prop_assert_eq!(roster.full, snapshot.len() >= ROOM_CAPACITY);
    }

    #[test]
    fn prop_at_most_one_host(
        entries in entries_strategy(),
        host in host_strategy(),
    ) {
        let snapshot: PresenceSnapshot = entries.iter().cloned().collect();
        let roster = Roster::from_snapshot(&snapshot, &host);

        let host_count = roster.participants.iter().filter(|p| p.is_host).count();
        prop_assert!(host_count <= 1);
    }
}

#[test]
fn full_flips_exactly_at_capacity() {
    let mut snapshot: HashMap<String, Vec<PresenceMeta>> = HashMap::new();

    for i in 0..ROOM_CAPACITY {
        snapshot.insert(format!("client-{i:02}"), Vec::new());
        let roster = Roster::from_snapshot(&snapshot, &HostPolicy::Unknown);
        assert_eq!(roster.full, i + 1 >= ROOM_CAPACITY, "at {} occupants", i + 1);
    }
}
