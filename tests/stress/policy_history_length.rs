//! Stress test: 200 sequential policy commits, then historical loads.

use gittuf_policy::policy::{PolicySnapshot, PolicyState};
use gittuf_policy::store::MemoryStore;

const COMMITS: usize = 200;

#[test]
fn stress_policy_history_200() {
    let store = MemoryStore::new();
    let mut state = PolicyState::load(&store).unwrap();
    let mut tips = Vec::with_capacity(COMMITS);

    for i in 0..COMMITS {
        let role = format!("role-{}", i % 10);
        state
            .stage_metadata_and_commit(&store, &role, format!("revision {i}").into_bytes())
            .unwrap_or_else(|e| panic!("commit {i} failed: {e}"));
        tips.push(state.tip());
    }

    let latest = PolicyState::load(&store).unwrap().snapshot();
    assert_eq!(latest.role_names().len(), 10);
    assert_eq!(
        latest.metadata_bytes(&store, "role-9").unwrap(),
        format!("revision {}", COMMITS - 1).into_bytes()
    );

    // The oldest state is reachable through every intermediate commit.
    let oldest = PolicyState::load_at(&store, &tips[0]).unwrap().snapshot();
    assert_eq!(oldest.role_names(), vec!["role-0".to_string()]);
    assert_eq!(oldest.metadata_bytes(&store, "role-0").unwrap(), b"revision 0");

    let middle = PolicySnapshot::metadata_at(&store, &tips[COMMITS / 2]).unwrap();
    assert_eq!(middle.len(), 10);
}
