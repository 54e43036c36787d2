//! Stress test: a delegation chain 40 roles deep.
//!
//! `targets` delegates `level-0`, which delegates `level-1`, and so on.
//! The deepest role records the protected branch.

use gittuf_policy::crypto::Ed25519KeyPair;
use gittuf_policy::metadata::{
    DelegatedRole, RootBuilder, TargetFile, TargetsBuilder, ROOT_ROLE, TARGETS_ROLE,
};
use gittuf_policy::policy::PolicyState;
use gittuf_policy::store::{MemoryStore, ObjectId, ObjectStore};
use gittuf_policy::trust::{build_until, resolve_governing_role};
use gittuf_policy::{PolicyError, VerifierConfig};

const MAIN: &str = "git:refs/heads/main";
const DEPTH: usize = 40;

fn level(i: usize) -> String {
    format!("level-{i}")
}

fn build_chain(store: &MemoryStore) -> (Ed25519KeyPair, ObjectId) {
    let root_key = Ed25519KeyPair::generate();
    let keys: Vec<Ed25519KeyPair> = (0..DEPTH).map(|_| Ed25519KeyPair::generate()).collect();
    let tip = ObjectId::from_bytes([7; 32]);

    let root = RootBuilder::new()
        .root_key(root_key.public_key())
        .targets_key(root_key.public_key())
        .sign(&[&root_key])
        .unwrap();

    let mut state = PolicyState::load(store).unwrap();
    state.stage_key(&root_key.public_key()).unwrap();
    state.stage_metadata(ROOT_ROLE, root.to_bytes().unwrap()).unwrap();

    let delegate = |i: usize| {
        DelegatedRole::new(level(i), vec!["git:*".into()], vec![keys[i].key_id().unwrap()], 1)
    };

    let targets = TargetsBuilder::new()
        .delegate(delegate(0), &[keys[0].public_key()])
        .unwrap()
        .sign(&[&root_key])
        .unwrap();
    state.stage_metadata(TARGETS_ROLE, targets.to_bytes().unwrap()).unwrap();

    for i in 0..DEPTH {
        let builder = if i + 1 < DEPTH {
            TargetsBuilder::new()
                .delegate(delegate(i + 1), &[keys[i + 1].public_key()])
                .unwrap()
        } else {
            TargetsBuilder::new().target(MAIN, TargetFile::for_commit(&tip))
        };
        let envelope = builder.sign(&[&keys[i]]).unwrap();
        state.stage_metadata(&level(i), envelope.to_bytes().unwrap()).unwrap();
    }
    state.commit(store).unwrap();
    (root_key, tip)
}

#[test]
fn stress_delegation_depth_40() {
    let store = MemoryStore::new();
    let (_, tip) = build_chain(&store);
    let snapshot = PolicyState::load(&store).unwrap().snapshot();
    let config = VerifierConfig::default();

    let governing = resolve_governing_role(&store, &snapshot, MAIN, &config)
        .expect("deepest role should govern the branch");
    assert_eq!(governing.name, level(DEPTH - 1));
    assert_eq!(governing.targets.targets[MAIN].commit_id().unwrap(), tip);

    let db = build_until(&store, &snapshot, &level(DEPTH - 1), &config).unwrap();
    assert!(db.has_role(&level(DEPTH - 1)));
    assert!(store.object_count().unwrap() > DEPTH);
}

#[test]
fn stress_delegation_walk_limit() {
    let store = MemoryStore::new();
    build_chain(&store);
    let snapshot = PolicyState::load(&store).unwrap().snapshot();
    let config = VerifierConfig {
        max_roles_visited: DEPTH / 2,
        ..VerifierConfig::default()
    };

    assert!(matches!(
        resolve_governing_role(&store, &snapshot, MAIN, &config),
        Err(PolicyError::NoDelegationFound(_))
    ));
    assert!(matches!(
        build_until(&store, &snapshot, &level(DEPTH - 1), &config),
        Err(PolicyError::RoleNotFound(_))
    ));
}
