//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle:
//! 1. Initialize a policy with one root key and an empty targets role
//! 2. Delegate `lib/**` and the protected branch to a developer key
//! 3. Record branch tips signed by the developer
//! 4. Verify the transition between the policy states
//! 5. Reject a tip recorded without the developer's signature
//! 6. Checkpoint the branch and check current state

use std::collections::BTreeMap;

use gittuf_policy::crypto::Ed25519KeyPair;
use gittuf_policy::metadata::{DelegatedRole, RootBuilder, TargetsBuilder, ROOT_ROLE, TARGETS_ROLE};
use gittuf_policy::policy::{LastTrustedIndex, PolicyState, ReferenceStateLog};
use gittuf_policy::store::{ChangeKind, MemoryStore, ObjectId, ObjectStore, TreeEntry};
use gittuf_policy::trust::{add_rule, record_target, resolve_governing_role};
use gittuf_policy::verify::{verify_current_state, verify_transition};
use gittuf_policy::{PolicyError, VerifierConfig};

const MAIN: &str = "git:refs/heads/main";
const MAIN_REF: &str = "refs/heads/main";

/// Commit a tree of `path -> body` files, at most one directory deep.
fn commit_files(store: &MemoryStore, files: &[(&str, &str)], parent: Option<ObjectId>) -> ObjectId {
    let mut root = Vec::new();
    let mut dirs: BTreeMap<&str, Vec<TreeEntry>> = BTreeMap::new();
    for (path, body) in files {
        let blob = store.write_blob(body.as_bytes()).unwrap();
        match path.split_once('/') {
            Some((dir, name)) => dirs.entry(dir).or_default().push(TreeEntry::file(name, blob)),
            None => root.push(TreeEntry::file(*path, blob)),
        }
    }
    for (dir, entries) in dirs {
        root.push(TreeEntry::directory(dir, store.write_tree(entries).unwrap()));
    }
    let tree = store.write_tree(root).unwrap();
    let parents: Vec<ObjectId> = parent.into_iter().collect();
    store.write_commit(&parents, tree, "update").unwrap()
}

#[test]
fn full_workflow_policy_to_verified_transition() {
    let store = MemoryStore::new();
    let config = VerifierConfig::default();

    // ── Step 1: Initialize the policy ───────────────────────────────────
    let root_key = Ed25519KeyPair::generate();
    let root = RootBuilder::new()
        .root_key(root_key.public_key())
        .targets_key(root_key.public_key())
        .sign(&[&root_key])
        .expect("root metadata should sign");
    let targets = TargetsBuilder::new()
        .sign(&[&root_key])
        .expect("targets metadata should sign");

    let mut initial = BTreeMap::new();
    initial.insert(ROOT_ROLE.to_string(), root.to_bytes().unwrap());
    initial.insert(TARGETS_ROLE.to_string(), targets.to_bytes().unwrap());
    let mut state = PolicyState::initialize(&[root_key.public_key()], initial).unwrap();
    assert!(state.is_dirty());
    state.commit(&store).expect("initial policy commit should succeed");
    assert_eq!(state.snapshot().role_names(), vec!["root", "targets"]);

    // ── Step 2: Delegate lib/** and the branch to the developer ─────────
    let dev = Ed25519KeyPair::generate();
    let dev_id = dev.key_id().unwrap();
    let protect_lib = DelegatedRole::new("protect-lib", vec!["lib/**".into()], vec![dev_id.clone()], 1);
    let main_branch = DelegatedRole::new("main-branch", vec![MAIN.into()], vec![dev_id], 1);
    add_rule(&store, &mut state, TARGETS_ROLE, &[&root_key], protect_lib, &[dev.public_key()]).unwrap();
    add_rule(&store, &mut state, TARGETS_ROLE, &[&root_key], main_branch, &[dev.public_key()]).unwrap();

    // ── Step 3: Record branch tips signed by the developer ──────────────
    let first = commit_files(&store, &[("README.md", "hello"), ("lib/x", "v1")], None);
    record_target(&store, &mut state, "main-branch", MAIN, &first, &[&dev]).unwrap();
    let before = state.tip();

    let second = commit_files(&store, &[("README.md", "hello"), ("lib/x", "v2")], Some(first));
    record_target(&store, &mut state, "main-branch", MAIN, &second, &[&dev]).unwrap();
    let after = state.tip();

    let governing = resolve_governing_role(&store, &state.snapshot(), MAIN, &config).unwrap();
    assert_eq!(governing.name, "main-branch");

    // ── Step 4: Verify the transition ───────────────────────────────────
    let verification = verify_transition(&store, MAIN, &before, &after, &config)
        .expect("developer-signed change to lib/x should verify");
    assert_eq!(verification.governing_role.as_deref(), Some("main-branch"));
    assert_eq!(verification.changes.len(), 1);
    assert_eq!(verification.changes[0].path(), "lib/x");
    assert_eq!(verification.changes[0].kind, ChangeKind::Modified);

    // ── Step 5: Same change without a role signed by the developer ──────
    let third = commit_files(&store, &[("README.md", "hello"), ("lib/x", "v3")], Some(second));
    record_target(&store, &mut state, TARGETS_ROLE, MAIN, &third, &[&root_key]).unwrap();
    let forged = state.tip();

    match verify_transition(&store, MAIN, &after, &forged, &config) {
        Err(PolicyError::UnauthorizedChange { path }) => assert_eq!(path, "lib/x"),
        other => panic!("expected unauthorized change to lib/x, got {other:?}"),
    }

    // ── Step 6: Checkpoint and current state ────────────────────────────
    store.cas_ref(MAIN_REF, &ObjectId::ZERO, &third).unwrap();
    let mut index = LastTrustedIndex::load(&store).unwrap();
    index.update(&store, MAIN, forged).unwrap();
    verify_current_state(&store, MAIN, &config).expect("recorded tip matches the branch");

    ReferenceStateLog::append(&store, MAIN_REF, third, &dev).unwrap();
    let entry = ReferenceStateLog::load(&store, MAIN_REF, &[dev.public_key()]).unwrap();
    assert_eq!(entry.tip, third);
}

#[test]
fn full_workflow_transition_across_policy_edits() {
    let store = MemoryStore::new();
    let config = VerifierConfig::default();
    let root_key = Ed25519KeyPair::generate();
    let dev = Ed25519KeyPair::generate();

    let root = RootBuilder::new()
        .root_key(root_key.public_key())
        .targets_key(root_key.public_key())
        .sign(&[&root_key])
        .unwrap();
    let mut state = PolicyState::load(&store).unwrap();
    state.stage_key(&root_key.public_key()).unwrap();
    state.stage_metadata(ROOT_ROLE, root.to_bytes().unwrap()).unwrap();
    state.commit(&store).unwrap();

    let main_branch = DelegatedRole::new("main-branch", vec![MAIN.into()], vec![dev.key_id().unwrap()], 1);
    add_rule(&store, &mut state, TARGETS_ROLE, &[&root_key], main_branch, &[dev.public_key()]).unwrap();
    let first = commit_files(&store, &[("docs/guide.md", "v1")], None);
    record_target(&store, &mut state, "main-branch", MAIN, &first, &[&dev]).unwrap();
    let before = state.tip();

    // Rules come from the older state of a transition.
    let owner = Ed25519KeyPair::generate();
    let docs = DelegatedRole::new("docs", vec!["docs/*".into()], vec![owner.key_id().unwrap()], 1);
    add_rule(&store, &mut state, TARGETS_ROLE, &[&root_key], docs, &[owner.public_key()]).unwrap();
    let allow = DelegatedRole::new("allow-*", vec!["*".into()], Vec::new(), 1);
    add_rule(&store, &mut state, TARGETS_ROLE, &[&root_key], allow, &[]).unwrap();

    let second = commit_files(&store, &[("docs/guide.md", "v2")], Some(first));
    record_target(&store, &mut state, "main-branch", MAIN, &second, &[&dev]).unwrap();
    let after = state.tip();

    // Before the docs rule existed nothing matched docs/guide.md.
    assert!(matches!(
        verify_transition(&store, MAIN, &before, &after, &config),
        Err(PolicyError::NoDelegationFound(path)) if path == "docs/guide.md"
    ));

    // Once the docs rule is in the older state, it takes precedence over
    // the catch-all and the developer is not allowed.
    let third = commit_files(&store, &[("docs/guide.md", "v3")], Some(second));
    record_target(&store, &mut state, "main-branch", MAIN, &third, &[&dev]).unwrap();
    assert!(matches!(
        verify_transition(&store, MAIN, &after, &state.tip(), &config),
        Err(PolicyError::UnauthorizedChange { path }) if path == "docs/guide.md"
    ));
}
