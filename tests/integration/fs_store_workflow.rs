//! Integration test: policy workflow on the filesystem-backed store.
//!
//! Writes a policy through one store handle, reopens the directory with a
//! fresh handle and verifies from the persisted objects alone.

use gittuf_policy::crypto::Ed25519KeyPair;
use gittuf_policy::metadata::{DelegatedRole, RootBuilder, ROOT_ROLE, TARGETS_ROLE};
use gittuf_policy::policy::{LastTrustedIndex, PolicyState, ReferenceStateLog};
use gittuf_policy::store::{FsStore, ObjectId, ObjectStore, TreeEntry};
use gittuf_policy::trust::{add_rule, record_target};
use gittuf_policy::verify::{verify_current_state, verify_transition};
use gittuf_policy::{PolicyError, VerifierConfig};

const MAIN: &str = "git:refs/heads/main";
const MAIN_REF: &str = "refs/heads/main";

fn commit_file(store: &FsStore, body: &str, parent: &ObjectId) -> ObjectId {
    let blob = store.write_blob(body.as_bytes()).unwrap();
    let lib = store.write_tree(vec![TreeEntry::file("x", blob)]).unwrap();
    let tree = store.write_tree(vec![TreeEntry::directory("lib", lib)]).unwrap();
    store.write_commit(&[*parent], tree, body).unwrap()
}

#[test]
fn fs_store_policy_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = VerifierConfig::default();
    let root_key = Ed25519KeyPair::generate();
    let dev = Ed25519KeyPair::generate();

    let (before, after, tip) = {
        let store = FsStore::new(dir.path()).unwrap();
        let root = RootBuilder::new()
            .root_key(root_key.public_key())
            .targets_key(root_key.public_key())
            .sign(&[&root_key])
            .unwrap();
        let mut state = PolicyState::load(&store).unwrap();
        state.stage_key(&root_key.public_key()).unwrap();
        state.stage_metadata(ROOT_ROLE, root.to_bytes().unwrap()).unwrap();
        state.commit(&store).unwrap();

        let dev_id = dev.key_id().unwrap();
        let lib = DelegatedRole::new("protect-lib", vec!["lib/**".into()], vec![dev_id.clone()], 1);
        let branch = DelegatedRole::new("main-branch", vec![MAIN.into()], vec![dev_id], 1);
        add_rule(&store, &mut state, TARGETS_ROLE, &[&root_key], lib, &[dev.public_key()]).unwrap();
        add_rule(&store, &mut state, TARGETS_ROLE, &[&root_key], branch, &[dev.public_key()]).unwrap();

        let first = commit_file(&store, "v1", &ObjectId::ZERO);
        record_target(&store, &mut state, "main-branch", MAIN, &first, &[&dev]).unwrap();
        let before = state.tip();
        let second = commit_file(&store, "v2", &first);
        record_target(&store, &mut state, "main-branch", MAIN, &second, &[&dev]).unwrap();

        store.cas_ref(MAIN_REF, &ObjectId::ZERO, &second).unwrap();
        let mut index = LastTrustedIndex::load(&store).unwrap();
        index.update(&store, MAIN, state.tip()).unwrap();
        ReferenceStateLog::append(&store, MAIN_REF, second, &dev).unwrap();
        (before, state.tip(), second)
    };

    assert!(dir.path().join("objects").is_dir());

    let reopened = FsStore::new(dir.path()).unwrap();
    let state = PolicyState::load(&reopened).unwrap();
    assert_eq!(state.tip(), after);
    assert!(state.snapshot().has_role("main-branch"));

    verify_transition(&reopened, MAIN, &before, &after, &config).unwrap();
    verify_current_state(&reopened, MAIN, &config).unwrap();
    let entry = ReferenceStateLog::load(&reopened, MAIN_REF, &[dev.public_key()]).unwrap();
    assert_eq!(entry.tip, tip);
}

#[test]
fn fs_store_concurrent_handles() {
    let dir = tempfile::tempdir().unwrap();
    let first_store = FsStore::new(dir.path()).unwrap();
    let second_store = FsStore::new(dir.path()).unwrap();

    let mut first = PolicyState::load(&first_store).unwrap();
    let mut second = PolicyState::load(&second_store).unwrap();
    first.stage_metadata("team", b"one".to_vec()).unwrap();
    second.stage_metadata("team", b"two".to_vec()).unwrap();

    first.commit(&first_store).unwrap();
    assert!(matches!(
        second.commit(&second_store),
        Err(PolicyError::ConcurrentModification { .. })
    ));

    let reloaded = PolicyState::load(&second_store).unwrap();
    assert_eq!(
        reloaded.snapshot().metadata_bytes(&second_store, "team").unwrap(),
        b"one"
    );
}
