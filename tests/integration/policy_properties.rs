//! Integration test: policy and verification properties.
//!
//! Each test builds a small protected branch whose tip is recorded by a
//! delegated role, then checks one authorization property of
//! `verify_transition`.

use std::collections::BTreeMap;

use gittuf_policy::crypto::Ed25519KeyPair;
use gittuf_policy::metadata::{DelegatedRole, RootBuilder, ROOT_ROLE, TARGETS_ROLE};
use gittuf_policy::policy::{PolicyState, POLICY_STATE_REF};
use gittuf_policy::store::{ChangeKind, MemoryStore, ObjectId, ObjectStore, TreeEntry};
use gittuf_policy::trust::{add_rule, record_target};
use gittuf_policy::verify::verify_transition;
use gittuf_policy::{PolicyError, VerifierConfig};

const MAIN: &str = "git:refs/heads/main";

struct Repo {
    store: MemoryStore,
    state: PolicyState,
    root_key: Ed25519KeyPair,
}

impl Repo {
    fn new() -> Self {
        let store = MemoryStore::new();
        let root_key = Ed25519KeyPair::generate();
        let root = RootBuilder::new()
            .root_key(root_key.public_key())
            .targets_key(root_key.public_key())
            .sign(&[&root_key])
            .unwrap();
        let mut state = PolicyState::load(&store).unwrap();
        state.stage_key(&root_key.public_key()).unwrap();
        state.stage_metadata(ROOT_ROLE, root.to_bytes().unwrap()).unwrap();
        state.commit(&store).unwrap();
        Self {
            store,
            state,
            root_key,
        }
    }

    /// Append a top-level rule allowing one key.
    fn rule(&mut self, name: &str, pattern: &str, key: &Ed25519KeyPair) {
        let rule = DelegatedRole::new(name, vec![pattern.into()], vec![key.key_id().unwrap()], 1);
        add_rule(
            &self.store,
            &mut self.state,
            TARGETS_ROLE,
            &[&self.root_key],
            rule,
            &[key.public_key()],
        )
        .unwrap();
    }

    /// Commit `files` and record the commit in `role`, signed by `signer`.
    /// Returns the resulting policy state.
    fn record(&mut self, role: &str, signer: &Ed25519KeyPair, files: &[(&str, &str)]) -> ObjectId {
        let mut root = Vec::new();
        let mut dirs: BTreeMap<&str, Vec<TreeEntry>> = BTreeMap::new();
        for (path, body) in files {
            let blob = self.store.write_blob(body.as_bytes()).unwrap();
            match path.split_once('/') {
                Some((dir, name)) => dirs.entry(dir).or_default().push(TreeEntry::file(name, blob)),
                None => root.push(TreeEntry::file(*path, blob)),
            }
        }
        for (dir, entries) in dirs {
            root.push(TreeEntry::directory(dir, self.store.write_tree(entries).unwrap()));
        }
        let tree = self.store.write_tree(root).unwrap();
        let commit = self.store.write_commit(&[], tree, "content").unwrap();
        record_target(&self.store, &mut self.state, role, MAIN, &commit, &[signer]).unwrap();
        self.state.tip()
    }

    fn verify(&self, from: ObjectId, to: ObjectId) -> gittuf_policy::Result<()> {
        verify_transition(&self.store, MAIN, &from, &to, &VerifierConfig::default()).map(|_| ())
    }
}

fn unauthorized_path(result: gittuf_policy::Result<()>) -> String {
    match result {
        Err(PolicyError::UnauthorizedChange { path }) => path,
        other => panic!("expected an unauthorized change, got {other:?}"),
    }
}

#[test]
fn first_declared_rule_applies() {
    let mut repo = Repo::new();
    let a = Ed25519KeyPair::generate();
    let b = Ed25519KeyPair::generate();
    repo.rule("docs", "docs/*", &a);
    repo.rule("everyone", "*", &b);

    let before = repo.record("everyone", &b, &[("docs/x", "v1"), ("src/y", "v1")]);
    let outside_docs = repo.record("everyone", &b, &[("docs/x", "v1"), ("src/y", "v2")]);
    repo.verify(before, outside_docs).unwrap();

    let inside_docs = repo.record("everyone", &b, &[("docs/x", "v2"), ("src/y", "v2")]);
    assert_eq!(unauthorized_path(repo.verify(outside_docs, inside_docs)), "docs/x");
}

#[test]
fn catch_all_allows_any_signer() {
    let mut repo = Repo::new();
    let k = Ed25519KeyPair::generate();
    let nobody = Ed25519KeyPair::generate();
    repo.rule("branch", "git:refs/heads/*", &k);
    repo.rule("allow-*", "*", &nobody);

    let before = repo.record("branch", &k, &[("README.md", "v1")]);
    let after = repo.record("branch", &k, &[("README.md", "v2"), ("NEW.md", "new")]);
    repo.verify(before, after).unwrap();
}

#[test]
fn rename_out_of_protected_path_rejected() {
    let mut repo = Repo::new();
    let a = Ed25519KeyPair::generate();
    let k = Ed25519KeyPair::generate();
    let nobody = Ed25519KeyPair::generate();
    repo.rule("secret", "secret/*", &a);
    repo.rule("branch", MAIN, &k);
    repo.rule("allow-*", "*", &nobody);

    let before = repo.record("branch", &k, &[("secret/a", "classified")]);
    let after = repo.record("branch", &k, &[("public/a", "classified")]);

    let changes = {
        let old = repo.store.read_commit(&tip_of(&repo, before)).unwrap().tree;
        let new = repo.store.read_commit(&tip_of(&repo, after)).unwrap().tree;
        repo.store.diff_trees(&old, &new).unwrap()
    };
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Renamed);

    assert_eq!(unauthorized_path(repo.verify(before, after)), "secret/a");
}

#[test]
fn rename_into_protected_path_rejected() {
    let mut repo = Repo::new();
    let a = Ed25519KeyPair::generate();
    let k = Ed25519KeyPair::generate();
    let nobody = Ed25519KeyPair::generate();
    repo.rule("secret", "secret/*", &a);
    repo.rule("branch", MAIN, &k);
    repo.rule("allow-*", "*", &nobody);

    let before = repo.record("branch", &k, &[("public/b", "harmless")]);
    let after = repo.record("branch", &k, &[("secret/b", "harmless")]);
    assert_eq!(unauthorized_path(repo.verify(before, after)), "secret/b");
}

#[test]
fn protected_key_may_rename() {
    let mut repo = Repo::new();
    let a = Ed25519KeyPair::generate();
    let nobody = Ed25519KeyPair::generate();
    repo.rule("secret", "secret/*", &a);
    repo.rule("branch", MAIN, &a);
    repo.rule("allow-*", "*", &nobody);

    let before = repo.record("branch", &a, &[("secret/a", "classified")]);
    let after = repo.record("branch", &a, &[("public/a", "classified")]);
    repo.verify(before, after).unwrap();
}

#[test]
fn identical_states_verify_without_work() {
    let repo = Repo::new();
    let tip = repo.state.tip();
    repo.verify(tip, tip).unwrap();
}

#[test]
fn transitions_need_linear_policy_history() {
    let mut repo = Repo::new();
    let k = Ed25519KeyPair::generate();
    repo.rule("branch", MAIN, &k);
    let before = repo.record("branch", &k, &[("a", "1")]);
    let after = repo.record("branch", &k, &[("a", "2")]);

    // Merge a side history into the policy reference.
    let tree = repo.state.snapshot().tree();
    let side = repo.store.write_commit(&[], tree, "side").unwrap();
    let merge = repo.store.write_commit(&[after, side], tree, "merge").unwrap();
    repo.store.cas_ref(POLICY_STATE_REF, &after, &merge).unwrap();

    assert!(matches!(
        repo.verify(before, after),
        Err(PolicyError::AmbiguousHistory(_))
    ));
}

#[test]
fn concurrent_policy_writers() {
    let repo = Repo::new();
    let mut first = PolicyState::load(&repo.store).unwrap();
    let mut second = PolicyState::load(&repo.store).unwrap();

    first.stage_metadata("team", b"one".to_vec()).unwrap();
    second.stage_metadata("team", b"two".to_vec()).unwrap();
    first.commit(&repo.store).unwrap();
    assert!(matches!(
        second.commit(&repo.store),
        Err(PolicyError::ConcurrentModification { .. })
    ));

    // Reload and retry.
    let mut retry = PolicyState::load(&repo.store).unwrap();
    retry.stage_metadata("team", b"two".to_vec()).unwrap();
    retry.commit(&repo.store).unwrap();
    assert_eq!(
        retry.snapshot().metadata_bytes(&repo.store, "team").unwrap(),
        b"two"
    );
}

fn tip_of(repo: &Repo, state: ObjectId) -> ObjectId {
    let snapshot = PolicyState::load_at(&repo.store, &state).unwrap().snapshot();
    let envelope = snapshot.envelope(&repo.store, "branch").unwrap();
    let targets: gittuf_policy::Targets = envelope.payload().unwrap();
    targets.targets[MAIN].commit_id().unwrap()
}
