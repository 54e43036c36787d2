//! Policy Walkthrough: protect a branch, record signed tips, verify them.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example policy_walkthrough -p gittuf-policy

use gittuf_policy::crypto::Ed25519KeyPair;
use gittuf_policy::metadata::{DelegatedRole, RootBuilder, ROOT_ROLE, TARGETS_ROLE};
use gittuf_policy::policy::{LastTrustedIndex, PolicyState, ReferenceStateLog};
use gittuf_policy::store::{MemoryStore, ObjectId, ObjectStore, TreeEntry};
use gittuf_policy::trust::{add_rule, record_target, resolve_governing_role};
use gittuf_policy::verify::{verify_current_state, verify_transition};
use gittuf_policy::{PolicyError, VerifierConfig};

const MAIN: &str = "git:refs/heads/main";
const MAIN_REF: &str = "refs/heads/main";

fn commit_lib(store: &MemoryStore, body: &str, parent: Option<ObjectId>) -> ObjectId {
    let blob = store.write_blob(body.as_bytes()).expect("write blob");
    let lib = store
        .write_tree(vec![TreeEntry::file("x", blob)])
        .expect("write tree");
    let tree = store
        .write_tree(vec![TreeEntry::directory("lib", lib)])
        .expect("write tree");
    let parents: Vec<ObjectId> = parent.into_iter().collect();
    store.write_commit(&parents, tree, body).expect("write commit")
}

fn main() {
    env_logger::init();
    let store = MemoryStore::new();
    let config = VerifierConfig::default();

    // ── 1. Initialize the policy ────────────────────────────────────────────
    //
    // The root role names the keys that may sign root and top-level targets.
    // Root public keys live next to the metadata in the policy tree.
    let root_key = Ed25519KeyPair::generate();
    let root = RootBuilder::new()
        .root_key(root_key.public_key())
        .targets_key(root_key.public_key())
        .sign(&[&root_key])
        .expect("root metadata should sign");

    let mut state = PolicyState::load(&store).expect("empty policy");
    state.stage_key(&root_key.public_key()).expect("stage root key");
    state
        .stage_metadata(ROOT_ROLE, root.to_bytes().expect("encode root"))
        .expect("stage root");
    state.commit(&store).expect("initial commit");
    println!("Policy initialized at {}", state.tip());
    println!();

    // ── 2. Delegate lib/** and the branch to a developer ────────────────────
    let dev = Ed25519KeyPair::generate();
    let dev_id = dev.key_id().expect("key id");
    println!("Developer key: {dev_id}");

    let protect_lib = DelegatedRole::new("protect-lib", vec!["lib/**".into()], vec![dev_id.clone()], 1);
    let main_branch = DelegatedRole::new("main-branch", vec![MAIN.into()], vec![dev_id], 1);
    for rule in [protect_lib, main_branch] {
        add_rule(&store, &mut state, TARGETS_ROLE, &[&root_key], rule, &[dev.public_key()])
            .expect("add rule");
    }
    println!("Rules: {:?}", state.snapshot().role_names());
    println!();

    // ── 3. Record two tips of the branch ────────────────────────────────────
    let first = commit_lib(&store, "v1", None);
    record_target(&store, &mut state, "main-branch", MAIN, &first, &[&dev]).expect("record v1");
    let before = state.tip();

    let second = commit_lib(&store, "v2", Some(first));
    record_target(&store, &mut state, "main-branch", MAIN, &second, &[&dev]).expect("record v2");
    let after = state.tip();

    let governing = resolve_governing_role(&store, &state.snapshot(), MAIN, &config)
        .expect("branch should have a governing role");
    println!("{MAIN} is governed by {}", governing.name);
    println!("  Signed by: {:?}", governing.signers);
    println!();

    // ── 4. Verify the transition ────────────────────────────────────────────
    let verification = verify_transition(&store, MAIN, &before, &after, &config)
        .expect("developer-signed change should verify");
    println!("Transition {before} -> {after}");
    for change in &verification.changes {
        println!("  {:?} {}", change.kind, change.path());
    }
    println!("  Verified:   OK");
    println!();

    // ── 5. A tip recorded by the wrong role is rejected ─────────────────────
    let third = commit_lib(&store, "v3", Some(second));
    record_target(&store, &mut state, TARGETS_ROLE, MAIN, &third, &[&root_key]).expect("record v3");
    match verify_transition(&store, MAIN, &after, &state.tip(), &config) {
        Err(PolicyError::UnauthorizedChange { path }) => {
            println!("Root-signed change rejected: {path} is protected");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    println!();

    // ── 6. Checkpoint the branch ────────────────────────────────────────────
    //
    // The last-trusted index pins the policy state the branch was verified
    // against. The reference-state log records a signed tip per push.
    store
        .cas_ref(MAIN_REF, &ObjectId::ZERO, &third)
        .expect("move branch");
    let mut index = LastTrustedIndex::load(&store).expect("load index");
    index.update(&store, MAIN, state.tip()).expect("update index");
    verify_current_state(&store, MAIN, &config).expect("branch matches its recorded tip");
    println!("Current state of {MAIN}: OK");

    ReferenceStateLog::append(&store, MAIN_REF, third, &dev).expect("append entry");
    let entry = ReferenceStateLog::load(&store, MAIN_REF, &[dev.public_key()]).expect("load entry");
    println!("Reference state: {} (last entry {})", entry.tip, entry.last_entry);
}
