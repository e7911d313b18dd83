#[cfg(test)]
mod tests {
    use crate::session::{PreparationState, Session, SessionId, SessionStore};
    use proptest::prelude::*;

    /// One user-visible mutation of the store; indices pick among live sessions.
    #[derive(Debug, Clone)]
    enum Op {
        Create(String),
        Delete(usize),
        Activate(usize),
        Status(usize, PreparationState),
        Pending(usize, bool),
    }

    fn arb_state() -> impl Strategy<Value = PreparationState> {
        prop_oneof![
            Just(PreparationState::Preparing),
            Just(PreparationState::Done),
            Just(PreparationState::Error),
        ]
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => "[ a-zA-Z0-9.]{0,16}".prop_map(Op::Create),
            1 => any::<usize>().prop_map(Op::Delete),
            1 => any::<usize>().prop_map(Op::Activate),
            1 => (any::<usize>(), arb_state()).prop_map(|(i, s)| Op::Status(i, s)),
            1 => (any::<usize>(), any::<bool>()).prop_map(|(i, p)| Op::Pending(i, p)),
        ]
    }

    fn pick(store: &SessionStore, index: usize) -> Option<Session> {
        let sessions = store.sessions();
        if sessions.is_empty() {
            return None;
        }
        Some(sessions[index % sessions.len()].clone())
    }

    fn apply(store: &mut SessionStore, op: &Op) {
        match op {
            Op::Create(address) => {
                let result = store.create_session(address);
                assert_eq!(result.is_err(), address.trim().is_empty());
            }
            Op::Delete(i) => {
                if let Some(session) = pick(store, *i) {
                    assert!(store.delete_session(&session.id).is_some());
                }
            }
            Op::Activate(i) => {
                if let Some(session) = pick(store, *i) {
                    assert!(store.set_active(&session.id));
                }
            }
            Op::Status(i, state) => {
                if let Some(session) = pick(store, *i) {
                    store.update_status(&session.tag, *state, Some(format!("{state}")));
                }
            }
            Op::Pending(i, pending) => {
                if let Some(session) = pick(store, *i) {
                    assert!(store.set_pending(&session.id, *pending));
                }
            }
        }
    }

    fn active_is_valid(store: &SessionStore) -> bool {
        match store.active_id() {
            Some(id) => store.contains(id),
            None => store.is_empty(),
        }
    }

    proptest! {
        #[test]
        fn active_pointer_valid_across_operation_sequences(
            ops in prop::collection::vec(arb_op(), 0..120)
        ) {
            let mut store = SessionStore::new();
            for op in &ops {
                let before: Option<SessionId> = store.active_id().cloned();
                let deleting_active = matches!(op, Op::Delete(i)
                    if pick(&store, *i).map(|s| s.id) == before);

                apply(&mut store, op);

                prop_assert!(active_is_valid(&store), "invalid active pointer after {:?}", op);
                if deleting_active {
                    let first = store.sessions().first().map(|s| s.id.clone());
                    prop_assert_eq!(store.active_id().cloned(), first);
                }
            }
        }

        #[test]
        fn snapshot_restore_round_trip(ops in prop::collection::vec(arb_op(), 0..60)) {
            let mut store = SessionStore::new();
            for op in &ops {
                apply(&mut store, op);
            }

            let json = serde_json::to_string(&store.snapshot()).unwrap();
            let restored = SessionStore::restore(serde_json::from_str(&json).unwrap());

            prop_assert_eq!(restored.len(), store.len());
            prop_assert_eq!(restored.active_id(), store.active_id());
            for (before, after) in store.sessions().iter().zip(restored.sessions()) {
                prop_assert_eq!(&before.id, &after.id);
                prop_assert_eq!(&before.subject_address, &after.subject_address);
                prop_assert_eq!(&before.tag, &after.tag);
                prop_assert_eq!(before.status, after.status);
                prop_assert_eq!(&before.status_message, &after.status_message);
                prop_assert!(!after.pending);
            }
        }

        #[test]
        fn status_never_leaves_terminal_state(first in arb_state(), second in arb_state()) {
            let mut store = SessionStore::new();
            let session = store.create_session("0xabc").unwrap();
            store.update_status(&session.tag, first, None);
            store.update_status(&session.tag, second, None);

            let expected = if first.is_terminal() { first } else { second };
            prop_assert_eq!(store.get(&session.id).unwrap().status, expected);
        }
    }
}
