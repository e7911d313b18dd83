use sleuth_core::session::{Session, SessionId};

/// Resolves a user-typed session reference.
///
/// Accepts a 1-based position in the listing, a full session id, or an
/// unambiguous id prefix.
pub fn resolve(sessions: &[Session], selector: &str) -> Option<SessionId> {
    let selector = selector.trim();
    if selector.is_empty() {
        return None;
    }

    if let Ok(position) = selector.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| sessions.get(index))
            .map(|s| s.id.clone());
    }

    if let Some(session) = sessions.iter().find(|s| s.id.as_str() == selector) {
        return Some(session.id.clone());
    }

    let mut matches = sessions.iter().filter(|s| s.id.as_str().starts_with(selector));
    match (matches.next(), matches.next()) {
        (Some(session), None) => Some(session.id.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        let mut session = Session::new("0xabc");
        session.id = SessionId::from(id);
        session
    }

    #[test]
    fn test_resolve_by_position() {
        let sessions = vec![session("aaa-1"), session("bbb-2")];
        assert_eq!(resolve(&sessions, "1"), Some(SessionId::from("aaa-1")));
        assert_eq!(resolve(&sessions, "2"), Some(SessionId::from("bbb-2")));
        assert_eq!(resolve(&sessions, "0"), None);
        assert_eq!(resolve(&sessions, "3"), None);
    }

    #[test]
    fn test_resolve_by_id_and_prefix() {
        let sessions = vec![session("aaa-1"), session("aab-2"), session("ccc-3")];
        assert_eq!(resolve(&sessions, "ccc-3"), Some(SessionId::from("ccc-3")));
        assert_eq!(resolve(&sessions, "cc"), Some(SessionId::from("ccc-3")));
        assert_eq!(resolve(&sessions, "aa"), None);
        assert_eq!(resolve(&sessions, "zzz"), None);
        assert_eq!(resolve(&sessions, "  "), None);
    }
}
