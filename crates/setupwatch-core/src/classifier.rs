//! Session text classification

use regex::Regex;
use setupwatch_api::{IdleBucket, Occupancy, ResolvedUser};
use setupwatch_config::UsernameMap;
use std::sync::LazyLock;
use thiserror::Error;

static SESSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(Active|Disc)\s+([\d.:+]+)").expect("valid regex"));

static CLIENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CLIENTNAME\s+[a-zA-Z_]+\s+([a-zA-Z\-\d]+)").expect("valid regex")
});

/// Classification failures. All of them degrade the host to Offline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("no session line in query output")]
    NoSession,

    #[error("no client name in session environment")]
    NoClientName,

    #[error("unrecognized idle time '{0}'")]
    BadIdle(String),
}

pub type ClassifyResult<T> = Result<T, ClassifyError>;

/// Connection state column of the session listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Disc,
}

/// The first `<id> <state> <idle>` triple found in the session listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSession {
    pub id: u32,
    pub state: SessionState,
    pub idle_spec: String,
}

/// Raw command output gathered from one workstation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSessionText {
    /// Output of the session listing command
    pub sessions: String,
    /// Output of the client-name query, absent when no session id was found
    pub client: Option<String>,
}

/// Result of classifying one host's session text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub occupancy: Occupancy,
    pub idle: IdleBucket,
    pub user: ResolvedUser,
}

impl Classification {
    /// The triad used for hosts that could not be classified
    pub fn offline() -> Self {
        Self {
            occupancy: Occupancy::Offline,
            idle: IdleBucket::Offline,
            user: ResolvedUser::Offline,
        }
    }
}

/// Find the first session line in `query user` output
pub fn parse_session(text: &str) -> ClassifyResult<ParsedSession> {
    let caps = SESSION_LINE.captures(text).ok_or(ClassifyError::NoSession)?;

    let id = caps[1].parse().map_err(|_| ClassifyError::NoSession)?;
    let state = match &caps[2] {
        "Active" => SessionState::Active,
        _ => SessionState::Disc,
    };

    Ok(ParsedSession {
        id,
        state,
        idle_spec: caps[3].to_string(),
    })
}

/// Extract the client machine name from a registry query answer
pub fn parse_client_name(text: &str) -> ClassifyResult<String> {
    CLIENT_NAME
        .captures(text)
        .map(|caps| caps[1].to_string())
        .ok_or(ClassifyError::NoClientName)
}

/// Resolve who is using the workstation.
///
/// The username table only applies to sessions that are not disconnected.
/// Otherwise an active session shows its client machine name and a
/// disconnected one shows as free.
pub fn resolve_user(state: SessionState, client_name: &str, usernames: &UsernameMap) -> ResolvedUser {
    if state != SessionState::Disc
        && let Some(person) = usernames.resolve(client_name)
    {
        return ResolvedUser::Mapped(person.to_string());
    }

    match state {
        SessionState::Active => ResolvedUser::Client(client_name.to_string()),
        SessionState::Disc => ResolvedUser::Free,
    }
}

/// Normalize an idle spec.
///
/// - `.` is `Zero` for a free workstation, `ActiveTyping` otherwise
/// - anything containing both `+` and `:` is `Saturated`
/// - a bare number is that many minutes; `HH:MM` is converted to minutes
pub fn idle_bucket(spec: &str, user: &ResolvedUser) -> ClassifyResult<IdleBucket> {
    if spec == "." {
        return Ok(if user.is_free() {
            IdleBucket::Zero
        } else {
            IdleBucket::ActiveTyping
        });
    }

    if spec.contains('+') && spec.contains(':') {
        return Ok(IdleBucket::Saturated);
    }

    let bad = || ClassifyError::BadIdle(spec.to_string());
    let minutes = match spec.split_once(':') {
        Some((hours, mins)) => {
            let hours: u32 = hours.parse().map_err(|_| bad())?;
            let mins: u32 = mins.parse().map_err(|_| bad())?;
            hours.checked_mul(60).and_then(|h| h.checked_add(mins)).ok_or_else(bad)?
        }
        None => spec.parse().map_err(|_| bad())?,
    };

    Ok(IdleBucket::Minutes {
        minutes,
        raw: spec.to_string(),
    })
}

/// Classify raw session text, reporting why it failed
pub fn try_classify(raw: &RawSessionText, usernames: &UsernameMap) -> ClassifyResult<Classification> {
    let session = parse_session(&raw.sessions)?;
    let client_name = parse_client_name(raw.client.as_deref().unwrap_or_default())?;

    let user = resolve_user(session.state, &client_name, usernames);
    let idle = idle_bucket(&session.idle_spec, &user)?;
    let occupancy = match session.state {
        SessionState::Active => Occupancy::Active,
        SessionState::Disc => Occupancy::Disconnected,
    };

    Ok(Classification {
        occupancy,
        idle,
        user,
    })
}

/// Classify raw session text. Any failure yields the offline triad.
pub fn classify(raw: &RawSessionText, usernames: &UsernameMap) -> Classification {
    try_classify(raw, usernames).unwrap_or_else(|_| Classification::offline())
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY_ACTIVE: &str = " USERNAME              SESSIONNAME        ID  STATE   IDLE TIME  LOGON TIME\r\n\
>labuser               rdp-tcp#12          2  Active          .  10/19/2026 8:01 AM\r\n";

    fn client_output(name: &str) -> String {
        format!(
            "\r\nHKEY_CURRENT_USER\\Volatile Environment\\2\r\n    CLIENTNAME    REG_SZ    {}\r\n\r\n",
            name
        )
    }

    fn raw(sessions: &str, client: &str) -> RawSessionText {
        RawSessionText {
            sessions: sessions.to_string(),
            client: Some(client_output(client)),
        }
    }

    fn usernames() -> UsernameMap {
        [("WS-ALICE", "alice")].into_iter().collect()
    }

    #[test]
    fn parse_session_from_query_user() {
        let session = parse_session(QUERY_ACTIVE).unwrap();
        assert_eq!(session.id, 2);
        assert_eq!(session.state, SessionState::Active);
        assert_eq!(session.idle_spec, ".");

        let session = parse_session("labuser  3  Disc  1+02:13  10/19/2026").unwrap();
        assert_eq!(session.id, 3);
        assert_eq!(session.state, SessionState::Disc);
        assert_eq!(session.idle_spec, "1+02:13");
    }

    #[test]
    fn first_session_line_wins() {
        let session = parse_session("5 Disc 20\n6 Active .").unwrap();
        assert_eq!(session.id, 5);
    }

    #[test]
    fn parse_session_failure() {
        assert_eq!(parse_session("No User exists for *"), Err(ClassifyError::NoSession));
        assert_eq!(parse_session(""), Err(ClassifyError::NoSession));
    }

    #[test]
    fn parse_client_name_from_registry() {
        assert_eq!(parse_client_name(&client_output("WS-ALICE-01")).unwrap(), "WS-ALICE-01");
        assert_eq!(
            parse_client_name("ERROR: The system was unable to find the specified registry key"),
            Err(ClassifyError::NoClientName)
        );
    }

    #[test]
    fn dot_is_zero_only_when_free() {
        let users = [
            ResolvedUser::Free,
            ResolvedUser::Client("WS-BOB".into()),
            ResolvedUser::Mapped("alice".into()),
        ];
        for user in users {
            let bucket = idle_bucket(".", &user).unwrap();
            if user.is_free() {
                assert_eq!(bucket, IdleBucket::Zero);
            } else {
                assert_eq!(bucket, IdleBucket::ActiveTyping);
            }
        }
    }

    #[test]
    fn plus_and_colon_saturate() {
        for spec in ["1+00:00", "3+23:59", "0+00:01", "99+1:1"] {
            assert_eq!(idle_bucket(spec, &ResolvedUser::Free).unwrap(), IdleBucket::Saturated);
        }
    }

    #[test]
    fn minutes_pass_through() {
        assert_eq!(
            idle_bucket("15", &ResolvedUser::Free).unwrap(),
            IdleBucket::Minutes {
                minutes: 15,
                raw: "15".into()
            }
        );
        assert_eq!(
            idle_bucket("1:05", &ResolvedUser::Free).unwrap(),
            IdleBucket::Minutes {
                minutes: 65,
                raw: "1:05".into()
            }
        );
    }

    #[test]
    fn unparseable_idle_is_an_error() {
        assert!(matches!(idle_bucket("1.2", &ResolvedUser::Free), Err(ClassifyError::BadIdle(_))));
        assert!(matches!(idle_bucket("5+", &ResolvedUser::Free), Err(ClassifyError::BadIdle(_))));
        assert!(matches!(idle_bucket(":", &ResolvedUser::Free), Err(ClassifyError::BadIdle(_))));
    }

    #[test]
    fn username_mapping_rules() {
        let map = usernames();

        assert_eq!(
            resolve_user(SessionState::Active, "WS-ALICE", &map),
            ResolvedUser::Mapped("alice".into())
        );
        assert_eq!(
            resolve_user(SessionState::Active, "WS-BOB", &map),
            ResolvedUser::Client("WS-BOB".into())
        );
        assert_eq!(resolve_user(SessionState::Disc, "WS-ALICE", &map), ResolvedUser::Free);
        assert_eq!(resolve_user(SessionState::Disc, "WS-BOB", &map), ResolvedUser::Free);
    }

    #[test]
    fn classify_active_mapped_user() {
        let result = classify(&raw(QUERY_ACTIVE, "WS-ALICE"), &usernames());
        assert_eq!(result.occupancy, Occupancy::Active);
        assert_eq!(result.user, ResolvedUser::Mapped("alice".into()));
        assert_eq!(result.idle, IdleBucket::ActiveTyping);
    }

    #[test]
    fn classify_disconnected_session() {
        let result = classify(&raw("3 Disc .", "WS-ALICE"), &usernames());
        assert_eq!(result.occupancy, Occupancy::Disconnected);
        assert_eq!(result.user, ResolvedUser::Free);
        assert_eq!(result.idle, IdleBucket::Zero);
    }

    #[test]
    fn malformed_text_is_offline() {
        assert_eq!(
            classify(&raw("garbage", "WS-ALICE"), &usernames()),
            Classification::offline()
        );

        let missing_client = RawSessionText {
            sessions: "2 Active 4".into(),
            client: None,
        };
        assert_eq!(
            try_classify(&missing_client, &usernames()),
            Err(ClassifyError::NoClientName)
        );
    }
}
