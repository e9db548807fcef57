//! Reserved-name guard.
//!
//! Event names fall into three classes. `User` names are the only ones the
//! public `emit`/`on` surface accepts; `Lifecycle` and `Control` names are
//! rejected (or specially routed).

/// The reboot sentinel exit code: a worker exiting with this code is
/// always respawned, regardless of keep-alive, and no user-visible `exit`
/// fires.
pub const REBOOT_SENTINEL_EXIT_CODE: i32 = 826;

/// The three lifecycle event names. Emitting any of these on a handle is
/// rejected from the user-facing `emit` surface; they are still fired
/// *internally* by the lifecycle controller.
pub const LIFECYCLE_NAMES: [&str; 3] = ["online", "error", "exit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName<'a> {
    /// One of `online` / `error` / `exit`.
    Lifecycle(&'a str),
    /// A control-plane envelope kind, named for diagnostics only — control
    /// messages are no longer distinguished by a string prefix/suffix on
    /// the wire (see `envelope::Envelope`), but a user could still try to
    /// `emit` a name that collides with one of the legacy sentinel strings,
    /// and that has to be rejected too.
    Control(&'a str),
    /// An ordinary, user-defined event name.
    User(&'a str),
}

const CONTROL_SENTINEL_NAMES: [&str; 5] = [
    "----transmit----",
    "----broadcast----",
    "----reboot----",
    "----get-workers----",
    "----online----",
];

/// Classify an event name into lifecycle, control, or ordinary user.
pub fn classify(name: &str) -> EventName<'_> {
    if LIFECYCLE_NAMES.contains(&name) {
        EventName::Lifecycle(name)
    } else if is_control_sentinel(name) {
        EventName::Control(name)
    } else {
        EventName::User(name)
    }
}

/// True for any of the five control sentinel names, or any string
/// beginning with `----` and ending with `----` (the general prefix/suffix
/// rule those names follow).
pub fn is_control_sentinel(name: &str) -> bool {
    CONTROL_SENTINEL_NAMES.contains(&name)
        || (name.starts_with("----") && name.ends_with("----") && name.len() > 8)
}

/// True if `name` may never be delivered as a user event.
pub fn is_reserved(name: &str) -> bool {
    !matches!(classify(name), EventName::User(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_names_are_reserved() {
        for n in LIFECYCLE_NAMES {
            assert!(is_reserved(n), "{n} should be reserved");
            assert!(matches!(classify(n), EventName::Lifecycle(_)));
        }
    }

    #[test]
    fn control_sentinels_are_reserved() {
        for n in [
            "----transmit----",
            "----broadcast----",
            "----reboot----",
            "----get-workers----",
            "----online----",
            "----custom----",
        ] {
            assert!(is_reserved(n), "{n} should be reserved");
        }
    }

    #[test]
    fn ordinary_names_are_not_reserved() {
        for n in ["hello", "ping", "news", "job-done"] {
            assert!(!is_reserved(n), "{n} should not be reserved");
            assert_eq!(classify(n), EventName::User(n));
        }
    }

    #[test]
    fn reboot_sentinel_value() {
        assert_eq!(REBOOT_SENTINEL_EXIT_CODE, 826);
    }
}
