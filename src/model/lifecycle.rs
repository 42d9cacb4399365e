use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// State machine attached to an enumeration field.
#[derive(Debug, Clone, PartialEq)]
pub struct Lifecycle {
    pub field: &'static str,
    pub initial: &'static str,
    pub states: &'static [&'static str],
    pub transitions: &'static [(&'static str, &'static [&'static str])],
}

impl Lifecycle {
    pub fn next_states(&self, from: &str) -> &'static [&'static str] {
        self.transitions
            .iter()
            .find(|(state, _)| *state == from)
            .map(|(_, next)| *next)
            .unwrap_or(&[])
    }

    /// Staying in the same state is always allowed.
    pub fn allows(&self, from: &str, to: &str) -> bool {
        from == to || self.next_states(from).contains(&to)
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.next_states(state).is_empty()
    }
}

#[derive(Serialize)]
struct LifecycleView<'a> {
    field: &'a str,
    initial: &'a str,
    states: &'a [&'a str],
    transitions: TransitionMap<'a>,
}

struct TransitionMap<'a>(&'a [(&'a str, &'a [&'a str])]);

impl Serialize for TransitionMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (from, to) in self.0 {
            map.serialize_entry(from, to)?;
        }
        map.end()
    }
}

impl Serialize for Lifecycle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        LifecycleView {
            field: self.field,
            initial: self.initial,
            states: self.states,
            transitions: TransitionMap(self.transitions),
        }
        .serialize(serializer)
    }
}

pub const PROCESS: Lifecycle = Lifecycle {
    field: "state",
    initial: "draft",
    states: &["draft", "review", "active", "suspended", "obsolete"],
    transitions: &[
        ("draft", &["review", "obsolete"]),
        ("review", &["draft", "active"]),
        ("active", &["review", "suspended", "obsolete"]),
        ("suspended", &["active", "obsolete"]),
        ("obsolete", &[]),
    ],
};

pub const PROCESS_INSTANCE: Lifecycle = Lifecycle {
    field: "state",
    initial: "started",
    states: &["started", "in_progress", "paused", "completed", "cancelled"],
    transitions: &[
        ("started", &["in_progress", "cancelled"]),
        ("in_progress", &["paused", "completed", "cancelled"]),
        ("paused", &["in_progress", "cancelled"]),
        ("completed", &[]),
        ("cancelled", &[]),
    ],
};

pub const IMPROVEMENT_ACTION: Lifecycle = Lifecycle {
    field: "state",
    initial: "planned",
    states: &["planned", "in_progress", "implemented", "verified", "closed", "cancelled"],
    transitions: &[
        ("planned", &["in_progress", "cancelled"]),
        ("in_progress", &["implemented", "cancelled"]),
        ("implemented", &["verified", "in_progress"]),
        ("verified", &["closed"]),
        ("closed", &[]),
        ("cancelled", &[]),
    ],
};

pub const DOCUMENT: Lifecycle = Lifecycle {
    field: "state",
    initial: "draft",
    states: &["draft", "in_review", "approved", "obsolete"],
    transitions: &[
        ("draft", &["in_review"]),
        ("in_review", &["draft", "approved"]),
        ("approved", &["in_review", "obsolete"]),
        ("obsolete", &[]),
    ],
};

pub const INDICATOR: Lifecycle = Lifecycle {
    field: "state",
    initial: "active",
    states: &["active", "suspended", "retired"],
    transitions: &[
        ("active", &["suspended", "retired"]),
        ("suspended", &["active", "retired"]),
        ("retired", &[]),
    ],
};

pub const NONCONFORMITY: Lifecycle = Lifecycle {
    field: "state",
    initial: "open",
    states: &["open", "in_analysis", "action_assigned", "closed"],
    transitions: &[
        ("open", &["in_analysis"]),
        ("in_analysis", &["open", "action_assigned"]),
        ("action_assigned", &["in_analysis", "closed"]),
        ("closed", &[]),
    ],
};

pub const QUALITY_OBJECTIVE: Lifecycle = Lifecycle {
    field: "state",
    initial: "planned",
    states: &["planned", "in_progress", "achieved", "not_achieved", "cancelled"],
    transitions: &[
        ("planned", &["in_progress", "cancelled"]),
        ("in_progress", &["achieved", "not_achieved", "cancelled"]),
        ("achieved", &[]),
        ("not_achieved", &[]),
        ("cancelled", &[]),
    ],
};

pub const AUDIT_PROGRAM: Lifecycle = Lifecycle {
    field: "state",
    initial: "draft",
    states: &["draft", "approved", "in_execution", "closed"],
    transitions: &[
        ("draft", &["approved"]),
        ("approved", &["draft", "in_execution"]),
        ("in_execution", &["closed"]),
        ("closed", &[]),
    ],
};

pub const AUDIT: Lifecycle = Lifecycle {
    field: "state",
    initial: "planned",
    states: &["planned", "in_progress", "completed", "closed", "cancelled"],
    transitions: &[
        ("planned", &["in_progress", "cancelled"]),
        ("in_progress", &["completed"]),
        ("completed", &["closed", "in_progress"]),
        ("closed", &[]),
        ("cancelled", &[]),
    ],
};

pub const FINDING: Lifecycle = Lifecycle {
    field: "state",
    initial: "open",
    states: &["open", "answered", "verified", "closed"],
    transitions: &[
        ("open", &["answered"]),
        ("answered", &["open", "verified"]),
        ("verified", &["closed"]),
        ("closed", &[]),
    ],
};

pub const RISK: Lifecycle = Lifecycle {
    field: "state",
    initial: "active",
    states: &["active", "mitigated", "closed"],
    transitions: &[
        ("active", &["mitigated", "closed"]),
        ("mitigated", &["active", "closed"]),
        ("closed", &["active"]),
    ],
};

pub const TRAINING: Lifecycle = Lifecycle {
    field: "state",
    initial: "scheduled",
    states: &["scheduled", "in_progress", "completed", "closed", "cancelled"],
    transitions: &[
        ("scheduled", &["in_progress", "cancelled"]),
        ("in_progress", &["completed"]),
        ("completed", &["closed"]),
        ("closed", &[]),
        ("cancelled", &[]),
    ],
};

pub const COMPETENCY_GAP: Lifecycle = Lifecycle {
    field: "state",
    initial: "open",
    states: &["open", "in_training", "closed"],
    transitions: &[
        ("open", &["in_training", "closed"]),
        ("in_training", &["open", "closed"]),
        ("closed", &[]),
    ],
};

pub const TICKET: Lifecycle = Lifecycle {
    field: "state",
    initial: "open",
    states: &["open", "in_progress", "resolved", "closed"],
    transitions: &[
        ("open", &["in_progress"]),
        ("in_progress", &["open", "resolved"]),
        ("resolved", &["in_progress", "closed"]),
        ("closed", &[]),
    ],
};

pub const ALL: &[&Lifecycle] = &[
    &PROCESS,
    &PROCESS_INSTANCE,
    &IMPROVEMENT_ACTION,
    &DOCUMENT,
    &INDICATOR,
    &NONCONFORMITY,
    &QUALITY_OBJECTIVE,
    &AUDIT_PROGRAM,
    &AUDIT,
    &FINDING,
    &RISK,
    &TRAINING,
    &COMPETENCY_GAP,
    &TICKET,
];
