use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every record type the catalog knows about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum EntityKind {
            $($variant),+
        }

        impl EntityKind {
            pub const ALL: &'static [EntityKind] = &[$(EntityKind::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(EntityKind::$variant => $name),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(EntityKind::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

entity_kinds! {
    Area => "area",
    User => "user",
    Role => "role",
    Permission => "permission",
    UserRole => "user_role",
    RolePermission => "role_permission",
    AreaAssignment => "area_assignment",
    Process => "process",
    ProcessStage => "process_stage",
    ProcessInstance => "process_instance",
    ProcessParticipant => "process_participant",
    ProcessAction => "process_action",
    Document => "document",
    DocumentVersion => "document_version",
    DocumentProcess => "document_process",
    Indicator => "indicator",
    IndicatorMeasurement => "indicator_measurement",
    Nonconformity => "nonconformity",
    CorrectiveAction => "corrective_action",
    QualityObjective => "quality_objective",
    ObjectiveFollowUp => "objective_follow_up",
    AuditProgram => "audit_program",
    Audit => "audit",
    Finding => "finding",
    Risk => "risk",
    RiskControl => "risk_control",
    RiskEvaluation => "risk_evaluation",
    Training => "training",
    TrainingAttendance => "training_attendance",
    Competency => "competency",
    CompetencyEvaluation => "competency_evaluation",
    CompetencyGap => "competency_gap",
    Ticket => "ticket",
    Notification => "notification",
    Setting => "setting",
    FormField => "form_field",
    FormResponse => "form_response",
    StateHistory => "state_history",
    ChangeLog => "change_log",
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
