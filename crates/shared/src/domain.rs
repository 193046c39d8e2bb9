use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{key}'")]
pub struct UnknownKey {
    pub kind: &'static str,
    pub key: String,
}

/// String-keyed enum whose serde name, `as_str` and `FromStr` agree.
macro_rules! keyed_enum {
    ($name:ident { $($variant:ident => $key:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownKey;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($key => Ok($name::$variant),)+
                    other => Err(UnknownKey {
                        kind: stringify!($name),
                        key: other.to_string(),
                    }),
                }
            }
        }
    };
}

keyed_enum!(EntityKind {
    Tasks => "tasks",
    Kras => "kras",
    Users => "users",
    Teams => "teams",
    Tickets => "tickets",
    Customers => "customers",
});

keyed_enum!(Role {
    Admin => "admin",
    Manager => "manager",
    Employee => "employee",
});

keyed_enum!(ActivityStatus {
    Active => "active",
    Inactive => "inactive",
});

keyed_enum!(TaskStatus {
    Todo => "todo",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

keyed_enum!(KraStatus {
    NotStarted => "not_started",
    OnTrack => "on_track",
    AtRisk => "at_risk",
    Achieved => "achieved",
});

keyed_enum!(TicketStatus {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

keyed_enum!(CustomerStatus {
    Lead => "lead",
    Active => "active",
    Inactive => "inactive",
    Churned => "churned",
});

keyed_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

impl Priority {
    /// Ordinal used for numeric sorting, lowest first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
        }
    }
}

impl EntityKind {
    /// Human plural used in notifications ("Deleted 4 tasks").
    pub fn noun(self) -> &'static str {
        match self {
            EntityKind::Tasks => "tasks",
            EntityKind::Kras => "KRAs",
            EntityKind::Users => "users",
            EntityKind::Teams => "teams",
            EntityKind::Tickets => "tickets",
            EntityKind::Customers => "customers",
        }
    }

    /// [`EntityKind::noun`], singular when `count` is one.
    pub fn noun_for(self, count: usize) -> &'static str {
        if count != 1 {
            return self.noun();
        }
        match self {
            EntityKind::Tasks => "task",
            EntityKind::Kras => "KRA",
            EntityKind::Users => "user",
            EntityKind::Teams => "team",
            EntityKind::Tickets => "ticket",
            EntityKind::Customers => "customer",
        }
    }

    pub fn supports_roles(self) -> bool {
        matches!(self, EntityKind::Users)
    }

    /// Round-trips an untyped document through the kind's record type, so
    /// unknown statuses, missing fields and wrong types are rejected.
    pub fn normalize(self, value: serde_json::Value) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            EntityKind::Tasks => normalize_as::<Task>(value),
            EntityKind::Kras => normalize_as::<Kra>(value),
            EntityKind::Users => normalize_as::<User>(value),
            EntityKind::Teams => normalize_as::<Team>(value),
            EntityKind::Tickets => normalize_as::<Ticket>(value),
            EntityKind::Customers => normalize_as::<Customer>(value),
        }
    }
}

fn normalize_as<R: Record>(value: serde_json::Value) -> Result<serde_json::Value, serde_json::Error> {
    let record: R = serde_json::from_value(value)?;
    serde_json::to_value(record)
}

/// Anything that can sit in a selection set.
pub trait Selectable {
    fn id(&self) -> &RecordId;
}

/// A typed entity stored under one [`EntityKind`].
pub trait Record: Selectable + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;
}

macro_rules! record {
    ($name:ident, $kind:expr) => {
        impl Selectable for $name {
            fn id(&self) -> &RecordId {
                &self.id
            }
        }

        impl Record for $name {
            const KIND: EntityKind = $kind;
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default)]
    pub assignee_id: Option<RecordId>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kra {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: KraStatus,
    /// Percent complete, 0..=100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub assignee_id: Option<RecordId>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: ActivityStatus,
    #[serde(default)]
    pub team_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ActivityStatus,
    #[serde(default)]
    pub lead_id: Option<RecordId>,
    #[serde(default)]
    pub member_ids: Vec<RecordId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: RecordId,
    pub subject: String,
    pub requester_email: String,
    pub status: TicketStatus,
    pub priority: Priority,
    #[serde(default)]
    pub assignee_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: String,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
}

record!(Task, EntityKind::Tasks);
record!(Kra, EntityKind::Kras);
record!(User, EntityKind::Users);
record!(Team, EntityKind::Teams);
record!(Ticket, EntityKind::Tickets);
record!(Customer, EntityKind::Customers);
