/// Shared vocabulary used across the store, services and HTTP layers.
///
/// Every enum is persisted as lower snake-case text; `as_str` is what gets bound
/// into SQL and `TryFrom<String>` is what row decoding goes through.
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {}: '{}'", stringify!($name), other)),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

/// Platform-wide role of a user, independent of any course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    Student,
    Teacher,
    Staff,
}

text_enum!(GlobalRole {
    Student => "student",
    Teacher => "teacher",
    Staff => "staff",
});

/// Platform moderation state. Teachers must be approved before authoring courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Approved,
    OnModeration,
}

text_enum!(ModerationStatus {
    Approved => "approved",
    OnModeration => "on_moderation",
});

/// Per-course role stored in `course_roles`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseRole {
    Student,
    CoLecturer,
    Lecturer,
    Staff,
}

text_enum!(CourseRole {
    Student => "student",
    CoLecturer => "co_lecturer",
    Lecturer => "lecturer",
    Staff => "staff",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    #[default]
    Public,
    OnInviteOnly,
    OnRequests,
}

text_enum!(Accessibility {
    Public => "public",
    OnInviteOnly => "on_invite_only",
    OnRequests => "on_requests",
});

/// Join request states: `on_mod -> approved | rejected`, `approved -> not_active`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    OnMod,
    Approved,
    Rejected,
    NotActive,
}

text_enum!(JoinStatus {
    OnMod => "on_mod",
    Approved => "approved",
    Rejected => "rejected",
    NotActive => "not_active",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Lection,
    Test,
}

text_enum!(ContentType {
    Lection => "lection",
    Test => "test",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswersType {
    Single,
    Multiple,
}

text_enum!(AnswersType {
    Single => "single",
    Multiple => "multiple",
});
