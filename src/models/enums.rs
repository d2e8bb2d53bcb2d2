use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Tier {
    Free => "free",
    Basic => "basic",
    Pro => "pro",
});

str_enum!(PriorityLevel {
    Always => "always",
    Conditional => "conditional",
    Normal => "normal",
});

str_enum!(NoteType {
    Pattern => "pattern",
    Concern => "concern",
    Preference => "preference",
    Insight => "insight",
});

str_enum!(MessageRole {
    User => "user",
    Ai => "ai",
});

str_enum!(PersonalizationLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
});

str_enum!(ConversationType {
    EasyChat => "easy_chat",
    RegularChat => "regular_chat",
});
