use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
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

str_enum!(Role {
    Child => "child",
    Parent => "parent",
    Admin => "admin",
});

str_enum!(MessageRole {
    User => "user",
    Assistant => "assistant",
    System => "system",
});

/// One transcript entry. This is exactly the shape persisted on disk:
/// a `{role, content}` object, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// An image ready to be attached to an outbound request.
///
/// The one canonical attachment representation: the original encoded
/// bytes as a base64 data-URL plus their media type. The image is never
/// persisted, only carried on the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data_base64: String,
}

impl ImageAttachment {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data_base64)
    }
}

/// One entry of the provider-bound message list built by
/// `ConversationSession::build_request`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub role: MessageRole,
    pub text: String,
    pub image: Option<ImageAttachment>,
}

impl RequestMessage {
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            image: None,
        }
    }
}

/// Token accounting as reported by the provider. Absent fields
/// normalize to zero, never to an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_units: u32,
    pub output_units: u32,
    pub total_units: u32,
}

/// Result of one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Child, Role::Parent, Role::Admin] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Role::from_str("teacher").is_err());
    }

    #[test]
    fn message_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn message_serializes_as_role_content_object() {
        let msg = Message::user("Wie löse ich 3x+2=11?");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "Wie löse ich 3x+2=11?");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn image_attachment_builds_data_url() {
        let img = ImageAttachment {
            media_type: "image/png".into(),
            data_base64: "AAAA".into(),
        };
        assert_eq!(img.data_url(), "data:image/png;base64,AAAA");
    }
}
