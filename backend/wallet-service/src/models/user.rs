use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blurhash: String,
}

/// Public projection of a user, as served to other users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileSummary {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub thumbnail: Thumbnail,
}

/// Partial profile update broadcast to every instance
///
/// Absent fields leave the cached value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        default,
        rename = "name",
        alias = "display_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.display_name.is_none() && self.thumbnail.is_none()
    }

    /// Merge present fields into `profile`
    pub fn apply_to(&self, profile: &mut UserProfileSummary) {
        if let Some(username) = &self.username {
            profile.username = username.clone();
        }
        if let Some(display_name) = &self.display_name {
            profile.display_name = display_name.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            profile.thumbnail = thumbnail.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserProfileSummary {
        UserProfileSummary {
            id: 1,
            username: "alice".into(),
            display_name: "Alice".into(),
            thumbnail: Thumbnail {
                uri: "https://img/a.png".into(),
                blurhash: String::new(),
            },
        }
    }

    #[test]
    fn test_apply_only_present_fields() {
        let mut profile = alice();
        let patch = ProfilePatch {
            display_name: Some("Alicia".into()),
            ..Default::default()
        };
        patch.apply_to(&mut profile);

        assert_eq!(profile.display_name, "Alicia");
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.thumbnail.uri, "https://img/a.png");
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut profile = alice();
        let patch = ProfilePatch::default();
        assert!(patch.is_empty());
        patch.apply_to(&mut profile);
        assert_eq!(profile, alice());
    }

    #[test]
    fn test_patch_name_field() {
        let patch: ProfilePatch = serde_json::from_str(r#"{"name":"Robert"}"#).unwrap();
        assert_eq!(patch.display_name.as_deref(), Some("Robert"));
    }

    #[test]
    fn test_patch_wire_format() {
        let patch: ProfilePatch =
            serde_json::from_str(r#"{"thumbnail":{"uri":"https://img/b.png"}}"#).unwrap();
        assert_eq!(patch.thumbnail.unwrap().uri, "https://img/b.png");
        assert!(patch.username.is_none());

        let json = serde_json::to_string(&ProfilePatch {
            username: Some("bob".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"username":"bob"}"#);
    }
}
