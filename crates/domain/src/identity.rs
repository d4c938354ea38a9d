use serde::{Deserialize, Serialize};

/// The authenticated identity a view acts as. Populated from the external
/// auth provider's claims; absent on anonymous reads.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl Viewer {
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            user_id: user_id.clone(),
            username: user_id,
            avatar_url: None,
        }
    }
}
