use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
}

impl Session {
    pub fn new(user_id: Uuid, username: impl Into<String>) -> Self {
        Session {
            user_id,
            username: username.into(),
        }
    }
}
