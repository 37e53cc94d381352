use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

impl<T> Timestamped<T> {
    pub fn new(data: T) -> Self {
        Timestamped {
            timestamp: Utc::now(),
            data,
        }
    }
}
