use crate::models::{Endpoint, Submission};

pub struct ProcessContext {
    pub submission: Submission,
    pub endpoint: Endpoint,
}
