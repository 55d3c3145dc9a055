use crate::cache::Cacheable;

use super::types::Request;

/// Key under which the whole request list is stored
pub const REQUESTS_KEY: &str = "emergencyRequests";

impl Cacheable for Request {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "request"
  }
}
