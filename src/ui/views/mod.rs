mod chat;
mod login_form;
mod request_detail;
mod request_list;
mod submit_form;

pub use chat::ChatView;
pub use login_form::LoginFormView;
pub use request_detail::RequestDetailView;
pub use request_list::{RequestListView, Tab};
pub use submit_form::SubmitFormView;

use crate::desk::Snapshot;
use crate::rescue::Helper;

/// Accept form defaults: the session user, with gaps filled from the configured
/// volunteer profile
fn helper_prefill(snapshot: &Snapshot, volunteer: Option<&Helper>) -> Option<Helper> {
  match (&snapshot.helper, volunteer) {
    (Some(session), Some(profile)) => Some(Helper {
      phone: if session.phone.is_empty() {
        profile.phone.clone()
      } else {
        session.phone.clone()
      },
      email: session.email.clone().or_else(|| profile.email.clone()),
      ..session.clone()
    }),
    (Some(session), None) => Some(session.clone()),
    (None, profile) => profile.cloned(),
  }
}
