mod accept_dialog;
mod command_input;
mod form;
mod input;
mod key_result;
mod search_input;

pub use accept_dialog::{AcceptDialog, AcceptEvent};
pub use command_input::{CommandEvent, CommandInput};
pub use form::{Form, FormEvent, FormField};
pub use input::{InputResult, TextInput};
pub use key_result::KeyResult;
pub use search_input::{SearchEvent, SearchInput};
