mod inspect;

pub use inspect::{CoerceArgs, GetArgs, ParametersArgs, ShowArgs};
