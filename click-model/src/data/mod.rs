pub(crate) mod action;
pub(crate) mod log_item;
pub(crate) mod session;
pub(crate) mod snippet;
